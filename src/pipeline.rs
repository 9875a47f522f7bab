//! Sweep pipeline orchestrator.
//!
//! Connects the components of a run:
//!
//! ```text
//! validate → versioning check → confirmation → MarkerLister
//!     → plan_batches → MarkerDeleter workers (MPMC) → SweepSummary
//! ```
//!
//! Discovery runs to completion before the first batch is planned. The
//! deletion workers share one bounded batch channel and report every batch
//! on an outcome channel drained by the pipeline task, which is the only
//! owner of the progress accountants.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Result, anyhow};
use async_channel::{Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::deleter::{MarkerDeleter, create_deleter, plan_batches};
use crate::lister::{Discovery, MarkerLister};
use crate::progress::{
    Clock, ProgressAccountant, ProgressReporter, SystemClock, TracingProgressReporter,
};
use crate::safety::{PromptHandler, SafetyChecker};
use crate::storage::{self, Storage};
use crate::types::error::{Phase, SweepError};
use crate::types::token::PipelineCancellationToken;
use crate::types::{Batch, BatchResult, MarkerRef, SweepSummary};

/// Removes the current delete markers under the configured bucket and prefix.
///
/// ## Usage
///
/// ```no_run
/// # async fn example() {
/// use s3unmark_rs::{Config, SweepPipeline, create_pipeline_cancellation_token};
///
/// let config = Config::for_target("my-bucket", "logs/");
/// let cancellation_token = create_pipeline_cancellation_token();
/// let mut pipeline = SweepPipeline::new(config, cancellation_token).await;
/// pipeline.run().await;
///
/// if pipeline.has_error() {
///     eprintln!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
/// }
/// if let Some(summary) = pipeline.get_summary() {
///     println!("{} of {} delete markers removed", summary.total_deleted, summary.total_found);
/// }
/// # }
/// ```
pub struct SweepPipeline {
    config: Config,
    target: Storage,
    cancellation_token: PipelineCancellationToken,
    clock: Arc<dyn Clock>,
    reporter: Arc<dyn ProgressReporter>,
    prompt_handler: Option<Box<dyn PromptHandler>>,
    has_error: Arc<AtomicBool>,
    has_panic: Arc<AtomicBool>,
    has_warning: Arc<AtomicBool>,
    errors: Arc<Mutex<VecDeque<anyhow::Error>>>,
    summary: Option<SweepSummary>,
    ready: bool,
}

impl SweepPipeline {
    /// Create a pipeline backed by an S3 client built from `config`.
    pub async fn new(config: Config, cancellation_token: PipelineCancellationToken) -> Self {
        let target = storage::create_storage(&config).await;
        Self::with_storage(config, cancellation_token, target)
    }

    /// Create a pipeline on top of an existing storage.
    pub fn with_storage(
        config: Config,
        cancellation_token: PipelineCancellationToken,
        target: Storage,
    ) -> Self {
        Self {
            config,
            target,
            cancellation_token,
            clock: Arc::new(SystemClock),
            reporter: Arc::new(TracingProgressReporter),
            prompt_handler: None,
            has_error: Arc::new(AtomicBool::new(false)),
            has_panic: Arc::new(AtomicBool::new(false)),
            has_warning: Arc::new(AtomicBool::new(false)),
            errors: Arc::new(Mutex::new(VecDeque::new())),
            summary: None,
            ready: true,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the default reporter, which writes progress as `info` events.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Replace the stdin/stdout confirmation prompt.
    pub fn with_prompt_handler(mut self, prompt_handler: Box<dyn PromptHandler>) -> Self {
        self.prompt_handler = Some(prompt_handler);
        self
    }

    /// Run the sweep. Can be called once.
    ///
    /// Configuration errors and a declined confirmation are recorded as
    /// errors and stop the run before discovery. Listing and deletion
    /// failures are warnings: the run continues with what it has and the
    /// summary reports the shortfall.
    pub async fn run(&mut self) {
        assert!(self.ready, "SweepPipeline::run() called more than once");
        self.ready = false;

        if let Err(e) = self.check_prerequisites().await {
            self.record_error(e);
            return;
        }

        let start_time = self.clock.now();

        let discovery = self.discover().await;
        let discovery_complete = discovery.is_complete();
        let total_found = discovery.markers.len() as u64;

        let results = if discovery.markers.is_empty() {
            info!(phase = "discovery", "No delete markers found.");
            vec![]
        } else {
            info!(
                phase = "discovery",
                total_found = total_found,
                "Found {} delete markers to remove.",
                total_found
            );
            self.delete(discovery.markers).await
        };

        let unreported: u64 = results.iter().map(BatchResult::unreported_count).sum();
        if unreported > 0 {
            warn!(
                phase = "deletion",
                unreported = unreported,
                "{} delete markers were reported neither as deleted nor as failed.",
                unreported
            );
            self.has_warning.store(true, Ordering::SeqCst);
        }

        let summary = self.summarize(total_found, &results, discovery_complete, start_time);
        if summary.has_failures() {
            self.has_warning.store(true, Ordering::SeqCst);
        }
        self.summary = Some(summary);

        if self.config.warn_as_error && self.has_warning() {
            self.record_error(anyhow!(SweepError::Pipeline(
                "warnings promoted to errors (--warn-as-error)".to_string()
            )));
        }
    }

    /// Check if any error occurred during the run.
    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    /// Check if any worker task panicked.
    pub fn has_panic(&self) -> bool {
        self.has_panic.load(Ordering::SeqCst)
    }

    /// Discovery stopped early on a listing error, or some markers could
    /// not be deleted.
    pub fn has_warning(&self) -> bool {
        self.has_warning.load(Ordering::SeqCst)
    }

    /// Consume and return all accumulated errors.
    ///
    /// Returns `None` if no errors occurred.
    pub fn get_errors_and_consume(&self) -> Option<Vec<anyhow::Error>> {
        if !self.has_error() {
            return None;
        }
        let mut error_list = self.errors.lock().unwrap();
        let mut errors = Vec::with_capacity(error_list.len());
        while let Some(e) = error_list.pop_front() {
            errors.push(e);
        }
        Some(errors)
    }

    /// The report of the last run. `None` if the run stopped before
    /// discovery.
    pub fn get_summary(&self) -> Option<SweepSummary> {
        self.summary.clone()
    }

    // -----------------------------------------------------------------------
    // Internal methods
    // -----------------------------------------------------------------------

    async fn check_prerequisites(&mut self) -> Result<()> {
        self.config.validate()?;

        match self.target.is_versioning_enabled().await {
            Ok(true) => {}
            Ok(false) => warn!(
                bucket = self.config.bucket(),
                "versioning has never been enabled on bucket '{}'. it holds no delete markers.",
                self.config.bucket()
            ),
            Err(e) => warn!(
                bucket = self.config.bucket(),
                error = format!("{e:#}"),
                "versioning status of bucket '{}' could not be checked. continuing.",
                self.config.bucket()
            ),
        }

        let safety_checker = match self.prompt_handler.take() {
            Some(prompt_handler) => SafetyChecker::with_prompt_handler(&self.config, prompt_handler),
            None => SafetyChecker::new(&self.config),
        };
        safety_checker.check_before_deletion()
    }

    fn record_error(&self, error: anyhow::Error) {
        self.has_error.store(true, Ordering::SeqCst);
        self.errors.lock().unwrap().push_back(error);
    }

    fn new_accountant(&self, phase: Phase, total_expected: Option<u64>) -> ProgressAccountant {
        ProgressAccountant::new(
            phase,
            total_expected,
            self.config.progress_interval,
            self.clock.clone(),
            self.reporter.clone(),
        )
    }

    async fn discover(&self) -> Discovery {
        let mut accountant = self.new_accountant(Phase::Discovery, None);
        let lister = MarkerLister::new(
            dyn_clone::clone_box(&*self.target),
            self.cancellation_token.clone(),
        );

        let discovery = lister.discover(&mut accountant).await;
        let progress = accountant.complete_snapshot();

        if discovery.error.is_some() {
            self.has_warning.store(true, Ordering::SeqCst);
        }

        debug!(
            phase = "discovery",
            pages = discovery.pages,
            found = progress.processed,
            elapsed_seconds = progress.elapsed.as_secs_f64(),
            complete = discovery.is_complete(),
            "delete marker discovery has been completed."
        );

        discovery
    }

    async fn delete(&self, markers: Vec<MarkerRef>) -> Vec<BatchResult> {
        let total = markers.len() as u64;
        let batches = plan_batches(markers, self.config.effective_batch_size());
        let queue_size = self.config.worker_size.max(1) as usize;

        let (batch_sender, batch_receiver) = async_channel::bounded::<Batch>(queue_size);
        let (outcome_sender, outcome_receiver) = async_channel::bounded::<BatchResult>(queue_size);

        self.spawn_batch_feeder(batches, batch_sender);
        for worker_index in 0..self.config.worker_size {
            self.spawn_deleter(worker_index, batch_receiver.clone(), outcome_sender.clone());
        }

        // The outcome channel closes once every worker has finished.
        drop(batch_receiver);
        drop(outcome_sender);

        let mut accountant = self.new_accountant(Phase::Deletion, Some(total));
        let mut results = vec![];
        while let Ok(result) = outcome_receiver.recv().await {
            accountant.update(result.processed_count(), result.failed_count());
            results.push(result);
        }
        let progress = accountant.complete_snapshot();

        debug!(
            phase = "deletion",
            batches = results.len(),
            processed = progress.processed,
            failed = progress.failed,
            elapsed_seconds = progress.elapsed.as_secs_f64(),
            throughput = progress.throughput,
            "delete marker deletion has been completed."
        );

        results
    }

    fn spawn_batch_feeder(&self, batches: Vec<Batch>, batch_sender: Sender<Batch>) {
        let cancellation_token = self.cancellation_token.clone();

        tokio::spawn(async move {
            for batch in batches {
                tokio::select! {
                    send_result = batch_sender.send(batch) => {
                        if send_result.is_err() {
                            debug!("batch channel closed. no delete worker left.");
                            return;
                        }
                    },
                    _ = cancellation_token.cancelled() => {
                        debug!("batch feeder has been cancelled.");
                        return;
                    }
                }
            }
        });
    }

    /// Spawn one deletion worker with the double-spawn pattern so that a
    /// panic is caught and recorded.
    fn spawn_deleter(
        &self,
        worker_index: u16,
        batch_receiver: Receiver<Batch>,
        outcome_sender: Sender<BatchResult>,
    ) {
        let marker_deleter = MarkerDeleter::new(
            worker_index,
            create_deleter(&self.config, dyn_clone::clone_box(&*self.target)),
            batch_receiver,
            outcome_sender,
            self.cancellation_token.clone(),
        );

        let has_error = self.has_error.clone();
        let has_panic = self.has_panic.clone();
        let error_list = self.errors.clone();
        let cancellation_token = self.cancellation_token.clone();

        tokio::spawn(async move {
            let join_result = tokio::spawn(marker_deleter.run()).await;

            if let Err(e) = join_result {
                cancellation_token.cancel();
                has_error.store(true, Ordering::SeqCst);
                has_panic.store(true, Ordering::SeqCst);
                error!(worker_index, "delete worker task panicked: {}", e);
                error_list
                    .lock()
                    .unwrap()
                    .push_back(anyhow!("delete worker panicked: {}", e));
            }
        });
    }

    fn summarize(
        &self,
        total_found: u64,
        results: &[BatchResult],
        discovery_complete: bool,
        start_time: Instant,
    ) -> SweepSummary {
        let total_deleted: u64 = results.iter().map(|r| r.deleted_count).sum();
        let total_errors: u64 = results.iter().map(BatchResult::failed_count).sum();
        let elapsed_seconds = self
            .clock
            .now()
            .saturating_duration_since(start_time)
            .as_secs_f64();

        let summary = SweepSummary {
            total_found,
            total_deleted,
            total_errors,
            elapsed_seconds,
            success_rate_percent: SweepSummary::success_rate_percent(total_deleted, total_found),
            batches: results.len(),
            dry_run: self.config.dry_run,
            cancelled: self.cancellation_token.is_cancelled(),
            discovery_complete,
        };

        info!(
            message = "sweep summary",
            total_found = summary.total_found,
            total_deleted = summary.total_deleted,
            total_errors = summary.total_errors,
            elapsed_seconds = summary.elapsed_seconds,
            success_rate_percent = summary.success_rate_percent,
            batches = summary.batches,
            dry_run = summary.dry_run,
            cancelled = summary.cancelled,
            discovery_complete = summary.discovery_complete,
        );

        summary
    }
}
