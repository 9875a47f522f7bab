//! Deletion components of the s3unmark-rs pipeline.
//!
//! [`plan_batches`] cuts the discovered markers into [`Batch`]es,
//! [`MarkerDeleter`] workers pull them from a shared channel and hand each
//! one to a [`Deleter`] backend:
//!
//! - [`BatchDeleter`]: one DeleteObjects request per batch, with an optional
//!   per-marker fallback through [`SingleDeleter`].
//! - [`SingleDeleter`]: one DeleteObject request per marker.
//! - [`DryRunDeleter`]: no request at all.

use anyhow::Result;
use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::storage::Storage;
use crate::types::error::SweepError;
use crate::types::token::PipelineCancellationToken;
use crate::types::{Batch, BatchResult, BatchStatus, MarkerRef};

pub mod batch;
pub mod dry_run;
pub mod single;

pub use batch::BatchDeleter;
pub use dry_run::DryRunDeleter;
pub use single::SingleDeleter;


/// Deletion backend for one batch.
#[async_trait]
pub trait Deleter: Send + Sync {
    /// Delete every marker of `batch`.
    ///
    /// `Err` means the request failed as a whole (transport level); the
    /// caller accounts the entire batch as failed.
    async fn delete(&self, batch: &Batch) -> Result<BatchResult>;
}

/// Split `markers` into consecutive batches of at most `batch_size`
/// (clamped to `1..=1000`), preserving order.
pub fn plan_batches(markers: Vec<MarkerRef>, batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.clamp(1, batch::MAX_BATCH_SIZE);
    markers
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            markers: chunk.to_vec(),
        })
        .collect()
}

/// Choose the backend for `config`.
pub fn create_deleter(config: &Config, target: Storage) -> Box<dyn Deleter> {
    if config.dry_run {
        return Box::new(DryRunDeleter);
    }

    let deleter = BatchDeleter::new(target.clone());
    if config.fallback_to_single_delete {
        Box::new(deleter.with_fallback(SingleDeleter::new(target, config.force_retry_config)))
    } else {
        Box::new(deleter)
    }
}

/// Extract the provider code and message of a failed storage call.
pub(crate) fn error_code_and_message(e: &anyhow::Error) -> (String, String) {
    match e.downcast_ref::<SweepError>() {
        Some(SweepError::Transport { code, message, .. }) => (code.clone(), message.clone()),
        _ => ("unknown".to_string(), format!("{e:#}")),
    }
}

/// Pipeline worker: takes batches from the shared channel, deletes them and
/// reports one [`BatchResult`] per batch.
pub struct MarkerDeleter {
    worker_index: u16,
    deleter: Box<dyn Deleter>,
    receiver: Receiver<Batch>,
    outcome_sender: Sender<BatchResult>,
    cancellation_token: PipelineCancellationToken,
}

impl MarkerDeleter {
    pub fn new(
        worker_index: u16,
        deleter: Box<dyn Deleter>,
        receiver: Receiver<Batch>,
        outcome_sender: Sender<BatchResult>,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            worker_index,
            deleter,
            receiver,
            outcome_sender,
            cancellation_token,
        }
    }

    /// Run until the batch channel is drained and closed, or cancelled.
    pub async fn run(self) {
        debug!(worker_index = self.worker_index, "delete worker started.");

        loop {
            // A batch already taken is always finished; no new one after cancel.
            if self.cancellation_token.is_cancelled() {
                info!(
                    worker_index = self.worker_index,
                    "delete worker has been cancelled."
                );
                return;
            }

            tokio::select! {
                recv_result = self.receiver.recv() => {
                    match recv_result {
                        Ok(batch) => {
                            let result = self.delete_batch(&batch).await;
                            if self.outcome_sender.send(result).await.is_err() {
                                warn!(worker_index = self.worker_index, "outcome channel closed unexpectedly.");
                                return;
                            }
                        }
                        Err(_) => {
                            debug!(worker_index = self.worker_index, "delete worker has been completed.");
                            return;
                        }
                    }
                },
                _ = self.cancellation_token.cancelled() => {
                    info!(worker_index = self.worker_index, "delete worker has been cancelled.");
                    return;
                }
            }
        }
    }

    async fn delete_batch(&self, batch: &Batch) -> BatchResult {
        info!(
            phase = "deletion",
            worker_index = self.worker_index,
            batch_index = batch.index,
            batch_size = batch.len(),
            "Processing batch {}: {} delete markers...",
            batch.index + 1,
            batch.len()
        );

        let result = match self.deleter.delete(batch).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    phase = "deletion",
                    worker_index = self.worker_index,
                    batch_index = batch.index,
                    batch_size = batch.len(),
                    error = format!("{e:#}"),
                    "batch {} failed. all {} delete markers counted as failed.",
                    batch.index + 1,
                    batch.len()
                );
                return BatchResult::transport_failed(batch, &e);
            }
        };

        match result.status() {
            BatchStatus::Succeeded => debug!(
                phase = "deletion",
                batch_index = batch.index,
                deleted = result.deleted_count,
                dry_run = result.dry_run,
                "batch completed."
            ),
            BatchStatus::Mixed | BatchStatus::Failed => warn!(
                phase = "deletion",
                batch_index = batch.index,
                deleted = result.deleted_count,
                failed = result.failed_count(),
                unreported = result.unreported_count(),
                "batch {} completed with {} failed delete markers.",
                batch.index + 1,
                result.failed_count()
            ),
        }

        result
    }
}
