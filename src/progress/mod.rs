//! Progress accounting for the discovery and deletion phases.
//!
//! A [`ProgressAccountant`] accumulates processed/failed counts, renders a
//! [`ProgressLine`] through an injected [`ProgressReporter`] at most once per
//! interval, and produces a [`ProgressSummary`] when the phase completes.
//! Time comes from an injected [`Clock`] so that the render gating can be
//! tested without sleeping.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::types::error::Phase;

const BAR_WIDTH: usize = 30;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Receives rendered progress lines.
pub trait ProgressReporter: Send + Sync {
    fn render(&self, line: &ProgressLine);
}

/// Writes progress lines as `info` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgressReporter;

impl ProgressReporter for TracingProgressReporter {
    fn render(&self, line: &ProgressLine) {
        tracing::info!(
            phase = line.phase.as_str(),
            processed = line.processed,
            failed = line.failed,
            total = line.total,
            completed = line.completed,
            "{line}"
        );
    }
}

/// Counters of one accountant.
#[derive(Debug, Clone, Copy)]
pub struct ProgressState {
    pub processed_count: u64,
    pub failed_count: u64,
    pub start_time: Instant,
    pub total_expected: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccountantState {
    Idle,
    Running,
    Completed,
}

/// A snapshot of the counters, ready to be displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLine {
    pub phase: Phase,
    pub processed: u64,
    pub failed: u64,
    pub total: Option<u64>,
    pub elapsed: Duration,
    /// Items per second since the accountant started.
    pub rate: f64,
    /// `None` while nothing has been processed.
    pub eta: Option<Duration>,
    pub completed: bool,
}

impl ProgressLine {
    /// Percentage of `total` processed. `None` when the total is unknown.
    pub fn percent(&self) -> Option<f64> {
        self.total.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.processed.min(total) as f64 / total as f64) * 100.0
            }
        })
    }

    fn bar(&self) -> Option<String> {
        let percent = self.percent()?;
        let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
        let filled = filled.min(BAR_WIDTH);
        Some(format!(
            "[{}{}]",
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled)
        ))
    }
}

impl fmt::Display for ProgressLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.total, self.bar(), self.percent()) {
            (Some(total), Some(bar), Some(percent)) => {
                let eta = self
                    .eta
                    .map_or_else(|| "unknown".to_string(), |eta| format!("{}s", eta.as_secs()));
                write!(
                    f,
                    "{} {bar} {percent:.1}% {}/{total} ({} failed) {:.1}/s ETA {eta}",
                    self.phase, self.processed, self.failed, self.rate
                )
            }
            _ => write!(
                f,
                "{} {} processed ({} failed) {:.1}/s",
                self.phase, self.processed, self.failed, self.rate
            ),
        }
    }
}

/// Final totals of an accountant.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub phase: Phase,
    pub processed: u64,
    pub failed: u64,
    pub succeeded: u64,
    pub total_expected: Option<u64>,
    pub elapsed: Duration,
    /// Fraction in `0.0..=1.0`.
    pub success_rate: f64,
    /// Items per second over the whole phase.
    pub throughput: f64,
}

/// Success ratio against the known total, or against the processed count
/// when no total was given. Zero when the denominator is zero.
pub fn success_rate(succeeded: u64, processed: u64, total_expected: Option<u64>) -> f64 {
    let denominator = total_expected.unwrap_or(processed);
    if denominator == 0 {
        0.0
    } else {
        succeeded as f64 / denominator as f64
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64();
    if seconds > 0.0 {
        count as f64 / seconds
    } else {
        0.0
    }
}

/// Accumulates the progress of one phase.
///
/// Owned by a single task. `update` after [`complete_snapshot`](Self::complete_snapshot)
/// panics.
pub struct ProgressAccountant {
    phase: Phase,
    state: ProgressState,
    lifecycle: AccountantState,
    interval: Duration,
    last_render: Instant,
    clock: Arc<dyn Clock>,
    reporter: Arc<dyn ProgressReporter>,
}

impl ProgressAccountant {
    pub fn new(
        phase: Phase,
        total_expected: Option<u64>,
        interval: Duration,
        clock: Arc<dyn Clock>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        let start_time = clock.now();
        Self {
            phase,
            state: ProgressState {
                processed_count: 0,
                failed_count: 0,
                start_time,
                total_expected,
            },
            lifecycle: AccountantState::Idle,
            interval,
            last_render: start_time,
            clock,
            reporter,
        }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn is_completed(&self) -> bool {
        self.lifecycle == AccountantState::Completed
    }

    /// Add `processed` handled items, `failed` of which failed. Renders only
    /// when the interval has elapsed since the last render.
    pub fn update(&mut self, processed: u64, failed: u64) {
        self.accumulate(processed, failed, false);
    }

    /// Like [`update`](Self::update) but always renders.
    pub fn force_update(&mut self, processed: u64, failed: u64) {
        self.accumulate(processed, failed, true);
    }

    /// Render the final line and return the totals. Terminal.
    pub fn complete_snapshot(&mut self) -> ProgressSummary {
        assert!(
            !self.is_completed(),
            "ProgressAccountant::complete_snapshot() called more than once"
        );
        self.lifecycle = AccountantState::Completed;

        let now = self.clock.now();
        self.render_at(now, true);

        let elapsed = now.saturating_duration_since(self.state.start_time);
        let processed = self.state.processed_count;
        let failed = self.state.failed_count;
        let succeeded = processed.saturating_sub(failed);

        ProgressSummary {
            phase: self.phase,
            processed,
            failed,
            succeeded,
            total_expected: self.state.total_expected,
            elapsed,
            success_rate: success_rate(succeeded, processed, self.state.total_expected),
            throughput: per_second(processed, elapsed),
        }
    }

    fn accumulate(&mut self, processed: u64, failed: u64, force: bool) {
        assert!(
            !self.is_completed(),
            "ProgressAccountant updated after completion"
        );
        self.lifecycle = AccountantState::Running;

        self.state.processed_count += processed;
        self.state.failed_count += failed;

        let now = self.clock.now();
        if force || now.saturating_duration_since(self.last_render) >= self.interval {
            self.render_at(now, false);
        }
    }

    fn render_at(&mut self, now: Instant, completed: bool) {
        self.last_render = now;
        let line = self.line_at(now, completed);
        self.reporter.render(&line);
    }

    fn line_at(&self, now: Instant, completed: bool) -> ProgressLine {
        let elapsed = now.saturating_duration_since(self.state.start_time);
        let processed = self.state.processed_count;
        let rate = per_second(processed, elapsed);

        let eta = match self.state.total_expected {
            Some(total) if processed > 0 && rate > 0.0 => {
                let remaining = total.saturating_sub(processed);
                Some(Duration::from_secs_f64(remaining as f64 / rate))
            }
            _ => None,
        };

        ProgressLine {
            phase: self.phase,
            processed,
            failed: self.state.failed_count,
            total: self.state.total_expected,
            elapsed,
            rate,
            eta,
            completed,
        }
    }
}
