// Terminal progress display.
//
// Renders the pipeline's progress lines on a single indicatif line and prints
// the human-readable result once the sweep is over.

use std::io;
use std::io::Write;

use indicatif::{HumanCount, HumanDuration, ProgressBar, ProgressStyle};
use s3unmark_rs::{ProgressLine, ProgressReporter, SweepSummary};
use std::time::Duration;

/// [`ProgressReporter`] drawing on a single self-updating terminal line.
pub struct IndicatorReporter {
    progress_text: ProgressBar,
    show_progress: bool,
}

impl IndicatorReporter {
    pub fn new(show_progress: bool) -> Self {
        Self::with_progress_bar(ProgressBar::new(0), show_progress)
    }

    fn with_progress_bar(progress_text: ProgressBar, show_progress: bool) -> Self {
        progress_text.set_style(ProgressStyle::with_template("{wide_msg}").unwrap());
        Self {
            progress_text,
            show_progress,
        }
    }

    /// Replace the progress line with the result of the run.
    pub fn finish(&self, summary: &SweepSummary, show_result: bool) {
        if !show_result {
            self.progress_text.finish_and_clear();
            return;
        }

        self.progress_text
            .set_style(ProgressStyle::with_template("{msg}").unwrap());
        self.progress_text
            .finish_with_message(format_summary(summary));

        println!();
        io::stdout().flush().unwrap()
    }

    #[cfg(test)]
    fn message(&self) -> String {
        self.progress_text.message()
    }
}

impl ProgressReporter for IndicatorReporter {
    fn render(&self, line: &ProgressLine) {
        if self.show_progress {
            self.progress_text.set_message(line.to_string());
        }
    }
}

pub fn format_summary(summary: &SweepSummary) -> String {
    let markers_per_sec = if summary.dry_run || summary.elapsed_seconds <= 0.0 {
        0
    } else {
        (summary.total_deleted as f64 / summary.elapsed_seconds) as u64
    };
    let verb = if summary.dry_run {
        "[dry-run] would remove"
    } else {
        "removed"
    };
    let interrupted = if summary.cancelled {
        ",  cancelled"
    } else if !summary.discovery_complete {
        ",  discovery incomplete"
    } else {
        ""
    };

    format!(
        "{verb} {}/{} delete markers | {:>3} markers/sec,  error {} markers,  success rate {:.1}%,  duration {}{interrupted}",
        summary.total_deleted,
        summary.total_found,
        HumanCount(markers_per_sec),
        summary.total_errors,
        summary.success_rate_percent,
        HumanDuration(Duration::from_secs_f64(summary.elapsed_seconds)),
    )
}
