// Decides what the terminal shows besides log events.

use s3unmark_rs::config::Config;

/// Whether to draw the live progress line.
///
/// Off in quiet mode (`--show-no-progress`), above `warn` verbosity (log
/// events take over the terminal) and with JSON logging.
pub fn is_progress_indicator_needed(config: &Config) -> bool {
    if config.show_no_progress {
        return false;
    }

    match &config.tracing_config {
        None => true,
        Some(tracing_config) => {
            tracing_config.tracing_level <= log::Level::Warn && !tracing_config.json_tracing
        }
    }
}

/// Where periodic progress lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutput {
    /// The `indicatif` progress line.
    Indicator,
    /// `info` events through the tracing subscriber.
    Log,
    Silent,
}

/// Progress goes to the log whenever the indicator is off for any reason
/// other than `--show-no-progress`.
pub fn progress_output(config: &Config) -> ProgressOutput {
    if config.show_no_progress {
        ProgressOutput::Silent
    } else if is_progress_indicator_needed(config) {
        ProgressOutput::Indicator
    } else {
        ProgressOutput::Log
    }
}

/// Whether to print the final result line.
///
/// Off in quiet mode and with JSON logging, where the structured summary
/// event carries the same numbers.
pub fn is_show_result_needed(config: &Config) -> bool {
    if config.show_no_progress {
        return false;
    }

    config
        .tracing_config
        .as_ref()
        .is_none_or(|tracing_config| !tracing_config.json_tracing)
}
