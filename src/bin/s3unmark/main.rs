use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing::{debug, error, trace, warn};

use s3unmark_rs::config::Config;
use s3unmark_rs::{
    CLIArgs, ProgressReporter, SweepError, SweepPipeline, TracingProgressReporter,
    create_pipeline_cancellation_token, exit_code_from_error, is_cancelled_error,
};

mod ctrl_c_handler;
pub mod indicator;
mod tracing_init;
pub mod ui_config;

const EXIT_CODE_WARNING: i32 = 3;

/// s3unmark - removes the current delete markers from a versioned S3 bucket.
///
/// This binary is a thin wrapper over the s3unmark-rs library.
#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config_exit_if_err();

    if let Some(shell) = config.auto_complete_shell {
        generate(
            shell,
            &mut CLIArgs::command(),
            "s3unmark",
            &mut std::io::stdout(),
        );

        return Ok(());
    }

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    run(config).await
}

#[cfg_attr(coverage_nightly, coverage(off))]
fn load_config_exit_if_err() -> Config {
    match Config::try_from(CLIArgs::parse()) {
        Ok(config) => config,
        Err(error_message) => {
            clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit()
        }
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    let Some(tracing_config) = config.tracing_config.as_ref() else {
        return false;
    };

    tracing_init::init_tracing(tracing_config);
    true
}

fn progress_reporter(
    config: &Config,
    indicator: &Arc<indicator::IndicatorReporter>,
) -> Arc<dyn ProgressReporter> {
    match ui_config::progress_output(config) {
        ui_config::ProgressOutput::Indicator => indicator.clone(),
        ui_config::ProgressOutput::Log => Arc::new(TracingProgressReporter),
        // The indicator draws nothing when progress is off.
        ui_config::ProgressOutput::Silent => indicator.clone(),
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
async fn run(config: Config) -> Result<()> {
    let cancellation_token = create_pipeline_cancellation_token();
    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let start_time = tokio::time::Instant::now();
    debug!("sweep pipeline start.");

    let indicator = Arc::new(indicator::IndicatorReporter::new(
        ui_config::is_progress_indicator_needed(&config),
    ));
    let mut pipeline = SweepPipeline::new(config.clone(), cancellation_token)
        .await
        .with_reporter(progress_reporter(&config, &indicator));

    pipeline.run().await;

    if let Some(summary) = pipeline.get_summary() {
        indicator.finish(&summary, ui_config::is_show_result_needed(&config));
    }

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());

    if let Some(errors) = pipeline.get_errors_and_consume() {
        let mut exit_code = 1;
        for err in &errors {
            if is_cancelled_error(err) {
                debug!("sweep cancelled by user.");
                return Ok(());
            }
            error!("{:#}", err);
            exit_code = exit_code_from_error(err);
        }
        error!(duration_sec = duration_sec, "s3unmark failed.");
        std::process::exit(exit_code);
    }

    if pipeline.has_warning() {
        if let Some(summary) = pipeline.get_summary().filter(|s| s.has_failures()) {
            warn!(
                "{}",
                SweepError::PartialFailure {
                    deleted: summary.total_deleted,
                    failed: summary.total_errors,
                }
            );
        }
        debug!(duration_sec = duration_sec, "s3unmark completed with warnings.");
        std::process::exit(EXIT_CODE_WARNING);
    }

    debug!(duration_sec = duration_sec, "s3unmark has been completed.");
    Ok(())
}
