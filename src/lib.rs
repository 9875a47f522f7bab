/*!
# Overview
s3unmark-rs removes the current delete markers from a versioned Amazon S3
bucket, restoring the previous version of every affected object.

A run lists the object versions under a prefix, keeps the delete markers
that are the latest version of their key, and deletes them with batched
DeleteObjects requests (up to 1000 per request), reporting progress and a
final summary.

## Features
- **Paginated discovery**: ListObjectVersions pages are followed to the end;
  a failing page stops discovery and the markers found so far are still
  processed.
- **Batched deletion**: configurable batch size and concurrent workers, with
  an optional per-marker fallback when a bulk request fails outright.
- **Progress accounting**: rate-limited progress lines with percentage, rate
  and ETA, and a structured summary event.
- **Safety**: dry run, confirmation prompt, `--force`.
- **Library first**: the `s3unmark` CLI is a thin wrapper over this crate.

## As a Library

```toml
[dependencies]
s3unmark-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use s3unmark_rs::config::Config;
use s3unmark_rs::config::args::parse_from_args;
use s3unmark_rs::pipeline::SweepPipeline;
use s3unmark_rs::types::token::create_pipeline_cancellation_token;

#[tokio::main]
async fn main() {
    let args = vec!["s3unmark", "s3://my-bucket/logs/", "--dry-run", "--force"];

    let parsed_args = parse_from_args(args).unwrap();
    let config = Config::try_from(parsed_args).unwrap();
    let cancellation_token = create_pipeline_cancellation_token();
    let mut pipeline = SweepPipeline::new(config, cancellation_token).await;
    pipeline.run().await;

    if pipeline.has_error() {
        eprintln!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
    }
    if let Some(summary) = pipeline.get_summary() {
        println!("{summary:?}");
    }
}
```
*/

#![allow(clippy::collapsible_if)]
#![allow(clippy::unnecessary_unwrap)]

pub mod config;
pub mod deleter;
pub mod lister;
pub mod pipeline;
pub mod progress;
pub mod safety;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::Config;
pub use config::args::{CLIArgs, build_config_from_args, parse_from_args};
pub use pipeline::SweepPipeline;
pub use progress::{
    Clock, ProgressLine, ProgressReporter, ProgressSummary, SystemClock, TracingProgressReporter,
};
pub use storage::{Storage, StorageTrait};
pub use types::error::{
    Phase, SweepError, exit_code_from_error, is_cancelled_error, is_configuration_error,
};
pub use types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};
pub use types::{BulkDeleteOutput, ItemError, ListCursor, MarkerRef, Page, SweepSummary};
