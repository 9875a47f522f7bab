pub mod args;

use std::time::Duration;

use aws_sdk_s3::types::RequestPayer;
use aws_smithy_types::checksum_config::RequestChecksumCalculation;

use crate::deleter::batch::MAX_BATCH_SIZE;
use crate::types::error::SweepError;
use crate::types::{S3Credentials, StoragePath};

const MIN_BUCKET_NAME_LEN: usize = 3;
const MAX_BUCKET_NAME_LEN: usize = 63;
const MAX_KEYS_LIMIT: i32 = 1000;

/// Main configuration for the s3unmark-rs pipeline.
///
/// Built once at startup (from CLI arguments via
/// [`Config::try_from`](args::CLIArgs) or with [`Config::for_target`]) and
/// passed by value into [`SweepPipeline`](crate::SweepPipeline).
///
/// # Quick Start
///
/// ```
/// use s3unmark_rs::Config;
///
/// let mut config = Config::for_target("my-bucket", "logs/2024/");
/// config.dry_run = true;
/// assert_eq!(config.batch_size, 1000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub target: StoragePath,
    pub show_no_progress: bool,
    pub target_client_config: Option<ClientConfig>,
    pub force_retry_config: ForceRetryConfig,
    pub tracing_config: Option<TracingConfig>,
    /// Number of bulk-delete requests in flight at once.
    pub worker_size: u16,
    pub warn_as_error: bool,
    pub dry_run: bool,
    pub force: bool,
    pub rate_limit_objects: Option<u32>,
    /// Page size of each ListObjectVersions request.
    pub max_keys: i32,
    /// Markers per DeleteObjects request (1-1000).
    pub batch_size: u16,
    /// Retry a batch marker by marker when the bulk call fails outright.
    pub fallback_to_single_delete: bool,
    /// Minimum time between two progress renders.
    pub progress_interval: Duration,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

impl Config {
    /// Create a `Config` with sensible defaults for the given bucket and prefix.
    ///
    /// The `force` flag is set so that library callers are never prompted.
    pub fn for_target(bucket: &str, prefix: &str) -> Self {
        Config {
            target: StoragePath::S3 {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
            },
            force: true,
            ..Config::default()
        }
    }

    pub fn bucket(&self) -> &str {
        let StoragePath::S3 { bucket, .. } = &self.target;
        bucket
    }

    pub fn prefix(&self) -> &str {
        let StoragePath::S3 { prefix, .. } = &self.target;
        prefix
    }

    /// Batch size clamped to the DeleteObjects ceiling.
    pub fn effective_batch_size(&self) -> usize {
        (self.batch_size as usize).clamp(1, MAX_BATCH_SIZE)
    }

    /// Reject configurations that must never reach the provider.
    ///
    /// Called by the pipeline before any request is issued.
    pub fn validate(&self) -> Result<(), SweepError> {
        validate_bucket_name(self.bucket())?;

        if self.batch_size == 0 || self.batch_size as usize > MAX_BATCH_SIZE {
            return Err(SweepError::InvalidConfig(format!(
                "batch size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        if self.worker_size == 0 {
            return Err(SweepError::InvalidConfig(
                "worker size must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_KEYS_LIMIT).contains(&self.max_keys) {
            return Err(SweepError::InvalidConfig(format!(
                "max keys must be between 1 and {MAX_KEYS_LIMIT}, got {}",
                self.max_keys
            )));
        }
        if self.progress_interval.is_zero() {
            return Err(SweepError::InvalidConfig(
                "progress interval must be greater than zero".to_string(),
            ));
        }
        if self.rate_limit_objects == Some(0) {
            return Err(SweepError::InvalidConfig(
                "rate limit must be at least 1 object per second".to_string(),
            ));
        }

        Ok(())
    }
}

/// Checks a bucket name against the S3 naming rules.
pub fn validate_bucket_name(bucket: &str) -> Result<(), SweepError> {
    if bucket.is_empty() {
        return Err(SweepError::InvalidConfig(
            "bucket name is not set".to_string(),
        ));
    }

    let len = bucket.len();
    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&len) {
        return Err(SweepError::InvalidConfig(format!(
            "bucket name '{bucket}' must be between {MIN_BUCKET_NAME_LEN} and {MAX_BUCKET_NAME_LEN} characters long"
        )));
    }

    let valid_chars = bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-');
    let valid_edges = bucket
        .chars()
        .next()
        .zip(bucket.chars().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

    if !valid_chars || !valid_edges || bucket.contains("..") {
        return Err(SweepError::InvalidConfig(format!(
            "invalid bucket name '{bucket}'"
        )));
    }

    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target: StoragePath::S3 {
                bucket: String::new(),
                prefix: String::new(),
            },
            show_no_progress: false,
            target_client_config: None,
            force_retry_config: ForceRetryConfig::default(),
            tracing_config: None,
            worker_size: 1,
            warn_as_error: false,
            dry_run: false,
            force: false,
            rate_limit_objects: None,
            max_keys: 1000,
            batch_size: MAX_BATCH_SIZE as u16,
            fallback_to_single_delete: false,
            progress_interval: Duration::from_secs(5),
            auto_complete_shell: None,
        }
    }
}

impl Default for ForceRetryConfig {
    fn default() -> Self {
        ForceRetryConfig {
            force_retry_count: 2,
            force_retry_interval_milliseconds: 1000,
        }
    }
}

/// AWS S3 client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credential: S3Credentials,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub accelerate: bool,
    pub request_payer: Option<RequestPayer>,
    pub retry_config: RetryConfig,
    pub cli_timeout_config: CLITimeoutConfig,
    pub disable_stalled_stream_protection: bool,
    pub request_checksum_calculation: RequestChecksumCalculation,
}

/// Credentials and region from the environment, SDK retry defaults of the CLI.
impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            credential: S3Credentials::FromEnvironment,
            region: None,
            endpoint_url: None,
            force_path_style: false,
            accelerate: false,
            request_payer: None,
            retry_config: RetryConfig {
                aws_max_attempts: 10,
                initial_backoff_milliseconds: 100,
            },
            cli_timeout_config: CLITimeoutConfig {
                operation_timeout_milliseconds: None,
                operation_attempt_timeout_milliseconds: None,
                connect_timeout_milliseconds: None,
                read_timeout_milliseconds: None,
            },
            disable_stalled_stream_protection: false,
            request_checksum_calculation: RequestChecksumCalculation::WhenRequired,
        }
    }
}

/// Retry configuration for AWS SDK operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

/// Timeout configuration for AWS SDK operations.
#[derive(Debug, Clone)]
pub struct CLITimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub operation_attempt_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
    pub read_timeout_milliseconds: Option<u64>,
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}

/// Application-level retries of the per-marker fallback deletion
/// (on top of the AWS SDK retries).
#[derive(Debug, Clone, Copy)]
pub struct ForceRetryConfig {
    pub force_retry_count: u32,
    pub force_retry_interval_milliseconds: u64,
}
