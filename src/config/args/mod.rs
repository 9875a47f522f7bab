use crate::config::{
    CLITimeoutConfig, ClientConfig, Config, ForceRetryConfig, RetryConfig, TracingConfig,
};
use crate::types::{AccessKeys, S3Credentials, StoragePath};
use aws_sdk_s3::types::RequestPayer;
use aws_smithy_types::checksum_config::RequestChecksumCalculation;
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::ffi::OsString;
use std::time::Duration;


// ---------------------------------------------------------------------------
// Default constants
// ---------------------------------------------------------------------------

const DEFAULT_WORKER_SIZE: u16 = 1;
const DEFAULT_BATCH_SIZE: u16 = 1000;
const DEFAULT_AWS_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_FORCE_RETRY_COUNT: u32 = 2;
const DEFAULT_FORCE_RETRY_INTERVAL_MILLISECONDS: u64 = 1000;
const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 = 100;
const DEFAULT_PROGRESS_INTERVAL_SECONDS: u64 = 5;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_AWS_SDK_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_WARN_AS_ERROR: bool = false;
const DEFAULT_FORCE_PATH_STYLE: bool = false;
const DEFAULT_DRY_RUN: bool = false;
const DEFAULT_MAX_KEYS: i32 = 1000;
const DEFAULT_DISABLE_STALLED_STREAM_PROTECTION: bool = false;
const DEFAULT_ACCELERATE: bool = false;
const DEFAULT_REQUEST_PAYER: bool = false;
const DEFAULT_SHOW_NO_PROGRESS: bool = false;
const DEFAULT_FALLBACK_TO_SINGLE_DELETE: bool = false;
const DEFAULT_FORCE: bool = false;

// ---------------------------------------------------------------------------
// Error messages
// ---------------------------------------------------------------------------

const ERROR_MESSAGE_INVALID_TARGET: &str =
    "Target must be an S3 path starting with 's3://' (e.g., s3://bucket/prefix).";
const ERROR_MESSAGE_TARGET_NOT_SET: &str =
    "No target bucket. Pass s3://<BUCKET_NAME>[/prefix] or --bucket (S3_BUCKET_NAME).";
const ERROR_MESSAGE_WORKER_SIZE_ZERO: &str = "Worker size must be at least 1.";
const ERROR_MESSAGE_BATCH_SIZE_ZERO: &str = "Batch size must be at least 1.";
const ERROR_MESSAGE_BATCH_SIZE_TOO_LARGE: &str = "Batch size must be at most 1000 (S3 API limit).";
const ERROR_MESSAGE_PROGRESS_INTERVAL_ZERO: &str = "Progress interval must be at least 1 second.";
const ERROR_MESSAGE_MAX_KEYS_OUT_OF_RANGE: &str = "Max keys must be between 1 and 1000.";

// ---------------------------------------------------------------------------
// Value parser helpers
// ---------------------------------------------------------------------------

fn check_s3_target(s: &str) -> Result<String, String> {
    if s.starts_with("s3://") && s.len() > 5 {
        Ok(s.to_string())
    } else {
        Err(ERROR_MESSAGE_INVALID_TARGET.to_string())
    }
}

// ---------------------------------------------------------------------------
// CLIArgs (clap-derived argument struct)
// ---------------------------------------------------------------------------

/// s3unmark - Remove delete markers from versioned Amazon S3 buckets.
///
/// Finds every current delete marker under a prefix and deletes it,
/// which makes the previous version of each object current again.
///
/// Example:
///   s3unmark s3://my-bucket/logs/2023/ --dry-run
///   s3unmark s3://my-bucket/ --force -v
///   S3_BUCKET_NAME=my-bucket S3_PREFIX=data/ s3unmark --force
#[derive(Parser, Clone, Debug)]
#[command(name = "s3unmark", version, about, long_about = None)]
pub struct CLIArgs {
    /// S3 target path: s3://<BUCKET_NAME>[/prefix]
    #[arg(
        env,
        help = "s3://<BUCKET_NAME>[/prefix]",
        value_parser = check_s3_target,
        default_value_if("auto_complete_shell", clap::builder::ArgPredicate::IsPresent, "s3://ignored"),
        required = false,
    )]
    pub target: Option<String>,

    /// Bucket name, used when no s3:// target is given.
    #[arg(long, env = "S3_BUCKET_NAME", value_parser = NonEmptyStringValueParser::new(), help_heading = "General")]
    pub bucket: Option<String>,

    /// Key prefix, used together with --bucket.
    #[arg(long, env = "S3_PREFIX", help_heading = "General")]
    pub prefix: Option<String>,

    /// Simulation mode. Lists delete markers but does not delete them.
    #[arg(short = 'd', long, env, default_value_t = DEFAULT_DRY_RUN, help_heading = "General")]
    pub dry_run: bool,

    /// Don't show the progress bar.
    #[arg(long, env, default_value_t = DEFAULT_SHOW_NO_PROGRESS, help_heading = "General")]
    pub show_no_progress: bool,

    /// Seconds between two progress updates.
    #[arg(long, env, default_value_t = DEFAULT_PROGRESS_INTERVAL_SECONDS, help_heading = "General")]
    pub progress_interval_seconds: u64,

    // -----------------------------------------------------------------------
    // Deletion options
    // -----------------------------------------------------------------------
    /// Number of delete markers per DeleteObjects request (1–1000). Default: 1000.
    #[arg(long, env, default_value_t = DEFAULT_BATCH_SIZE, help_heading = "Deletion")]
    pub batch_size: u16,

    /// When a DeleteObjects request fails, retry its markers one by one
    /// with DeleteObject.
    #[arg(long, env, default_value_t = DEFAULT_FALLBACK_TO_SINGLE_DELETE, help_heading = "Deletion")]
    pub fallback_to_single_delete: bool,

    // -----------------------------------------------------------------------
    // Safety options
    // -----------------------------------------------------------------------
    /// Skip confirmation prompt before deleting.
    #[arg(short = 'f', long, env, default_value_t = DEFAULT_FORCE, help_heading = "Safety")]
    pub force: bool,

    // -----------------------------------------------------------------------
    // Performance options
    // -----------------------------------------------------------------------
    /// Number of concurrent DeleteObjects requests. Default: 1.
    #[arg(long, env, default_value_t = DEFAULT_WORKER_SIZE, help_heading = "Performance")]
    pub worker_size: u16,

    /// Maximum delete markers per second.
    #[arg(long, env, help_heading = "Performance")]
    pub rate_limit_objects: Option<u32>,

    // -----------------------------------------------------------------------
    // Logging options
    // -----------------------------------------------------------------------
    /// Verbosity level. -q (quiet), default (normal), -v, -vv, -vvv.
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Output logs in JSON format.
    #[arg(long, env, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Enable AWS SDK tracing.
    #[arg(long, env, default_value_t = DEFAULT_AWS_SDK_TRACING, help_heading = "Logging")]
    pub aws_sdk_tracing: bool,

    /// Enable tracing span events.
    #[arg(long, env, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    // -----------------------------------------------------------------------
    // Retry options
    // -----------------------------------------------------------------------
    /// Maximum retry attempts for AWS SDK operations. Default: 10.
    #[arg(long, env, default_value_t = DEFAULT_AWS_MAX_ATTEMPTS, help_heading = "Retry")]
    pub aws_max_attempts: u32,

    /// Initial backoff in milliseconds for retries. Default: 100.
    #[arg(long, env, default_value_t = DEFAULT_INITIAL_BACKOFF_MILLISECONDS, help_heading = "Retry")]
    pub initial_backoff_milliseconds: u64,

    /// Retries of each DeleteObject call in fallback mode (after SDK retries). Default: 2.
    #[arg(long, env, default_value_t = DEFAULT_FORCE_RETRY_COUNT, help_heading = "Retry")]
    pub force_retry_count: u32,

    /// Interval in ms between force retries. Default: 1000.
    #[arg(long, env, default_value_t = DEFAULT_FORCE_RETRY_INTERVAL_MILLISECONDS, help_heading = "Retry")]
    pub force_retry_interval_milliseconds: u64,

    // -----------------------------------------------------------------------
    // Timeout options
    // -----------------------------------------------------------------------
    /// Overall operation timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub operation_timeout_milliseconds: Option<u64>,

    /// Per-attempt operation timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub operation_attempt_timeout_milliseconds: Option<u64>,

    /// Connection timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub connect_timeout_milliseconds: Option<u64>,

    /// Read timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub read_timeout_milliseconds: Option<u64>,

    // -----------------------------------------------------------------------
    // AWS configuration
    // -----------------------------------------------------------------------
    /// AWS profile for the target. If not set, uses the default profile.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub target_profile: Option<String>,

    /// AWS access key ID for the target.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub target_access_key: Option<String>,

    /// AWS secret access key for the target.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub target_secret_key: Option<String>,

    /// AWS session token for the target.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub target_session_token: Option<String>,

    /// AWS region for the target. Falls back to AWS_REGION and the profile.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub target_region: Option<String>,

    /// Custom S3-compatible endpoint URL (e.g. MinIO, Wasabi).
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub target_endpoint_url: Option<String>,

    /// Force path-style access (required for some S3-compatible services).
    #[arg(long, env, default_value_t = DEFAULT_FORCE_PATH_STYLE, help_heading = "AWS")]
    pub target_force_path_style: bool,

    /// Enable S3 Transfer Acceleration.
    #[arg(long, env, default_value_t = DEFAULT_ACCELERATE, help_heading = "AWS")]
    pub target_accelerate: bool,

    /// Enable requester-pays for the target bucket.
    #[arg(long, env, default_value_t = DEFAULT_REQUEST_PAYER, help_heading = "AWS")]
    pub target_request_payer: bool,

    /// Disable stalled stream protection.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_STALLED_STREAM_PROTECTION, help_heading = "AWS")]
    pub disable_stalled_stream_protection: bool,

    // -----------------------------------------------------------------------
    // Advanced options
    // -----------------------------------------------------------------------
    /// Treat warnings as errors (exit code 1 instead of 3).
    #[arg(long, env, default_value_t = DEFAULT_WARN_AS_ERROR, help_heading = "Advanced")]
    pub warn_as_error: bool,

    /// Max keys per ListObjectVersions request. Default: 1000.
    #[arg(long, env, default_value_t = DEFAULT_MAX_KEYS, help_heading = "Advanced")]
    pub max_keys: i32,

    /// Generate shell completions.
    #[arg(long, env, help_heading = "Advanced")]
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

// ---------------------------------------------------------------------------
// parse_from_args (public API)
// ---------------------------------------------------------------------------

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use s3unmark_rs::config::args::parse_from_args;
///
/// let args = vec!["s3unmark", "s3://my-bucket/prefix/", "--dry-run"];
/// let cli_args = parse_from_args(args).unwrap();
/// assert!(cli_args.dry_run);
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

// ---------------------------------------------------------------------------
// Validation and Config conversion
// ---------------------------------------------------------------------------

impl CLIArgs {
    fn validate(&self) -> Result<(), String> {
        if self.worker_size == 0 {
            return Err(ERROR_MESSAGE_WORKER_SIZE_ZERO.to_string());
        }
        if self.batch_size == 0 {
            return Err(ERROR_MESSAGE_BATCH_SIZE_ZERO.to_string());
        }
        if self.batch_size > 1000 {
            return Err(ERROR_MESSAGE_BATCH_SIZE_TOO_LARGE.to_string());
        }
        if self.progress_interval_seconds == 0 {
            return Err(ERROR_MESSAGE_PROGRESS_INTERVAL_ZERO.to_string());
        }
        if !(1..=1000).contains(&self.max_keys) {
            return Err(ERROR_MESSAGE_MAX_KEYS_OUT_OF_RANGE.to_string());
        }
        Ok(())
    }

    fn build_client_config(&self) -> Option<ClientConfig> {
        let credential = if let Some(ref profile) = self.target_profile {
            S3Credentials::Profile(profile.clone())
        } else if let Some(ref access_key) = self.target_access_key {
            let secret_key = self.target_secret_key.clone().unwrap_or_default();
            S3Credentials::Credentials {
                access_keys: AccessKeys {
                    access_key: access_key.clone(),
                    secret_access_key: secret_key,
                    session_token: self.target_session_token.clone(),
                },
            }
        } else {
            S3Credentials::FromEnvironment
        };

        let request_payer = if self.target_request_payer {
            Some(RequestPayer::Requester)
        } else {
            None
        };

        Some(ClientConfig {
            credential,
            region: self.target_region.clone(),
            endpoint_url: self.target_endpoint_url.clone(),
            force_path_style: self.target_force_path_style,
            accelerate: self.target_accelerate,
            request_payer,
            retry_config: RetryConfig {
                aws_max_attempts: self.aws_max_attempts,
                initial_backoff_milliseconds: self.initial_backoff_milliseconds,
            },
            cli_timeout_config: CLITimeoutConfig {
                operation_timeout_milliseconds: self.operation_timeout_milliseconds,
                operation_attempt_timeout_milliseconds: self.operation_attempt_timeout_milliseconds,
                connect_timeout_milliseconds: self.connect_timeout_milliseconds,
                read_timeout_milliseconds: self.read_timeout_milliseconds,
            },
            disable_stalled_stream_protection: self.disable_stalled_stream_protection,
            request_checksum_calculation: RequestChecksumCalculation::WhenRequired,
        })
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.verbosity.log_level()?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            aws_sdk_tracing: self.aws_sdk_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }

    /// An s3:// target wins over --bucket/--prefix.
    fn parse_target(&self) -> Result<StoragePath, String> {
        let Some(uri) = self.target.as_deref() else {
            let bucket = self
                .bucket
                .clone()
                .ok_or_else(|| ERROR_MESSAGE_TARGET_NOT_SET.to_string())?;
            return Ok(StoragePath::S3 {
                bucket,
                prefix: self.prefix.clone().unwrap_or_default(),
            });
        };

        let without_scheme = uri
            .strip_prefix("s3://")
            .ok_or_else(|| ERROR_MESSAGE_INVALID_TARGET.to_string())?;

        let (bucket, prefix) = match without_scheme.split_once('/') {
            Some((bucket, prefix)) => (bucket.to_string(), prefix.to_string()),
            None => (without_scheme.to_string(), String::new()),
        };

        if bucket.is_empty() {
            return Err(ERROR_MESSAGE_INVALID_TARGET.to_string());
        }

        Ok(StoragePath::S3 { bucket, prefix })
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        args.validate()?;

        let target = args.parse_target()?;
        let target_client_config = args.build_client_config();
        let tracing_config = args.build_tracing_config();

        let config = Config {
            target,
            show_no_progress: args.show_no_progress,
            target_client_config,
            force_retry_config: ForceRetryConfig {
                force_retry_count: args.force_retry_count,
                force_retry_interval_milliseconds: args.force_retry_interval_milliseconds,
            },
            tracing_config,
            worker_size: args.worker_size,
            warn_as_error: args.warn_as_error,
            dry_run: args.dry_run,
            force: args.force,
            rate_limit_objects: args.rate_limit_objects,
            max_keys: args.max_keys,
            batch_size: args.batch_size,
            fallback_to_single_delete: args.fallback_to_single_delete,
            progress_interval: Duration::from_secs(args.progress_interval_seconds),
            auto_complete_shell: args.auto_complete_shell,
        };

        config.validate().map_err(|e| e.to_string())?;

        Ok(config)
    }
}
