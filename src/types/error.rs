use anyhow::Error;
use thiserror::Error;

/// Application-level error types for s3unmark-rs.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 0: Non-error conditions (Cancelled)
/// - 1: General errors (Transport, Pipeline)
/// - 2: Configuration errors (InvalidConfig, InvalidUri)
/// - 3: Partial failure (some markers deleted, some failed)
#[derive(Error, Debug, PartialEq)]
pub enum SweepError {
    /// A provider call failed before returning a structured response
    /// (network, authentication, throttling, missing bucket).
    #[error("{phase} failed: {code}: {message}")]
    Transport {
        phase: Phase,
        code: String,
        message: String,
    },

    /// Missing or invalid bucket identity, malformed selector or option.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid S3 URI format.
    #[error("Invalid S3 URI: {0}")]
    InvalidUri(String),

    /// Operation cancelled by user.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// Some markers could not be deleted.
    #[error("Partial failure: {deleted} deleted, {failed} failed")]
    PartialFailure { deleted: u64, failed: u64 },

    /// General pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

/// Pipeline phase an error or log event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovery,
    Deletion,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::Deletion => "deletion",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SweepError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SweepError::Cancelled => 0,
            SweepError::InvalidConfig(_) | SweepError::InvalidUri(_) => 2,
            SweepError::PartialFailure { .. } => 3,
            _ => 1,
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            SweepError::InvalidConfig(_) | SweepError::InvalidUri(_)
        )
    }
}

/// Check if an anyhow::Error wraps a cancellation error.
pub fn is_cancelled_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<SweepError>() {
        return *err == SweepError::Cancelled;
    }
    false
}

/// Check if an anyhow::Error wraps a configuration error.
pub fn is_configuration_error(e: &Error) -> bool {
    e.downcast_ref::<SweepError>()
        .is_some_and(SweepError::is_configuration_error)
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<SweepError>() {
        return err.exit_code();
    }
    1
}
