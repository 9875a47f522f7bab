//! Single-marker deletion using the S3 DeleteObject API.
//!
//! Used as the fallback of [`BatchDeleter`](super::BatchDeleter) when a
//! DeleteObjects request fails as a whole.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ForceRetryConfig;
use crate::storage::Storage;
use crate::types::{Batch, BatchResult, ItemError, MarkerRef};

use super::{Deleter, error_code_and_message};

/// Determines whether an S3 deletion error code is retryable.
///
/// Retryable errors are transient server-side or network issues:
/// `InternalError`, `ServiceUnavailable`, `SlowDown`, `RequestTimeout`,
/// and failures without a service response.
pub(crate) fn is_retryable_error_code(code: &str) -> bool {
    matches!(
        code,
        "InternalError" | "SlowDown" | "ServiceUnavailable" | "RequestTimeout" | "unknown" | "N/A"
    )
}

/// The marker no longer exists. Deleting it again is a no-op.
pub(crate) fn is_already_deleted_error_code(code: &str) -> bool {
    matches!(code, "NoSuchKey" | "NoSuchVersion" | "NotFound" | "404")
}

/// Deletes markers one at a time using the S3 DeleteObject API.
pub struct SingleDeleter {
    target: Storage,
    force_retry_config: ForceRetryConfig,
}

impl SingleDeleter {
    pub fn new(target: Storage, force_retry_config: ForceRetryConfig) -> Self {
        Self {
            target,
            force_retry_config,
        }
    }

    async fn delete_with_retry(&self, batch_index: usize, marker: &MarkerRef) -> Result<(), ItemError> {
        let max_attempts = self.force_retry_config.force_retry_count + 1;
        let mut attempt = 1;

        loop {
            let e = match self.target.delete_marker(marker).await {
                Ok(()) => {
                    debug!(
                        batch_index = batch_index,
                        key = marker.key(),
                        version_id = marker.version_id(),
                        "DeleteObject succeeded."
                    );
                    return Ok(());
                }
                Err(e) => e,
            };

            let (code, message) = error_code_and_message(&e);

            if is_already_deleted_error_code(&code) {
                debug!(
                    batch_index = batch_index,
                    key = marker.key(),
                    version_id = marker.version_id(),
                    "delete marker already removed."
                );
                return Ok(());
            }

            if attempt < max_attempts && is_retryable_error_code(&code) {
                warn!(
                    batch_index = batch_index,
                    key = marker.key(),
                    version_id = marker.version_id(),
                    attempt = attempt,
                    max_attempts = max_attempts,
                    s3_error_code = code,
                    "S3 DeleteObject fallback attempt {}/{} failed for key '{}'.",
                    attempt,
                    max_attempts,
                    marker.key(),
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(
                    self.force_retry_config.force_retry_interval_milliseconds,
                ))
                .await;
                continue;
            }

            warn!(
                batch_index = batch_index,
                key = marker.key(),
                version_id = marker.version_id(),
                s3_error_code = code,
                s3_error_message = message,
                "S3 DeleteObject failed for key '{}': {} ({}).",
                marker.key(),
                code,
                message,
            );
            return Err(ItemError {
                key: marker.key().to_string(),
                version_id: marker.version_id().to_string(),
                code,
                message,
            });
        }
    }
}

#[async_trait]
impl Deleter for SingleDeleter {
    async fn delete(&self, batch: &Batch) -> Result<BatchResult> {
        let mut result = BatchResult::new(batch);

        for marker in &batch.markers {
            match self.delete_with_retry(batch.index, marker).await {
                Ok(()) => result.deleted_count += 1,
                Err(item_error) => result.errors.push(item_error),
            }
        }

        Ok(result)
    }
}
