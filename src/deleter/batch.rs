//! Batch deletion using the S3 DeleteObjects API.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::storage::Storage;
use crate::types::{Batch, BatchResult, BulkDeleteOutput, MarkerRef};

use super::{Deleter, SingleDeleter, error_code_and_message};

/// Maximum objects per batch DeleteObjects API call (S3 limit).
pub const MAX_BATCH_SIZE: usize = 1000;

/// Errors that concern the whole bucket. Retrying marker by marker would
/// only repeat them.
pub(crate) fn is_bucket_level_error_code(code: &str) -> bool {
    matches!(
        code,
        "AccessDenied" | "AllAccessDisabled" | "NoSuchBucket" | "InvalidBucketName"
    )
}

/// Deletes a batch with a single DeleteObjects request.
///
/// When configured with a fallback, a request that fails as a whole is
/// retried marker by marker with [`SingleDeleter`].
pub struct BatchDeleter {
    target: Storage,
    fallback: Option<SingleDeleter>,
}

impl BatchDeleter {
    pub fn new(target: Storage) -> Self {
        Self {
            target,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: SingleDeleter) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

#[async_trait]
impl Deleter for BatchDeleter {
    async fn delete(&self, batch: &Batch) -> Result<BatchResult> {
        if batch.is_empty() {
            return Ok(BatchResult::new(batch));
        }

        debug!(
            batch_index = batch.index,
            batch_size = batch.len(),
            "sending DeleteObjects batch request."
        );

        let output = match self.target.bulk_delete(&batch.markers).await {
            Ok(output) => output,
            Err(e) => {
                let (code, _) = error_code_and_message(&e);
                match &self.fallback {
                    Some(fallback) if !is_bucket_level_error_code(&code) => {
                        warn!(
                            batch_index = batch.index,
                            s3_error_code = code,
                            "DeleteObjects failed. falling back to DeleteObject for {} delete markers.",
                            batch.len()
                        );
                        return fallback.delete(batch).await;
                    }
                    _ => return Err(e),
                }
            }
        };

        Ok(reconcile(batch, output))
    }
}

/// Match the provider's per-item report against the requested markers.
///
/// Entries for markers that were not requested, or that were already
/// reported, are logged and ignored so that the counts never exceed the
/// batch size.
fn reconcile(batch: &Batch, output: BulkDeleteOutput) -> BatchResult {
    let mut result = BatchResult::new(batch);
    let requested: HashSet<&MarkerRef> = batch.markers.iter().collect();
    let mut settled: HashSet<MarkerRef> = HashSet::new();

    let mut settle = |key: &str, version_id: &str| -> Option<MarkerRef> {
        let marker = if version_id.is_empty() {
            // Some S3-compatible services omit the version in the report.
            batch
                .markers
                .iter()
                .find(|m| m.key() == key && !settled.contains(*m))
                .cloned()
        } else {
            let marker = MarkerRef::new(key, version_id);
            requested.contains(&marker).then_some(marker)
        }?;
        settled.insert(marker.clone()).then_some(marker)
    };

    for deleted in output.deleted {
        if settle(deleted.key(), deleted.version_id()).is_some() {
            result.deleted_count += 1;
        } else {
            warn!(
                batch_index = batch.index,
                key = deleted.key(),
                version_id = deleted.version_id(),
                "DeleteObjects reported an unexpected or repeated deleted entry. ignored."
            );
        }
    }

    for error in output.errors {
        if settle(&error.key, &error.version_id).is_some() {
            warn!(
                batch_index = batch.index,
                key = error.key,
                version_id = error.version_id,
                s3_error_code = error.code,
                s3_error_message = error.message,
                "S3 DeleteObjects partial failure for key '{}': {} ({}).",
                error.key,
                error.code,
                error.message,
            );
            result.errors.push(error);
        } else {
            warn!(
                batch_index = batch.index,
                key = error.key,
                version_id = error.version_id,
                "DeleteObjects reported an unexpected or repeated error entry. ignored."
            );
        }
    }

    let unreported = result.unreported_count();
    if unreported > 0 {
        warn!(
            batch_index = batch.index,
            unreported = unreported,
            "DeleteObjects response did not report {} of {} delete markers.",
            unreported,
            batch.len()
        );
    }

    debug!(
        batch_index = batch.index,
        deleted = result.deleted_count,
        failed = result.errors.len(),
        "DeleteObjects batch completed."
    );

    result
}
