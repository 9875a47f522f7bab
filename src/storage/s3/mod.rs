pub mod client_builder;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::delete_objects::DeleteObjectsOutput;
use aws_sdk_s3::operation::list_object_versions::ListObjectVersionsOutput;
use aws_sdk_s3::types::{BucketVersioningStatus, Delete, ObjectIdentifier, RequestPayer};
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use leaky_bucket::RateLimiter;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::storage::{Storage, StorageTrait};
use crate::types::error::{Phase, SweepError};
use crate::types::{BulkDeleteOutput, ItemError, ListCursor, MarkerRef, Page, StoragePath};

/// Extracts the S3 error code and message from an AWS SDK error.
///
/// For service errors (S3 API responses), returns the S3 error code
/// (e.g. "AccessDenied", "NoSuchBucket") and the error message from the
/// response. For other error types (network, timeout, construction
/// failure), returns "N/A" as the code and the full error description as
/// the message.
fn extract_sdk_error_details<E: std::fmt::Display + ProvideErrorMetadata>(
    e: &SdkError<E>,
) -> (String, String) {
    if let Some(service_err) = e.as_service_error() {
        (
            service_err.code().unwrap_or("unknown").to_string(),
            service_err.message().unwrap_or("no message").to_string(),
        )
    } else {
        ("N/A".to_string(), e.to_string())
    }
}

/// Readable explanation of the S3 error codes users hit most often.
pub fn describe_s3_error_code(code: &str) -> Option<&'static str> {
    match code {
        "NoSuchBucket" => Some("The specified bucket does not exist."),
        "AccessDenied" => {
            Some("Access denied. Check the credentials and the bucket policy.")
        }
        "InvalidBucketName" => Some("The specified bucket name is not valid."),
        "NoSuchKey" => Some("The specified key does not exist."),
        "SlowDown" => Some("Request rate too high. Lower --worker-size or set --rate-limit-objects."),
        _ => None,
    }
}

/// Convert an SDK failure into the domain error, keeping the provider
/// code and adding the readable explanation when one exists.
fn transport_error<E: std::fmt::Display + ProvideErrorMetadata>(
    phase: Phase,
    e: &SdkError<E>,
) -> SweepError {
    let (code, message) = extract_sdk_error_details(e);
    let message = match describe_s3_error_code(&code) {
        Some(description) => format!("{description} ({message})"),
        None => message,
    };
    SweepError::Transport {
        phase,
        code,
        message,
    }
}

/// S3 storage bound to one bucket and prefix.
#[derive(Clone)]
pub struct S3Storage {
    bucket: String,
    prefix: String,
    max_keys: i32,
    client: Arc<Client>,
    request_payer: Option<RequestPayer>,
    rate_limit_objects_per_sec: Option<Arc<RateLimiter>>,
}

impl S3Storage {
    pub async fn boxed(
        path: StoragePath,
        max_keys: i32,
        client_config: &ClientConfig,
        rate_limit_objects_per_sec: Option<Arc<RateLimiter>>,
    ) -> Storage {
        let StoragePath::S3 { bucket, prefix } = path;
        let client = Arc::new(client_config.create_client().await);

        Box::new(S3Storage {
            bucket,
            prefix,
            max_keys,
            client,
            request_payer: client_config.request_payer.clone(),
            rate_limit_objects_per_sec,
        })
    }

    /// Apply rate limiting for objects per second if configured.
    ///
    /// Acquires a single token. Used for listing and single deletions.
    async fn exec_rate_limit_objects_per_sec(&self) {
        if let Some(ref rate_limiter) = self.rate_limit_objects_per_sec {
            rate_limiter.acquire_one().await;
        }
    }

    /// Acquire one token per marker of a bulk request.
    async fn exec_rate_limit_objects_per_sec_n(&self, count: usize) {
        if count == 0 {
            return;
        }
        if let Some(ref rate_limiter) = self.rate_limit_objects_per_sec {
            rate_limiter.acquire(count).await;
        }
    }
}

#[async_trait]
impl StorageTrait for S3Storage {
    async fn list_versions_page(&self, cursor: Option<&ListCursor>) -> Result<Page> {
        self.exec_rate_limit_objects_per_sec().await;

        let output = self
            .client
            .list_object_versions()
            .set_request_payer(self.request_payer.clone())
            .bucket(&self.bucket)
            .prefix(&self.prefix)
            .set_key_marker(cursor.map(|c| c.key_marker().to_string()))
            .set_version_id_marker(cursor.and_then(|c| c.version_id_marker().map(String::from)))
            .max_keys(self.max_keys)
            .send()
            .await
            .map_err(|e| {
                let error = transport_error(Phase::Discovery, &e);
                tracing::error!(
                    bucket = self.bucket,
                    prefix = self.prefix,
                    error = %error,
                    "S3 ListObjectVersions API call failed for s3://{}/{}.",
                    self.bucket,
                    self.prefix,
                );
                anyhow!(error).context("aws_sdk_s3::client::list_object_versions() failed.")
            })?;

        page_from_output(&output)
    }

    async fn bulk_delete(&self, markers: &[MarkerRef]) -> Result<BulkDeleteOutput> {
        self.exec_rate_limit_objects_per_sec_n(markers.len()).await;

        let object_count = markers.len();
        let objects = markers
            .iter()
            .map(|marker| {
                ObjectIdentifier::builder()
                    .key(marker.key())
                    .version_id(marker.version_id())
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to build ObjectIdentifier")?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .build()
            .context("Failed to build Delete request")?;

        let output = self
            .client
            .delete_objects()
            .set_request_payer(self.request_payer.clone())
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| {
                let error = transport_error(Phase::Deletion, &e);
                tracing::error!(
                    bucket = self.bucket,
                    object_count = object_count,
                    error = %error,
                    "S3 DeleteObjects API call failed for {} delete markers in s3://{}/{}.",
                    object_count,
                    self.bucket,
                    self.prefix,
                );
                anyhow!(error).context("aws_sdk_s3::client::delete_objects() failed.")
            })?;

        Ok(bulk_output_from(&output))
    }

    async fn delete_marker(&self, marker: &MarkerRef) -> Result<()> {
        self.exec_rate_limit_objects_per_sec().await;

        self.client
            .delete_object()
            .set_request_payer(self.request_payer.clone())
            .bucket(&self.bucket)
            .key(marker.key())
            .version_id(marker.version_id())
            .send()
            .await
            .map_err(|e| {
                let error = transport_error(Phase::Deletion, &e);
                tracing::warn!(
                    bucket = self.bucket,
                    key = marker.key(),
                    version_id = marker.version_id(),
                    error = %error,
                    "S3 DeleteObject API call failed for s3://{}/{}.",
                    self.bucket,
                    marker,
                );
                anyhow!(error).context("aws_sdk_s3::client::delete_object() failed.")
            })?;

        Ok(())
    }

    async fn is_versioning_enabled(&self) -> Result<bool> {
        let response = self
            .client
            .get_bucket_versioning()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                let error = transport_error(Phase::Discovery, &e);
                tracing::error!(
                    bucket = self.bucket,
                    error = %error,
                    "S3 GetBucketVersioning API call failed for bucket '{}'.",
                    self.bucket,
                );
                anyhow!(error).context("aws_sdk_s3::client::get_bucket_versioning() failed.")
            })?;

        // Suspended buckets keep the markers created while versioning was on.
        Ok(matches!(
            response.status(),
            Some(BucketVersioningStatus::Enabled | BucketVersioningStatus::Suspended)
        ))
    }
}

/// Reduce a ListObjectVersions response to its current delete markers.
fn page_from_output(output: &ListObjectVersionsOutput) -> Result<Page> {
    let scanned = output.delete_markers().len();
    let markers = output
        .delete_markers()
        .iter()
        .filter(|entry| entry.is_latest() == Some(true))
        .filter_map(|entry| match (entry.key(), entry.version_id()) {
            (Some(key), Some(version_id)) => Some(MarkerRef::new(key, version_id)),
            _ => {
                tracing::warn!(
                    key = entry.key(),
                    "delete marker without key or version id in listing response, skipped."
                );
                None
            }
        })
        .collect();

    let next_cursor = if output.is_truncated() == Some(true) {
        let Some(key_marker) = output.next_key_marker() else {
            return Err(anyhow!(SweepError::Transport {
                phase: Phase::Discovery,
                code: "InvalidResponse".to_string(),
                message: "truncated listing without a next key marker".to_string(),
            }));
        };
        Some(ListCursor::new(
            key_marker,
            output.next_version_id_marker().map(String::from),
        ))
    } else {
        None
    };

    Ok(Page {
        markers,
        next_cursor,
        scanned,
    })
}

/// Collect the per-item outcome of a DeleteObjects response.
///
/// A deleted entry reports the removed marker either as `version_id` or,
/// for some providers, only as `delete_marker_version_id`.
fn bulk_output_from(output: &DeleteObjectsOutput) -> BulkDeleteOutput {
    let deleted = output
        .deleted()
        .iter()
        .filter_map(|deleted| {
            let key = deleted.key()?;
            let version_id = deleted
                .version_id()
                .or(deleted.delete_marker_version_id())
                .unwrap_or_default();
            Some(MarkerRef::new(key, version_id))
        })
        .collect();

    let errors = output
        .errors()
        .iter()
        .map(|error| ItemError {
            key: error.key().unwrap_or_default().to_string(),
            version_id: error.version_id().unwrap_or_default().to_string(),
            code: error.code().unwrap_or("unknown").to_string(),
            message: error.message().unwrap_or("no message").to_string(),
        })
        .collect();

    BulkDeleteOutput { deleted, errors }
}
