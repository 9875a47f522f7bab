use std::fmt;
use std::fmt::{Debug, Display, Formatter};

use zeroize_derive::{Zeroize, ZeroizeOnDrop};

pub mod error;
pub mod token;

/// Identifies one delete marker: the object key and the version ID of the
/// marker itself.
///
/// Produced by discovery and consumed by the deleters. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkerRef {
    key: String,
    version_id: String,
}

impl MarkerRef {
    pub fn new(key: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: version_id.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn version_id(&self) -> &str {
        &self.version_id
    }
}

impl Display for MarkerRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}?versionId={}", self.key, self.version_id)
    }
}

/// Opaque continuation position of a version listing.
///
/// Wraps the `(key_marker, version_id_marker)` pair returned by
/// ListObjectVersions so that the discovery loop only has to deal with
/// `Option<ListCursor>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCursor {
    key_marker: String,
    version_id_marker: Option<String>,
}

impl ListCursor {
    pub fn new(key_marker: impl Into<String>, version_id_marker: Option<String>) -> Self {
        Self {
            key_marker: key_marker.into(),
            version_id_marker,
        }
    }

    pub fn key_marker(&self) -> &str {
        &self.key_marker
    }

    pub fn version_id_marker(&self) -> Option<&str> {
        self.version_id_marker.as_deref()
    }
}

/// One version listing response, reduced to the current delete markers it
/// contained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Current (latest) delete markers, in listing order.
    pub markers: Vec<MarkerRef>,
    /// Where the next page starts. `None` on the last page.
    pub next_cursor: Option<ListCursor>,
    /// Number of delete marker entries in the response, latest or not.
    pub scanned: usize,
}

impl Page {
    pub fn is_truncated(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// A contiguous run of discovered markers submitted as one bulk delete.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub index: usize,
    pub markers: Vec<MarkerRef>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// A marker the provider refused to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub key: String,
    pub version_id: String,
    pub code: String,
    pub message: String,
}

/// Per-item outcome of a bulk delete request, as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkDeleteOutput {
    pub deleted: Vec<MarkerRef>,
    pub errors: Vec<ItemError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every marker was deleted.
    Succeeded,
    /// Some markers were deleted and some failed.
    Mixed,
    /// Nothing in the batch was deleted.
    Failed,
}

/// Accounting record of one batch.
///
/// `deleted_count` and `failed_count()` are tracked independently. A
/// provider response that omits some markers leaves them in neither.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub index: usize,
    pub size: usize,
    pub deleted_count: u64,
    pub errors: Vec<ItemError>,
    /// Set when the bulk call itself failed and no per-item outcome exists.
    pub transport_error: Option<String>,
    pub dry_run: bool,
}

impl BatchResult {
    pub fn new(batch: &Batch) -> Self {
        Self {
            index: batch.index,
            size: batch.len(),
            deleted_count: 0,
            errors: vec![],
            transport_error: None,
            dry_run: false,
        }
    }

    /// The whole batch failed before the provider returned per-item results.
    pub fn transport_failed(batch: &Batch, error: &anyhow::Error) -> Self {
        Self {
            transport_error: Some(format!("{error:#}")),
            ..Self::new(batch)
        }
    }

    pub fn failed_count(&self) -> u64 {
        if self.transport_error.is_some() {
            self.size as u64
        } else {
            self.errors.len() as u64
        }
    }

    /// Markers with a known outcome (deleted or failed).
    pub fn processed_count(&self) -> u64 {
        self.deleted_count + self.failed_count()
    }

    /// Markers the provider reported neither as deleted nor as failed.
    pub fn unreported_count(&self) -> u64 {
        (self.size as u64).saturating_sub(self.processed_count())
    }

    pub fn status(&self) -> BatchStatus {
        if self.transport_error.is_none()
            && self.errors.is_empty()
            && self.deleted_count == self.size as u64
        {
            BatchStatus::Succeeded
        } else if self.deleted_count == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Mixed
        }
    }
}

/// Final report of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSummary {
    /// Current delete markers found by discovery.
    pub total_found: u64,
    pub total_deleted: u64,
    /// Markers whose deletion failed, per item or as part of a failed batch.
    pub total_errors: u64,
    pub elapsed_seconds: f64,
    pub success_rate_percent: f64,
    /// Batches that reported an outcome.
    pub batches: usize,
    pub dry_run: bool,
    pub cancelled: bool,
    /// False when discovery stopped early on a listing error or cancellation.
    pub discovery_complete: bool,
}

impl SweepSummary {
    /// `total_deleted / total_found` as a percentage, `0.0` when nothing was found.
    pub fn success_rate_percent(total_deleted: u64, total_found: u64) -> f64 {
        if total_found == 0 {
            0.0
        } else {
            total_deleted as f64 / total_found as f64 * 100.0
        }
    }

    pub fn has_failures(&self) -> bool {
        self.total_errors > 0
    }
}

/// S3 storage path specification.
#[derive(Debug, Clone, PartialEq)]
pub enum StoragePath {
    S3 { bucket: String, prefix: String },
}

impl Display for StoragePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let StoragePath::S3 { bucket, prefix } = self;
        write!(f, "s3://{bucket}/{prefix}")
    }
}

/// AWS credential sources supported by s3unmark.
#[derive(Debug, Clone)]
pub enum S3Credentials {
    Profile(String),
    Credentials { access_keys: AccessKeys },
    FromEnvironment,
}

/// AWS access key pair, cleared from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessKeys {
    pub access_key: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Debug for AccessKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys = f.debug_struct("AccessKeys");
        let session_token = self
            .session_token
            .as_ref()
            .map_or("None", |_| "** redacted **");
        keys.field("access_key", &self.access_key)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &session_token);
        keys.finish()
    }
}
