use anyhow::Result;
use async_trait::async_trait;
use dyn_clone::DynClone;
use leaky_bucket::RateLimiter;
use std::sync::Arc;

use crate::config::Config;
use crate::types::{BulkDeleteOutput, ListCursor, MarkerRef, Page};

pub mod s3;

/// Type alias for a boxed Storage trait object.
pub type Storage = Box<dyn StorageTrait + Send + Sync>;

/// Object-storage operations needed to find and remove delete markers.
///
/// The bucket and prefix are fixed when the storage is created. Errors are
/// returned as `anyhow::Error` wrapping a
/// [`SweepError::Transport`](crate::types::error::SweepError::Transport)
/// when the provider rejected the call.
#[async_trait]
pub trait StorageTrait: DynClone {
    /// Fetch one page of the version listing starting at `cursor`
    /// (`None` for the first page).
    ///
    /// The returned page holds only the current (latest) delete markers.
    async fn list_versions_page(&self, cursor: Option<&ListCursor>) -> Result<Page>;

    /// Delete up to 1000 markers with one DeleteObjects request.
    ///
    /// `Ok` carries the per-item outcome reported by the provider, which
    /// may contain errors for individual markers. `Err` means the request
    /// as a whole failed.
    async fn bulk_delete(&self, markers: &[MarkerRef]) -> Result<BulkDeleteOutput>;

    /// Delete a single marker with DeleteObject.
    async fn delete_marker(&self, marker: &MarkerRef) -> Result<()>;

    /// `true` if versioning is enabled or suspended on the bucket, i.e. the
    /// bucket may hold delete markers.
    async fn is_versioning_enabled(&self) -> Result<bool>;
}

dyn_clone::clone_trait_object!(StorageTrait);

// Default refill interval 100ms
const REFILL_PER_INTERVAL_DIVIDER: usize = 10;

/// Build the objects-per-second limiter shared by all storage clones.
pub fn build_rate_limiter(rate_limit_objects: Option<u32>) -> Option<Arc<RateLimiter>> {
    rate_limit_objects.map(|rate_limit_value| {
        let refill = if (rate_limit_value as usize) <= REFILL_PER_INTERVAL_DIVIDER {
            1
        } else {
            rate_limit_value as usize / REFILL_PER_INTERVAL_DIVIDER
        };
        Arc::new(
            RateLimiter::builder()
                .max(rate_limit_value as usize)
                .initial(rate_limit_value as usize)
                .refill(refill)
                .fair(true)
                .build(),
        )
    })
}

/// Create the S3 storage for the configured target.
pub async fn create_storage(config: &Config) -> Storage {
    let client_config = config.target_client_config.clone().unwrap_or_default();
    let rate_limit_objects_per_sec = build_rate_limiter(config.rate_limit_objects);

    s3::S3Storage::boxed(
        config.target.clone(),
        config.max_keys,
        &client_config,
        rate_limit_objects_per_sec,
    )
    .await
}
