use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::types::{Batch, BatchResult};

use super::Deleter;

/// Reports every marker as deleted without calling the provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunDeleter;

#[async_trait]
impl Deleter for DryRunDeleter {
    async fn delete(&self, batch: &Batch) -> Result<BatchResult> {
        for marker in &batch.markers {
            debug!(
                batch_index = batch.index,
                key = marker.key(),
                version_id = marker.version_id(),
                "[dry-run] delete marker would be deleted."
            );
        }
        info!(
            batch_index = batch.index,
            "[dry-run] {} delete markers would be deleted.",
            batch.len()
        );

        Ok(BatchResult {
            deleted_count: batch.len() as u64,
            dry_run: true,
            ..BatchResult::new(batch)
        })
    }
}
