//! Shared test utilities for the s3unmark library crate.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::storage::StorageTrait;
use crate::types::error::{Phase, SweepError};
use crate::types::{BulkDeleteOutput, ItemError, ListCursor, MarkerRef, Page};

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// Create a default [`Config`] suitable for most unit / property tests.
///
/// bucket=`"test-bucket"`, prefix=`"prefix/"`, `force` set, defaults otherwise.
pub(crate) fn make_test_config() -> Config {
    Config::for_target("test-bucket", "prefix/")
}

/// `count` markers named `key{start + i}` / `version{start + i}`.
pub(crate) fn make_markers(start: usize, count: usize) -> Vec<MarkerRef> {
    (start..start + count)
        .map(|i| MarkerRef::new(format!("key{i}"), format!("version{i}")))
        .collect()
}

fn page_cursor(index: usize) -> ListCursor {
    ListCursor::new(format!("page-{index}"), None)
}

fn page_index(cursor: Option<&ListCursor>) -> usize {
    cursor
        .and_then(|c| c.key_marker().strip_prefix("page-"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Scripted storage. Pages are served in order; bulk and single deletes
/// succeed except for the configured keys.
#[derive(Clone)]
pub(crate) struct MockStorage {
    pages: Arc<Vec<Vec<MarkerRef>>>,
    fail_list_on_page: Option<usize>,
    failing_keys: Arc<HashSet<String>>,
    missing_keys: Arc<HashSet<String>>,
    bulk_transport_error: bool,
    empty_bulk_output: bool,
    versioning_enabled: bool,
    pub(crate) list_calls: Arc<AtomicUsize>,
    pub(crate) bulk_calls: Arc<AtomicUsize>,
    pub(crate) single_calls: Arc<AtomicUsize>,
    pub(crate) deleted: Arc<Mutex<Vec<MarkerRef>>>,
}

impl MockStorage {
    pub(crate) fn with_pages(pages: Vec<Vec<MarkerRef>>) -> Self {
        Self {
            pages: Arc::new(pages),
            fail_list_on_page: None,
            failing_keys: Arc::new(HashSet::new()),
            missing_keys: Arc::new(HashSet::new()),
            bulk_transport_error: false,
            empty_bulk_output: false,
            versioning_enabled: true,
            list_calls: Arc::new(AtomicUsize::new(0)),
            bulk_calls: Arc::new(AtomicUsize::new(0)),
            single_calls: Arc::new(AtomicUsize::new(0)),
            deleted: Arc::new(Mutex::new(vec![])),
        }
    }

    pub(crate) fn fail_list_on_page(mut self, page: usize) -> Self {
        self.fail_list_on_page = Some(page);
        self
    }

    /// Keys reported as AccessDenied item errors (and failing single deletes).
    pub(crate) fn with_failing_keys(mut self, keys: &[&str]) -> Self {
        self.failing_keys = Arc::new(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Keys whose single delete answers NoSuchKey.
    pub(crate) fn with_missing_keys(mut self, keys: &[&str]) -> Self {
        self.missing_keys = Arc::new(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub(crate) fn with_bulk_transport_error(mut self) -> Self {
        self.bulk_transport_error = true;
        self
    }

    /// DeleteObjects answers without any Deleted or Error entry.
    pub(crate) fn with_empty_bulk_output(mut self) -> Self {
        self.empty_bulk_output = true;
        self
    }

    pub(crate) fn with_versioning(mut self, enabled: bool) -> Self {
        self.versioning_enabled = enabled;
        self
    }

    pub(crate) fn deleted_markers(&self) -> Vec<MarkerRef> {
        self.deleted.lock().unwrap().clone()
    }
}

fn transport(phase: Phase, code: &str) -> anyhow::Error {
    anyhow!(SweepError::Transport {
        phase,
        code: code.to_string(),
        message: format!("mock {code}"),
    })
}

#[async_trait]
impl StorageTrait for MockStorage {
    async fn list_versions_page(&self, cursor: Option<&ListCursor>) -> Result<Page> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let index = page_index(cursor);
        if self.fail_list_on_page == Some(index) {
            return Err(transport(Phase::Discovery, "InternalError"));
        }

        let markers = self.pages.get(index).cloned().unwrap_or_default();
        let next_cursor = (index + 1 < self.pages.len()).then(|| page_cursor(index + 1));
        Ok(Page {
            scanned: markers.len(),
            markers,
            next_cursor,
        })
    }

    async fn bulk_delete(&self, markers: &[MarkerRef]) -> Result<BulkDeleteOutput> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);

        if self.bulk_transport_error {
            return Err(transport(Phase::Deletion, "SlowDown"));
        }
        if self.empty_bulk_output {
            return Ok(BulkDeleteOutput::default());
        }

        let mut output = BulkDeleteOutput::default();
        for marker in markers {
            if self.failing_keys.contains(marker.key()) {
                output.errors.push(ItemError {
                    key: marker.key().to_string(),
                    version_id: marker.version_id().to_string(),
                    code: "AccessDenied".to_string(),
                    message: "Access Denied".to_string(),
                });
            } else {
                output.deleted.push(marker.clone());
            }
        }
        self.deleted
            .lock()
            .unwrap()
            .extend(output.deleted.iter().cloned());
        Ok(output)
    }

    async fn delete_marker(&self, marker: &MarkerRef) -> Result<()> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_keys.contains(marker.key()) {
            return Err(transport(Phase::Deletion, "AccessDenied"));
        }
        if self.missing_keys.contains(marker.key()) {
            return Err(transport(Phase::Deletion, "NoSuchKey"));
        }
        self.deleted.lock().unwrap().push(marker.clone());
        Ok(())
    }

    async fn is_versioning_enabled(&self) -> Result<bool> {
        Ok(self.versioning_enabled)
    }
}
