//! Shared integration test infrastructure for s3unmark-rs.
//!
//! - [`InMemoryBucket`]: a versioned bucket kept in memory, implementing
//!   `StorageTrait` with ListObjectVersions-style pagination. Used by the
//!   scenario tests that run the public pipeline without AWS.
//! - [`TestHelper`]: bucket management and pipeline execution against real
//!   S3 for the `e2e_test` suites, using the `s3unmark-e2e-test` AWS profile.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::types::{
    BucketLocationConstraint, BucketVersioningStatus, CreateBucketConfiguration, Delete,
    ObjectIdentifier, VersioningConfiguration,
};
use s3unmark_rs::config::args::build_config_from_args;
use s3unmark_rs::{
    BulkDeleteOutput, Config, ItemError, ListCursor, MarkerRef, Page, Phase, StorageTrait,
    SweepError, SweepPipeline, SweepSummary, create_pipeline_cancellation_token,
};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// In-memory versioned bucket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionKind {
    Object,
    DeleteMarker,
}

#[derive(Debug, Clone)]
struct Version {
    version_id: String,
    kind: VersionKind,
}

#[derive(Default)]
struct BucketState {
    /// key -> versions, newest first
    versions: BTreeMap<String, Vec<Version>>,
    next_version: u64,
}

impl BucketState {
    fn push(&mut self, key: &str, kind: VersionKind) -> String {
        self.next_version += 1;
        let version_id = format!("v{:08}", self.next_version);
        self.versions.entry(key.to_string()).or_default().insert(
            0,
            Version {
                version_id: version_id.clone(),
                kind,
            },
        );
        version_id
    }

    /// (key, version, is_latest) in ListObjectVersions order.
    fn entries(&self, prefix: &str) -> Vec<(String, Version, bool)> {
        self.versions
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .flat_map(|(key, versions)| {
                versions
                    .iter()
                    .enumerate()
                    .map(move |(i, v)| (key.clone(), v.clone(), i == 0))
            })
            .collect()
    }

    fn remove(&mut self, marker: &MarkerRef) -> bool {
        let Some(versions) = self.versions.get_mut(marker.key()) else {
            return false;
        };
        let before = versions.len();
        versions.retain(|v| v.version_id != marker.version_id());
        let removed = versions.len() < before;
        if versions.is_empty() {
            self.versions.remove(marker.key());
        }
        removed
    }
}

/// A versioned bucket in memory.
///
/// Clones share the bucket contents, so a test keeps one handle for
/// inspection while the pipeline owns another.
#[derive(Clone)]
pub struct InMemoryBucket {
    state: Arc<Mutex<BucketState>>,
    prefix: String,
    page_size: usize,
    denied_keys: Arc<HashSet<String>>,
    fail_listing_on_page: Option<usize>,
    bulk_transport_error: Option<&'static str>,
    pub list_calls: Arc<AtomicUsize>,
    pub bulk_calls: Arc<AtomicUsize>,
    pub single_calls: Arc<AtomicUsize>,
}

impl InMemoryBucket {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BucketState::default())),
            prefix: String::new(),
            page_size: 1000,
            denied_keys: Arc::new(HashSet::new()),
            fail_listing_on_page: None,
            bulk_transport_error: None,
            list_calls: Arc::new(AtomicUsize::new(0)),
            bulk_calls: Arc::new(AtomicUsize::new(0)),
            single_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Version entries per listing page (the `max-keys` of the listing).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_denied_keys(mut self, keys: &[&str]) -> Self {
        self.denied_keys = Arc::new(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn fail_listing_on_page(mut self, page: usize) -> Self {
        self.fail_listing_on_page = Some(page);
        self
    }

    pub fn fail_bulk_requests_with(mut self, code: &'static str) -> Self {
        self.bulk_transport_error = Some(code);
        self
    }

    pub fn put_object(&self, key: &str) -> String {
        self.state.lock().unwrap().push(key, VersionKind::Object)
    }

    /// A plain DELETE on a versioned bucket: adds a delete marker.
    pub fn delete_object(&self, key: &str) -> String {
        self.state.lock().unwrap().push(key, VersionKind::DeleteMarker)
    }

    /// Put then delete `count` objects named `{prefix}{i:05}`.
    pub fn put_deleted_objects(&self, prefix: &str, count: usize) {
        for i in 0..count {
            let key = format!("{prefix}{i:05}");
            self.put_object(&key);
            self.delete_object(&key);
        }
    }

    pub fn latest_kind(&self, key: &str) -> Option<VersionKind> {
        let state = self.state.lock().unwrap();
        state
            .versions
            .get(key)
            .and_then(|versions| versions.first())
            .map(|v| v.kind.clone())
    }

    /// Delete markers that are the latest version of their key.
    pub fn current_delete_markers(&self, prefix: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .entries(prefix)
            .into_iter()
            .filter(|(_, v, is_latest)| *is_latest && v.kind == VersionKind::DeleteMarker)
            .map(|(key, _, _)| key)
            .collect()
    }

    pub fn count_delete_markers(&self, prefix: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .entries(prefix)
            .iter()
            .filter(|(_, v, _)| v.kind == VersionKind::DeleteMarker)
            .count()
    }

    fn transport(phase: Phase, code: &str) -> anyhow::Error {
        anyhow!(SweepError::Transport {
            phase,
            code: code.to_string(),
            message: format!("in-memory {code}"),
        })
    }
}

#[async_trait]
impl StorageTrait for InMemoryBucket {
    async fn list_versions_page(&self, cursor: Option<&ListCursor>) -> Result<Page> {
        let page_index = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing_on_page == Some(page_index) {
            return Err(Self::transport(Phase::Discovery, "InternalError"));
        }

        let entries = self.state.lock().unwrap().entries(&self.prefix);
        let start = match cursor {
            None => 0,
            Some(cursor) => entries
                .iter()
                .position(|(key, v, _)| {
                    key == cursor.key_marker()
                        && Some(v.version_id.as_str()) == cursor.version_id_marker()
                })
                .map_or(entries.len(), |i| i + 1),
        };
        let end = (start + self.page_size).min(entries.len());
        let page_entries = &entries[start..end];

        let next_cursor = (end < entries.len()).then(|| {
            let (key, version, _) = &entries[end - 1];
            ListCursor::new(key.clone(), Some(version.version_id.clone()))
        });

        Ok(Page {
            markers: page_entries
                .iter()
                .filter(|(_, v, is_latest)| *is_latest && v.kind == VersionKind::DeleteMarker)
                .map(|(key, v, _)| MarkerRef::new(key.clone(), v.version_id.clone()))
                .collect(),
            next_cursor,
            scanned: page_entries
                .iter()
                .filter(|(_, v, _)| v.kind == VersionKind::DeleteMarker)
                .count(),
        })
    }

    async fn bulk_delete(&self, markers: &[MarkerRef]) -> Result<BulkDeleteOutput> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = self.bulk_transport_error {
            return Err(Self::transport(Phase::Deletion, code));
        }

        let mut state = self.state.lock().unwrap();
        let mut output = BulkDeleteOutput::default();
        for marker in markers {
            if self.denied_keys.contains(marker.key()) {
                output.errors.push(ItemError {
                    key: marker.key().to_string(),
                    version_id: marker.version_id().to_string(),
                    code: "AccessDenied".to_string(),
                    message: "Access Denied".to_string(),
                });
            } else {
                // Deleting a version that does not exist succeeds on S3.
                state.remove(marker);
                output.deleted.push(marker.clone());
            }
        }
        Ok(output)
    }

    async fn delete_marker(&self, marker: &MarkerRef) -> Result<()> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        if self.denied_keys.contains(marker.key()) {
            return Err(Self::transport(Phase::Deletion, "AccessDenied"));
        }
        if !self.state.lock().unwrap().remove(marker) {
            return Err(Self::transport(Phase::Deletion, "NoSuchVersion"));
        }
        Ok(())
    }

    async fn is_versioning_enabled(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Result of running the sweep pipeline.
#[derive(Debug)]
pub struct PipelineResult {
    pub summary: Option<SweepSummary>,
    pub has_error: bool,
    pub has_panic: bool,
    pub has_warning: bool,
    /// Error messages collected from the pipeline (empty if no errors).
    pub errors: Vec<String>,
}

impl PipelineResult {
    pub fn summary(&self) -> &SweepSummary {
        self.summary.as_ref().expect("pipeline produced no summary")
    }
}

async fn collect_result(mut pipeline: SweepPipeline) -> PipelineResult {
    pipeline.run().await;

    let has_error = pipeline.has_error();
    let errors = pipeline
        .get_errors_and_consume()
        .unwrap_or_default()
        .into_iter()
        .map(|e| format!("{e:?}"))
        .collect();

    PipelineResult {
        summary: pipeline.get_summary(),
        has_error,
        has_panic: pipeline.has_panic(),
        has_warning: pipeline.has_warning(),
        errors,
    }
}

/// Run the pipeline for `config` against an in-memory bucket.
pub async fn run_in_memory(config: Config, bucket: &InMemoryBucket) -> PipelineResult {
    let pipeline = SweepPipeline::with_storage(
        config,
        create_pipeline_cancellation_token(),
        Box::new(bucket.clone()),
    );
    collect_result(pipeline).await
}

// ---------------------------------------------------------------------------
// E2E helpers (real S3)
// ---------------------------------------------------------------------------

/// AWS profile used for all E2E tests.
const AWS_PROFILE: &str = "s3unmark-e2e-test";

/// Used for the location constraint when the profile names no region.
const DEFAULT_REGION: &str = "us-east-1";

/// RAII guard that deletes all versions and the bucket when dropped, even if
/// the test panics.
pub struct BucketGuard {
    helper: Arc<TestHelper>,
    bucket: String,
}

impl Drop for BucketGuard {
    fn drop(&mut self) {
        let helper = self.helper.clone();
        let bucket = self.bucket.clone();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tokio::runtime::Handle::current().block_on(async move {
                helper.delete_bucket_cascade(&bucket).await;
            });
        }));
    }
}

pub struct TestHelper {
    client: Client,
    region: String,
}

impl TestHelper {
    pub async fn new() -> Arc<Self> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .profile_name(AWS_PROFILE)
            .load()
            .await;

        let region = sdk_config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let client = Client::new(&sdk_config);

        Arc::new(Self { client, region })
    }

    pub fn bucket_guard(self: &Arc<Self>, bucket: &str) -> BucketGuard {
        BucketGuard {
            helper: Arc::clone(self),
            bucket: bucket.to_string(),
        }
    }

    pub fn generate_bucket_name(&self) -> String {
        format!("s3unmark-e2e-{}", Uuid::new_v4())
    }

    pub async fn create_bucket(&self, bucket: &str) {
        let mut builder = self.client.create_bucket().bucket(bucket);

        // us-east-1 must NOT specify a location constraint
        if self.region != "us-east-1" {
            let constraint = BucketLocationConstraint::from(self.region.as_str());
            let config = CreateBucketConfiguration::builder()
                .location_constraint(constraint)
                .build();
            builder = builder.create_bucket_configuration(config);
        }

        builder
            .send()
            .await
            .unwrap_or_else(|e| panic!("Failed to create bucket {bucket}: {e}"));
    }

    pub async fn create_versioned_bucket(&self, bucket: &str) {
        self.create_bucket(bucket).await;

        let versioning_config = VersioningConfiguration::builder()
            .status(BucketVersioningStatus::Enabled)
            .build();

        self.client
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(versioning_config)
            .send()
            .await
            .unwrap_or_else(|e| panic!("Failed to enable versioning on {bucket}: {e}"));
    }

    /// Delete every version and delete marker, then the bucket.
    pub async fn delete_bucket_cascade(&self, bucket: &str) {
        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;

        loop {
            let resp = match self
                .client
                .list_object_versions()
                .bucket(bucket)
                .set_key_marker(key_marker.clone())
                .set_version_id_marker(version_id_marker.clone())
                .send()
                .await
            {
                Ok(r) => r,
                Err(_) => break,
            };

            let identifiers: Vec<ObjectIdentifier> = resp
                .versions()
                .iter()
                .filter_map(|v| v.key().zip(v.version_id()))
                .chain(
                    resp.delete_markers()
                        .iter()
                        .filter_map(|m| m.key().zip(m.version_id())),
                )
                .map(|(key, version_id)| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .version_id(version_id)
                        .build()
                        .unwrap()
                })
                .collect();

            for chunk in identifiers.chunks(1000) {
                let delete = Delete::builder()
                    .set_objects(Some(chunk.to_vec()))
                    .quiet(true)
                    .build()
                    .unwrap();
                let _ = self
                    .client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await;
            }

            if resp.is_truncated() == Some(true) {
                key_marker = resp.next_key_marker().map(|s| s.to_string());
                version_id_marker = resp.next_version_id_marker().map(|s| s.to_string());
            } else {
                break;
            }
        }

        let _ = self.client.delete_bucket().bucket(bucket).send().await;
    }

    pub async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body.into())
            .send()
            .await
            .unwrap_or_else(|e| panic!("Failed to put object {bucket}/{key}: {e}"));
    }

    /// Simple DELETE without a version: creates a delete marker.
    pub async fn delete_object(&self, bucket: &str, key: &str) {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .unwrap_or_else(|e| panic!("Failed to delete object {bucket}/{key}: {e}"));
    }

    /// Keys visible to a plain listing under `prefix`.
    pub async fn list_objects(&self, bucket: &str, prefix: &str) -> Vec<String> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.clone())
                .send()
                .await
                .unwrap_or_else(|e| panic!("Failed to list objects in {bucket}/{prefix}: {e}"));

            keys.extend(resp.contents().iter().filter_map(|o| o.key().map(String::from)));

            if resp.is_truncated() == Some(true) {
                continuation_token = resp.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        keys
    }

    /// Keys under `prefix` whose latest version is a delete marker.
    pub async fn list_current_delete_markers(&self, bucket: &str, prefix: &str) -> Vec<String> {
        let mut keys = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_object_versions()
                .bucket(bucket)
                .prefix(prefix)
                .set_key_marker(key_marker.clone())
                .set_version_id_marker(version_id_marker.clone())
                .send()
                .await
                .unwrap_or_else(|e| panic!("Failed to list object versions in {bucket}: {e}"));

            keys.extend(
                resp.delete_markers()
                    .iter()
                    .filter(|m| m.is_latest() == Some(true))
                    .filter_map(|m| m.key().map(String::from)),
            );

            if resp.is_truncated() == Some(true) {
                key_marker = resp.next_key_marker().map(|s| s.to_string());
                version_id_marker = resp.next_version_id_marker().map(|s| s.to_string());
            } else {
                break;
            }
        }

        keys
    }

    /// Build a `Config` from CLI-style arguments, adding the binary name and
    /// the e2e profile unless credentials are given.
    pub fn build_config(args: Vec<&str>) -> Config {
        let mut full_args: Vec<String> = vec!["s3unmark".to_string()];
        full_args.extend(args.iter().map(|s| s.to_string()));

        let has_credentials = full_args
            .iter()
            .any(|a| a.starts_with("--target-profile") || a.starts_with("--target-access-key"));
        if !has_credentials {
            full_args.push("--target-profile".to_string());
            full_args.push(AWS_PROFILE.to_string());
        }

        build_config_from_args(full_args)
            .unwrap_or_else(|e| panic!("Failed to build config from args: {e}"))
    }

    pub async fn run_pipeline(config: Config) -> PipelineResult {
        let pipeline = SweepPipeline::new(config, create_pipeline_cancellation_token()).await;
        collect_result(pipeline).await
    }
}

/// Default timeout for E2E tests (5 minutes).
pub const E2E_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Wraps an async E2E test body with a timeout.
#[macro_export]
macro_rules! e2e_timeout {
    ($body:expr) => {
        tokio::time::timeout(common::E2E_TIMEOUT, $body)
            .await
            .expect("E2E test timed out")
    };
}
