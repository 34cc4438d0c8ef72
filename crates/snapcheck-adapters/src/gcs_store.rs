//! Snapshot store in a Google Cloud Storage bucket, driven through `gsutil`.

use std::path::Path;

use async_trait::async_trait;
use snapcheck_core::{CollaboratorResult, CommitHash, SnapshotStore, SnapshotStoreIndex};
use tracing::debug;

use crate::error::{into_store, AdapterResult};
use crate::process::run_checked;
use crate::retry::{retry_with_backoff, RetryConfig};

/// Snapshots live at `gs://<bucket>/<commit>/`.
#[derive(Debug, Clone)]
pub struct GcsSnapshotStore {
    bucket: String,
    retry: RetryConfig,
}

impl GcsSnapshotStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn url(&self, rel: &str) -> String {
        format!("gs://{}/{}", self.bucket, rel)
    }

    async fn gsutil(&self, what: &str, args: &[&str]) -> AdapterResult<String> {
        retry_with_backoff(&self.retry, what, || run_checked("gsutil", args, None)).await
    }
}

/// Top-level "directory" names from `gsutil ls gs://<bucket>/` output.
///
/// Only `gs://<bucket>/<name>/` lines count; plain objects at the bucket
/// root are ignored.
pub fn parse_gsutil_listing(bucket: &str, stdout: &str) -> Vec<String> {
    let prefix = format!("gs://{bucket}/");
    stdout
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix(&prefix))
        .filter_map(|rest| rest.strip_suffix('/'))
        .filter(|name| !name.is_empty() && !name.contains('/'))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl SnapshotStoreIndex for GcsSnapshotStore {
    async fn stored_entries(&self) -> CollaboratorResult<Vec<String>> {
        let root = self.url("");
        let out = self
            .gsutil("gsutil ls", &["ls", root.as_str()])
            .await
            .map_err(into_store)?;
        let entries = parse_gsutil_listing(&self.bucket, &out);
        debug!(bucket = %self.bucket, entries = entries.len(), "listed bucket");
        Ok(entries)
    }
}

#[async_trait]
impl SnapshotStore for GcsSnapshotStore {
    async fn fetch(&self, commit: &CommitHash, dest: &Path) -> CollaboratorResult<()> {
        let src = self.url(&format!("{commit}/actual"));
        let dest = dest.to_string_lossy();
        self.gsutil("gsutil rsync (fetch)", &["-m", "rsync", "-r", src.as_str(), &*dest])
            .await
            .map_err(into_store)?;
        Ok(())
    }

    async fn upload(&self, src: &Path, commit: &CommitHash) -> CollaboratorResult<()> {
        let src = src.to_string_lossy();
        let dest = self.url(commit.as_str());
        self.gsutil(
            "gsutil rsync (upload)",
            &["-m", "rsync", "-d", "-r", &*src, dest.as_str()],
        )
        .await
        .map_err(into_store)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_keeps_directory_lines_only() {
        let a = "a".repeat(40);
        let b = "b".repeat(40);
        let stdout = format!(
            "gs://shots/{a}/\ngs://shots/{b}/\ngs://shots/README.md\n\ngs://other/{a}/\n"
        );
        assert_eq!(parse_gsutil_listing("shots", &stdout), vec![a, b]);
    }

    #[test]
    fn listing_passes_malformed_names_through() {
        // Validation is the resolver's job; the listing only finds directories.
        let stdout = "gs://shots/tmp/\ngs://shots/nested/dir/\n";
        assert_eq!(parse_gsutil_listing("shots", stdout), vec!["tmp".to_string()]);
    }

    #[test]
    fn urls_are_rooted_at_bucket() {
        let store = GcsSnapshotStore::new("shots");
        assert_eq!(store.url("abc/actual"), "gs://shots/abc/actual");
        assert_eq!(store.url(""), "gs://shots/");
    }
}
