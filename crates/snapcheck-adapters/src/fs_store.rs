//! Snapshot store on a local (or mounted) directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use snapcheck_core::workdir::{copy_dir_all, reset_dir};
use snapcheck_core::{
    CollaboratorError, CollaboratorResult, CommitHash, SnapshotStore, SnapshotStoreIndex,
};
use tracing::debug;

/// Stores every snapshot as `<root>/<commit>/`, mirroring the working
/// directory layout (`actual/`, `expected/`, `diff/`, `result.json`).
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    root: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn commit_dir(&self, commit: &CommitHash) -> PathBuf {
        self.root.join(commit.as_str())
    }
}

fn store_err(e: snapcheck_core::CoreError) -> CollaboratorError {
    CollaboratorError::Store(e.to_string())
}

/// Runs a synchronous directory operation on the blocking pool.
async fn off_runtime<T, F>(op: F) -> CollaboratorResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> snapcheck_core::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| CollaboratorError::Store(format!("store worker aborted: {e}")))?
        .map_err(store_err)
}

#[async_trait]
impl SnapshotStoreIndex for FsSnapshotStore {
    async fn stored_entries(&self) -> CollaboratorResult<Vec<String>> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            // Nothing uploaded yet.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                entries.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        entries.sort();
        debug!(root = %self.root.display(), entries = entries.len(), "listed store");
        Ok(entries)
    }
}

#[async_trait]
impl SnapshotStore for FsSnapshotStore {
    async fn fetch(&self, commit: &CommitHash, dest: &Path) -> CollaboratorResult<()> {
        let src = self.commit_dir(commit).join("actual");
        if !tokio::fs::try_exists(&src).await? {
            return Err(CollaboratorError::Store(format!(
                "no snapshot stored for {commit} under {}",
                self.root.display()
            )));
        }
        let dest = dest.to_path_buf();
        let files = off_runtime(move || copy_dir_all(&src, &dest)).await?;
        debug!(commit = %commit.short(), files = files, "fetched snapshot");
        Ok(())
    }

    async fn upload(&self, src: &Path, commit: &CommitHash) -> CollaboratorResult<()> {
        let src = src.to_path_buf();
        let dest = self.commit_dir(commit);
        let files = off_runtime(move || {
            reset_dir(&dest)?;
            copy_dir_all(&src, &dest)
        })
        .await?;
        debug!(commit = %commit.short(), files = files, "stored snapshot");
        Ok(())
    }
}
