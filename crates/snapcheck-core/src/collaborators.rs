//! Collaborator contracts consumed by the core.
//!
//! - `CommitHistoryProvider`: merge-base and ancestry
//! - `SnapshotStoreIndex`: which commits have a stored snapshot set
//! - `SnapshotStore`: fetch/upload of those sets
//! - `SimilarityChecker`: per-image tolerant comparison
//! - `Notifier`: delivery of a rendered report
//!
//! All traits are async and backend-agnostic. In-memory fakes live in the
//! `fakes` module.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{
    AncestorChain, CollaboratorResult, CommitHash, ComparisonOutcome, FuzzTolerance,
};

/// Source of commit ancestry.
#[async_trait]
pub trait CommitHistoryProvider: Send + Sync {
    /// Nearest common ancestor of `base_branch` and `current_branch`.
    async fn merge_base(
        &self,
        base_branch: &str,
        current_branch: &str,
    ) -> CollaboratorResult<CommitHash>;

    /// Commits of `branch`, tip first.
    async fn ancestors(&self, branch: &str) -> CollaboratorResult<AncestorChain>;
}

/// Listing of stored snapshot sets.
#[async_trait]
pub trait SnapshotStoreIndex: Send + Sync {
    /// Raw names of the top-level entries in the store, one per stored
    /// snapshot set. Validation into [`CommitHash`]es is done by the caller
    /// so malformed entries are handled by an explicit policy.
    async fn stored_entries(&self) -> CollaboratorResult<Vec<String>>;
}

/// A snapshot store that can also move snapshot directories around.
#[async_trait]
pub trait SnapshotStore: SnapshotStoreIndex {
    /// Copy the captured images of `commit` into `dest`.
    async fn fetch(&self, commit: &CommitHash, dest: &Path) -> CollaboratorResult<()>;

    /// Mirror `src` into the store under `commit`, replacing what was there.
    async fn upload(&self, src: &Path, commit: &CommitHash) -> CollaboratorResult<()>;
}

/// Tolerant image comparison.
#[async_trait]
pub trait SimilarityChecker: Send + Sync {
    /// Compare `actual` against `expected`. When `diff` is given the checker
    /// may write a diff image there and report it in the outcome.
    async fn compare(
        &self,
        expected: &Path,
        actual: &Path,
        diff: Option<&Path>,
        fuzz: &FuzzTolerance,
    ) -> CollaboratorResult<ComparisonOutcome>;
}

/// Delivery of a rendered report body.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, body: &str) -> CollaboratorResult<()>;
}
