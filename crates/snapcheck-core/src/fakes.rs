//! In-memory fakes for the collaborator traits (testing only).
//!
//! `FakeHistory`, `FakeStoreIndex`, `MemorySnapshotStore`, `FakeChecker` and
//! `FakeNotifier` satisfy the contracts in [`crate::collaborators`] without
//! git, object storage or ImageMagick.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::collaborators::{
    CommitHistoryProvider, Notifier, SimilarityChecker, SnapshotStore, SnapshotStoreIndex,
};
use crate::domain::{
    AncestorChain, CollaboratorError, CollaboratorResult, CommitHash, ComparisonOutcome,
    FuzzTolerance,
};

// ---------------------------------------------------------------------------
// FakeHistory
// ---------------------------------------------------------------------------

/// Commit history backed by explicit merge-base and chain tables.
#[derive(Debug, Default)]
pub struct FakeHistory {
    merge_bases: HashMap<(String, String), CommitHash>,
    chains: HashMap<String, AncestorChain>,
    calls: AtomicUsize,
}

impl FakeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merge_base(mut self, base: &str, current: &str, commit: CommitHash) -> Self {
        self.merge_bases
            .insert((base.to_string(), current.to_string()), commit);
        self
    }

    /// Register the chain of `branch`, tip first.
    pub fn with_chain(mut self, branch: &str, commits: Vec<CommitHash>) -> Self {
        self.chains
            .insert(branch.to_string(), AncestorChain::new(commits));
        self
    }

    /// Total number of provider calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommitHistoryProvider for FakeHistory {
    async fn merge_base(
        &self,
        base_branch: &str,
        current_branch: &str,
    ) -> CollaboratorResult<CommitHash> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.merge_bases
            .get(&(base_branch.to_string(), current_branch.to_string()))
            .cloned()
            .ok_or_else(|| {
                CollaboratorError::History(format!(
                    "no merge-base for {base_branch} and {current_branch}"
                ))
            })
    }

    async fn ancestors(&self, branch: &str) -> CollaboratorResult<AncestorChain> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.chains
            .get(branch)
            .cloned()
            .ok_or_else(|| CollaboratorError::History(format!("unknown branch {branch}")))
    }
}

// ---------------------------------------------------------------------------
// FakeStoreIndex
// ---------------------------------------------------------------------------

/// Store index returning a fixed listing.
#[derive(Debug, Default)]
pub struct FakeStoreIndex {
    entries: Vec<String>,
    unavailable: bool,
    listings: AtomicUsize,
}

impl FakeStoreIndex {
    /// Raw entries, well-formed or not.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_commits<'a, I>(commits: I) -> Self
    where
        I: IntoIterator<Item = &'a CommitHash>,
    {
        Self::new(commits.into_iter().map(|c| c.to_string()))
    }

    /// An index whose listing always fails.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn listing_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStoreIndex for FakeStoreIndex {
    async fn stored_entries(&self) -> CollaboratorResult<Vec<String>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(CollaboratorError::Store("listing failed".to_string()));
        }
        Ok(self.entries.clone())
    }
}

// ---------------------------------------------------------------------------
// MemorySnapshotStore
// ---------------------------------------------------------------------------

type Tree = BTreeMap<PathBuf, Vec<u8>>;

/// Snapshot store keeping every uploaded tree in memory.
///
/// Layout mirrors the real stores: an uploaded working directory keeps its
/// `actual/` subtree, which is what `fetch` hands back.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    trees: Mutex<HashMap<CommitHash, Tree>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored snapshot whose `actual/` images are `images`.
    pub fn with_snapshot(self, commit: &CommitHash, images: &[(&str, &[u8])]) -> Self {
        let tree = images
            .iter()
            .map(|(name, bytes)| (Path::new("actual").join(name), bytes.to_vec()))
            .collect();
        self.lock().insert(commit.clone(), tree);
        self
    }

    /// Relative paths stored under `commit`, sorted.
    pub fn stored_paths(&self, commit: &CommitHash) -> Vec<PathBuf> {
        self.lock()
            .get(commit)
            .map(|tree| tree.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CommitHash, Tree>> {
        self.trees.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn read_tree(root: &Path, dir: &Path, out: &mut Tree) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            read_tree(root, &path, out)?;
        } else {
            let rel = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            out.insert(rel, std::fs::read(&path)?);
        }
    }
    Ok(())
}

#[async_trait]
impl SnapshotStoreIndex for MemorySnapshotStore {
    async fn stored_entries(&self) -> CollaboratorResult<Vec<String>> {
        Ok(self.lock().keys().map(|c| c.to_string()).collect())
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn fetch(&self, commit: &CommitHash, dest: &Path) -> CollaboratorResult<()> {
        let tree = self
            .lock()
            .get(commit)
            .cloned()
            .ok_or_else(|| CollaboratorError::Store(format!("no snapshot for {commit}")))?;
        std::fs::create_dir_all(dest)?;
        for (rel, bytes) in tree {
            if let Ok(name) = rel.strip_prefix("actual") {
                std::fs::write(dest.join(name), bytes)?;
            }
        }
        Ok(())
    }

    async fn upload(&self, src: &Path, commit: &CommitHash) -> CollaboratorResult<()> {
        let mut tree = Tree::new();
        read_tree(src, src, &mut tree)?;
        self.lock().insert(commit.clone(), tree);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeChecker
// ---------------------------------------------------------------------------

/// One recorded similarity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckCall {
    pub expected: PathBuf,
    pub actual: PathBuf,
    pub diff: Option<PathBuf>,
    pub fuzz: String,
}

/// Similarity checker scripted by image file name.
///
/// Unlisted images pass. Changed images report the requested diff path.
/// With [`FakeChecker::with_delay`] every check holds for a while and the
/// highest number of overlapping checks is kept in [`FakeChecker::peak_in_flight`].
#[derive(Debug, Default)]
pub struct FakeChecker {
    changed: HashSet<String>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<CheckCall>>,
}

impl FakeChecker {
    pub fn always_pass() -> Self {
        Self::default()
    }

    pub fn changing(mut self, name: &str) -> Self {
        self.changed.insert(name.to_string());
        self
    }

    /// The check for `name` returns an error (unreadable image).
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// The check for `name` panics inside its worker.
    pub fn panicking(mut self, name: &str) -> Self {
        self.panicking.insert(name.to_string());
        self
    }

    /// Every check sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<CheckCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Most checks that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SimilarityChecker for FakeChecker {
    async fn compare(
        &self,
        expected: &Path,
        actual: &Path,
        diff: Option<&Path>,
        fuzz: &FuzzTolerance,
    ) -> CollaboratorResult<ComparisonOutcome> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(CheckCall {
                expected: expected.to_path_buf(),
                actual: actual.to_path_buf(),
                diff: diff.map(Path::to_path_buf),
                fuzz: fuzz.to_string(),
            });

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let name = actual
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        if self.panicking.contains(name) {
            panic!("checker crashed on {name}");
        }
        if self.failing.contains(name) {
            return Err(CollaboratorError::Check(format!("cannot decode {name}")));
        }
        if self.changed.contains(name) {
            return Ok(ComparisonOutcome::Changed {
                diff: diff.map(Path::to_path_buf),
            });
        }
        Ok(ComparisonOutcome::Passed)
    }
}

// ---------------------------------------------------------------------------
// FakeNotifier
// ---------------------------------------------------------------------------

/// Notifier that records every published body.
#[derive(Debug, Default)]
pub struct FakeNotifier {
    published: Mutex<Vec<String>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn publish(&self, body: &str) -> CollaboratorResult<()> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(body.to_string());
        Ok(())
    }
}
