//! Baseline resolution: find the nearest stored snapshot at or before the
//! point where the current branch diverged from the base branch.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::collaborators::{CommitHistoryProvider, SnapshotStoreIndex};
use crate::domain::{AncestorChain, CommitHash, CoreError, Result};
use crate::obs;

/// What to do with store entries that are not well-formed commit hashes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingPolicy {
    /// Fail resolution with `MalformedSnapshotSet`.
    #[default]
    Reject,
    /// Drop the entry and log a warning.
    Skip,
}

/// Turn raw store entry names into a set of commit hashes.
pub fn parse_store_listing<I, S>(entries: I, policy: ListingPolicy) -> Result<HashSet<CommitHash>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut stored = HashSet::new();
    for entry in entries {
        let entry = entry.as_ref();
        match CommitHash::parse(entry) {
            Ok(hash) => {
                stored.insert(hash);
            }
            Err(_) if policy == ListingPolicy::Skip => {
                warn!(event = "store.entry_skipped", entry = %entry, "ignoring malformed store entry");
            }
            Err(_) => {
                return Err(CoreError::MalformedSnapshotSet {
                    set: "store index".to_string(),
                    reason: format!("entry {entry:?} is not a commit hash"),
                });
            }
        }
    }
    Ok(stored)
}

/// First commit of `chain`, starting at `merge_base`, that is in `stored`.
///
/// Returns the match (if any) and how many commits were scanned, or `None`
/// when the merge-base is not part of the chain at all.
pub fn scan_for_baseline<'a>(
    chain: &'a AncestorChain,
    merge_base: &CommitHash,
    stored: &HashSet<CommitHash>,
) -> Option<(Option<&'a CommitHash>, usize)> {
    let eligible = chain.since(merge_base)?;
    let scan = match eligible.iter().position(|c| stored.contains(c)) {
        Some(idx) => (Some(&eligible[idx]), idx + 1),
        None => (None, eligible.len()),
    };
    Some(scan)
}

/// Combines commit history with the store index to pick a baseline commit.
pub struct BaselineResolver {
    history: Arc<dyn CommitHistoryProvider>,
    store: Arc<dyn SnapshotStoreIndex>,
    policy: ListingPolicy,
}

impl BaselineResolver {
    pub fn new(history: Arc<dyn CommitHistoryProvider>, store: Arc<dyn SnapshotStoreIndex>) -> Self {
        Self {
            history,
            store,
            policy: ListingPolicy::default(),
        }
    }

    pub fn with_listing_policy(mut self, policy: ListingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve the baseline commit for `current_branch` against `base_branch`.
    ///
    /// Returns `Ok(None)` when no eligible commit has a stored snapshot.
    /// The three collaborator reads are issued concurrently; an empty store
    /// short-circuits to `Ok(None)` before history results are inspected.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        base_branch: &str,
        current_branch: &str,
    ) -> Result<Option<CommitHash>> {
        let resolution_err = |source| CoreError::Resolution {
            base_branch: base_branch.to_string(),
            current_branch: current_branch.to_string(),
            source,
        };

        let (merge_base, chain, entries) = tokio::join!(
            self.history.merge_base(base_branch, current_branch),
            self.history.ancestors(base_branch),
            self.store.stored_entries(),
        );

        let entries = entries.map_err(CoreError::Store)?;
        let entry_count = entries.len();
        let stored = parse_store_listing(entries, self.policy)?;
        obs::emit_store_listed(entry_count, stored.len());
        if stored.is_empty() {
            debug!("snapshot store is empty; nothing to compare against");
            return Ok(None);
        }

        let merge_base = merge_base.map_err(resolution_err)?;
        let chain = chain.map_err(resolution_err)?;
        debug!(merge_base = %merge_base.short(), chain_len = chain.len(), "history loaded");

        let (baseline, scanned) =
            scan_for_baseline(&chain, &merge_base, &stored).ok_or_else(|| {
                CoreError::MergeBaseNotInHistory {
                    base_branch: base_branch.to_string(),
                    current_branch: current_branch.to_string(),
                    merge_base: merge_base.to_string(),
                }
            })?;

        obs::emit_baseline_resolved(base_branch, current_branch, &merge_base, baseline, scanned);
        Ok(baseline.cloned())
    }
}
