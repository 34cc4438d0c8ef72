//! Commit history from the `git` CLI.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use snapcheck_core::{AncestorChain, CollaboratorResult, CommitHash, CommitHistoryProvider};

use crate::error::{into_history, AdapterError, AdapterResult};
use crate::process::run_checked;

/// [`CommitHistoryProvider`] backed by a local git checkout.
///
/// Base branches are read from `<remote>/<branch>` when a remote is set, so
/// CI checkouts with only the PR branch checked out still see the base
/// branch history.
#[derive(Debug, Clone)]
pub struct GitCliHistory {
    repo_dir: PathBuf,
    remote: Option<String>,
}

impl GitCliHistory {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            remote: Some("origin".to_string()),
        }
    }

    /// Read base branches from `remote` (`None` reads local branches).
    pub fn with_remote(mut self, remote: Option<String>) -> Self {
        self.remote = remote;
        self
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    fn base_ref(&self, branch: &str) -> String {
        match &self.remote {
            Some(remote) => format!("{remote}/{branch}"),
            None => branch.to_string(),
        }
    }

    async fn git(&self, args: &[&str]) -> AdapterResult<String> {
        run_checked("git", args, Some(&self.repo_dir)).await
    }

    /// Commit checked out at `HEAD`.
    pub async fn current_commit(&self) -> AdapterResult<CommitHash> {
        let out = self.git(&["rev-parse", "HEAD"]).await?;
        parse_hash(&out)
    }

    /// Name of the branch checked out at `HEAD`.
    pub async fn current_branch(&self) -> AdapterResult<String> {
        self.git(&["symbolic-ref", "--short", "HEAD"]).await
    }
}

fn parse_hash(line: &str) -> AdapterResult<CommitHash> {
    CommitHash::parse(line).map_err(|e| AdapterError::Parse {
        program: "git".to_string(),
        detail: e.to_string(),
    })
}

/// Parse `git log --pretty=%H` output, tip first.
pub fn parse_log(stdout: &str) -> AdapterResult<AncestorChain> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(parse_hash)
        .collect()
}

#[async_trait]
impl CommitHistoryProvider for GitCliHistory {
    async fn merge_base(
        &self,
        base_branch: &str,
        current_branch: &str,
    ) -> CollaboratorResult<CommitHash> {
        let base = self.base_ref(base_branch);
        let out = self
            .git(&["merge-base", base.as_str(), current_branch])
            .await
            .map_err(into_history)?;
        parse_hash(&out).map_err(into_history)
    }

    async fn ancestors(&self, branch: &str) -> CollaboratorResult<AncestorChain> {
        let base = self.base_ref(branch);
        let out = self
            .git(&["log", base.as_str(), "--pretty=%H"])
            .await
            .map_err(into_history)?;
        parse_log(&out).map_err(into_history)
    }
}
