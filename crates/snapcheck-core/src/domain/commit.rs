//! Commit identity and ancestry chains.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::CoreError;

/// Git object id of a commit (SHA-1 or SHA-256, lowercase hex).
///
/// Not `Ord`: commits are ordered by ancestry, which only an
/// [`AncestorChain`] knows about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitHash(String);

impl CommitHash {
    /// Parse a full commit hash. Surrounding whitespace is trimmed.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        let well_formed = matches!(trimmed.len(), 40 | 64)
            && trimmed.chars().all(|c| c.is_ascii_hexdigit());
        if !well_formed {
            return Err(CoreError::InvalidCommitHash(raw.to_string()));
        }
        Ok(CommitHash(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form (first 8 hex chars) for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl FromStr for CommitHash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommitHash::parse(s)
    }
}

impl TryFrom<String> for CommitHash {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        CommitHash::parse(&s)
    }
}

impl From<CommitHash> for String {
    fn from(hash: CommitHash) -> Self {
        hash.0
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Commits of a branch in history order, tip first.
///
/// The order is exactly what the history provider returned; resolution
/// scans it front to back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorChain(Vec<CommitHash>);

impl AncestorChain {
    pub fn new(commits: Vec<CommitHash>) -> Self {
        AncestorChain(commits)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tip(&self) -> Option<&CommitHash> {
        self.0.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommitHash> {
        self.0.iter()
    }

    /// The chain from `merge_base` (inclusive) to the oldest commit.
    ///
    /// Returns `None` when `merge_base` is not part of the chain.
    pub fn since(&self, merge_base: &CommitHash) -> Option<&[CommitHash]> {
        self.0
            .iter()
            .position(|c| c == merge_base)
            .map(|idx| &self.0[idx..])
    }
}

impl FromIterator<CommitHash> for AncestorChain {
    fn from_iter<I: IntoIterator<Item = CommitHash>>(iter: I) -> Self {
        AncestorChain(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha(n: u32) -> CommitHash {
        CommitHash::parse(&format!("{n:040x}")).unwrap()
    }

    #[test]
    fn parse_accepts_sha1_and_sha256() {
        assert!(CommitHash::parse(&"a".repeat(40)).is_ok());
        assert!(CommitHash::parse(&"b".repeat(64)).is_ok());
    }

    #[test]
    fn parse_normalises_case_and_whitespace() {
        let raw = format!("  {}\n", "ABCDEF0123".repeat(4));
        let hash = CommitHash::parse(&raw).unwrap();
        assert_eq!(hash.as_str(), "abcdef0123".repeat(4));
        assert_eq!(hash.short(), "abcdef01");
    }

    #[test]
    fn parse_rejects_malformed() {
        let cases = vec![
            String::new(),
            "abc".to_string(),
            "zz".repeat(20),
            "a".repeat(41),
            "snapshots/".to_string(),
        ];
        for bad in &cases {
            assert!(
                matches!(CommitHash::parse(bad), Err(CoreError::InvalidCommitHash(_))),
                "expected rejection of {bad:?}"
            );
        }
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let ok: CommitHash = serde_json::from_str(&format!("\"{}\"", "c".repeat(40))).unwrap();
        assert_eq!(ok.as_str().len(), 40);
        assert!(serde_json::from_str::<CommitHash>("\"not-a-hash\"").is_err());
    }

    #[test]
    fn since_truncates_at_merge_base_inclusive() {
        let chain: AncestorChain = (1..=5).rev().map(sha).collect();
        let tail = chain.since(&sha(3)).unwrap();
        assert_eq!(tail, &[sha(3), sha(2), sha(1)]);
        assert_eq!(chain.tip(), Some(&sha(5)));
    }

    #[test]
    fn since_returns_none_for_unknown_commit() {
        let chain: AncestorChain = (1..=3).map(sha).collect();
        assert!(chain.since(&sha(9)).is_none());
    }
}
