//! Error taxonomy for the snapcheck core.

/// Errors returned by injected collaborators (history, store, checker, notifier).
///
/// Adapters convert their own error types into this one so the core stays
/// independent of any particular VCS, storage backend or transport.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("commit history unavailable: {0}")]
    History(String),

    #[error("snapshot store error: {0}")]
    Store(String),

    #[error("similarity check failed: {0}")]
    Check(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for collaborator calls.
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

/// Snapcheck core errors.
///
/// A missing baseline is not an error; resolution returns `Ok(None)` for it.
/// Per-item comparison failures are recovered inside the diff engine and
/// never surface here.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("cannot resolve history for {base_branch}..{current_branch}: {source}")]
    Resolution {
        base_branch: String,
        current_branch: String,
        #[source]
        source: CollaboratorError,
    },

    #[error(
        "merge-base {merge_base} of {base_branch} and {current_branch} is not in the history of {base_branch}"
    )]
    MergeBaseNotInHistory {
        base_branch: String,
        current_branch: String,
        merge_base: String,
    },

    #[error("malformed snapshot set `{set}`: {reason}")]
    MalformedSnapshotSet { set: String, reason: String },

    #[error("invalid commit hash: {0:?}")]
    InvalidCommitHash(String),

    #[error("invalid fuzz tolerance: {0:?}")]
    InvalidFuzz(String),

    #[error("snapshot store unavailable: {0}")]
    Store(#[source] CollaboratorError),

    #[error("report delivery failed: {0}")]
    Notify(#[source] CollaboratorError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Whether this error aborts resolution (as opposed to store or delivery I/O).
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            CoreError::Resolution { .. } | CoreError::MergeBaseNotInHistory { .. }
        )
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_error_names_both_branches() {
        let err = CoreError::Resolution {
            base_branch: "master".to_string(),
            current_branch: "feature/login".to_string(),
            source: CollaboratorError::History("shallow clone".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("master..feature/login"));
        assert!(msg.contains("shallow clone"));
        assert!(err.is_resolution_failure());
    }

    #[test]
    fn merge_base_error_carries_hash() {
        let err = CoreError::MergeBaseNotInHistory {
            base_branch: "master".to_string(),
            current_branch: "topic".to_string(),
            merge_base: "abc123".to_string(),
        };
        assert!(err.to_string().contains("abc123"));
        assert!(err.is_resolution_failure());
    }

    #[test]
    fn store_error_is_not_resolution_failure() {
        let err = CoreError::Store(CollaboratorError::Store("bucket missing".to_string()));
        assert!(!err.is_resolution_failure());
        assert!(err.to_string().contains("bucket missing"));
    }
}
