//! Error types for the adapters.

use snapcheck_core::CollaboratorError;

/// Errors produced while talking to git, gsutil, ImageMagick or GitHub.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("`{program}` exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response from {endpoint}: {status}")]
    HttpStatus { endpoint: String, status: u16 },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected output from `{program}`: {detail}")]
    Parse { program: String, detail: String },

    #[error("gave up after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: Box<AdapterError> },
}

impl AdapterError {
    /// Whether retrying the same call could succeed.
    ///
    /// Non-zero exits of external tools, connection failures and 5xx/429
    /// responses are transient; spawn failures and malformed output are not.
    pub fn is_transient(&self) -> bool {
        match self {
            AdapterError::CommandFailed { .. } => true,
            AdapterError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AdapterError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            AdapterError::Io(_) => true,
            AdapterError::Spawn { .. }
            | AdapterError::Json(_)
            | AdapterError::Parse { .. }
            | AdapterError::RetriesExhausted { .. } => false,
        }
    }

    pub(crate) fn command_failed(program: &str, output: &std::process::Output) -> Self {
        AdapterError::CommandFailed {
            program: program.to_string(),
            status: output
                .status
                .code()
                .map(|c| format!("status {c}"))
                .unwrap_or_else(|| "signal".to_string()),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Map an adapter failure onto the collaborator error of the given role.
pub(crate) fn into_history(e: AdapterError) -> CollaboratorError {
    CollaboratorError::History(e.to_string())
}

pub(crate) fn into_store(e: AdapterError) -> CollaboratorError {
    match e {
        AdapterError::Io(io) => CollaboratorError::Io(io),
        other => CollaboratorError::Store(other.to_string()),
    }
}

pub(crate) fn into_check(e: AdapterError) -> CollaboratorError {
    CollaboratorError::Check(e.to_string())
}

pub(crate) fn into_notify(e: AdapterError) -> CollaboratorError {
    CollaboratorError::Notify(e.to_string())
}
