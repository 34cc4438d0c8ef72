//! Report delivery to a file or stdout, for runs without a pull request.

use std::path::PathBuf;

use async_trait::async_trait;
use snapcheck_core::{CollaboratorResult, Notifier};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Writes the rendered report to `path`, or to stdout when no path is set.
#[derive(Debug, Clone, Default)]
pub struct FileNotifier {
    path: Option<PathBuf>,
}

impl FileNotifier {
    pub fn to_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn stdout() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Notifier for FileNotifier {
    async fn publish(&self, body: &str) -> CollaboratorResult<()> {
        match &self.path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(path, body).await?;
                info!(event = "report.written", path = %path.display());
            }
            None => {
                let mut out = tokio::io::stdout();
                out.write_all(body.as_bytes()).await?;
                out.flush().await?;
            }
        }
        Ok(())
    }
}
