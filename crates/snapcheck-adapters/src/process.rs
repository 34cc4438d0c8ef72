//! Running external tools (git, gsutil, compare).

use std::path::Path;
use std::process::{Output, Stdio};

use tokio::process::Command;
use tracing::debug;

use crate::error::{AdapterError, AdapterResult};

/// Run `program args..` (optionally in `dir`) and capture its output.
///
/// A non-zero exit is not an error here; callers decide what it means.
pub async fn run(program: &str, args: &[&str], dir: Option<&Path>) -> AdapterResult<Output> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    debug!(program = %program, args = ?args, "spawning");
    cmd.output().await.map_err(|source| AdapterError::Spawn {
        program: program.to_string(),
        source,
    })
}

/// Run a command that must exit successfully and return its trimmed stdout.
pub async fn run_checked(program: &str, args: &[&str], dir: Option<&Path>) -> AdapterResult<String> {
    let output = run(program, args, dir).await?;
    if !output.status.success() {
        return Err(AdapterError::command_failed(program, &output));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
