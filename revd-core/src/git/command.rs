//! Running the git CLI

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::{Error, Result};

/// Run `git <args>` in `cwd`, returning stdout
///
/// The child is killed if it outlives `timeout`.
pub async fn run_git(args: &[&str], cwd: &Path, timeout: Duration) -> Result<String> {
    debug!(cwd = %cwd.display(), "Running: git {}", args.join(" "));

    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, output)
        .await
        .map_err(|_| Error::Timeout(timeout))?
        .map_err(|e| Error::Git(format!("Failed to run git {}: {}", args.join(" "), e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_git_returns_stdout() {
        let dir = TempDir::new().unwrap();
        run_git(&["init", "-q"], dir.path(), Duration::from_secs(30))
            .await
            .unwrap();

        let out = run_git(&["rev-parse", "--is-inside-work-tree"], dir.path(), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(out.trim(), "true");
    }

    #[tokio::test]
    async fn test_run_git_failure_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let err = run_git(&["rev-parse", "HEAD"], dir.path(), Duration::from_secs(30))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Git(_)));
        assert!(err.to_string().contains("git rev-parse HEAD failed"));
    }
}
