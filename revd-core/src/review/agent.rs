//! The external reviewer command

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error};

use crate::config::AgentConfig;
use crate::{Error, Result};

/// What a reviewer run printed, and how it exited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl AgentOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Produces review text for a prepared worktree
#[async_trait]
pub trait ReviewAgent: Send + Sync {
    /// Run the reviewer with `prompt`, injecting `skill` as extra system prompt
    async fn review(&self, prompt: &str, skill: &str, workdir: &Path) -> Result<AgentOutput>;
}

/// Claude Code in print mode
#[derive(Debug, Clone)]
pub struct ClaudeReviewer {
    pub claude_path: String,
    pub model: Option<String>,
    pub max_turns: u32,
    pub timeout: Duration,
}

impl ClaudeReviewer {
    pub fn new() -> Self {
        Self::from_config(&AgentConfig::default())
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            claude_path: config.claude_path.clone(),
            model: config.model.clone(),
            max_turns: config.max_turns,
            timeout: config.review_timeout,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.claude_path = path.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build_command(&self, prompt: &str, skill: &str, workdir: &Path) -> Command {
        let mut cmd = Command::new(&self.claude_path);
        cmd.arg("-p")
            .arg(prompt)
            .arg("--append-system-prompt")
            .arg(skill)
            .arg("--dangerously-skip-permissions")
            .arg("--max-turns")
            .arg(self.max_turns.to_string());

        if let Some(ref model) = self.model {
            cmd.arg("--model").arg(model);
        }

        cmd.current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }
}

impl Default for ClaudeReviewer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewAgent for ClaudeReviewer {
    async fn review(&self, prompt: &str, skill: &str, workdir: &Path) -> Result<AgentOutput> {
        if !workdir.exists() {
            return Err(Error::Agent(format!(
                "Working directory does not exist: {}",
                workdir.display()
            )));
        }

        let child = self.build_command(prompt, skill, workdir).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Agent(format!(
                    "Claude executable not found at '{}'. Is Claude Code installed?",
                    self.claude_path
                ))
            } else {
                Error::Io(e)
            }
        })?;

        // Dropping the future on timeout kills the child
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        let result = AgentOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if result.success() {
            debug!(bytes = result.stdout.len(), "Reviewer finished");
        } else {
            let stderr: String = result.stderr.chars().take(2000).collect();
            error!(exit_code = ?result.exit_code, stderr = %stderr, "Claude exited with failure");
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-claude");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_builder() {
        let reviewer = ClaudeReviewer::new()
            .with_path("/custom/claude")
            .with_model("opus");

        assert_eq!(reviewer.claude_path, "/custom/claude");
        assert_eq!(reviewer.model, Some("opus".to_string()));
        assert_eq!(reviewer.max_turns, 50);
        assert_eq!(reviewer.timeout, Duration::from_secs(3600));
    }

    #[test]
    fn test_command_arguments() {
        let reviewer = ClaudeReviewer::new();
        let cmd = reviewer.build_command("do it", "SKILL", Path::new("/tmp"));
        assert_eq!(
            args(&cmd),
            vec![
                "-p",
                "do it",
                "--append-system-prompt",
                "SKILL",
                "--dangerously-skip-permissions",
                "--max-turns",
                "50"
            ]
        );

        let cmd = reviewer.with_model("sonnet").build_command("p", "s", Path::new("/tmp"));
        assert!(args(&cmd).ends_with(&["--model".to_string(), "sonnet".to_string()]));
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let dir = TempDir::new().unwrap();
        let reviewer = ClaudeReviewer::new().with_path("/nonexistent/claude-binary");

        let err = reviewer.review("p", "s", dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_missing_workdir() {
        let reviewer = ClaudeReviewer::new();
        let err = reviewer
            .review("p", "s", Path::new("/nonexistent/worktree"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Agent(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let dir = TempDir::new().unwrap();
        let reviewer = ClaudeReviewer::new().with_path(script(dir.path(), "echo \"review for $2\"\necho oops >&2\nexit 3"));

        let out = reviewer.review("PR 1", "skill", dir.path()).await.unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
        assert_eq!(out.stdout, "review for PR 1\n");
        assert_eq!(out.stderr, "oops\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let dir = TempDir::new().unwrap();
        let reviewer = ClaudeReviewer::new()
            .with_path(script(dir.path(), "sleep 5"))
            .with_timeout(Duration::from_millis(100));

        let err = reviewer.review("p", "s", dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_millis(100)));
    }
}
