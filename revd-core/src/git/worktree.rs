//! Checkout and worktree management for reviews

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::command::run_git;
use super::repo::head_commit;
use super::Workspace;
use crate::review::ReviewRequest;
use crate::{Error, Result};

const GITHUB_CLONE_BASE: &str = "https://github.com";

/// Directory name of a repository's checkout: `owner/repo` becomes `owner_repo`
pub fn checkout_dir_name(repo: &str) -> String {
    repo.replace('/', "_")
}

/// Worktrees under a per-repository checkout, driven through the git CLI
#[derive(Debug, Clone)]
pub struct GitWorkspace {
    repo_dir: PathBuf,
    git_timeout: Duration,
    clone_base: String,
}

impl GitWorkspace {
    pub fn new(repo_dir: impl Into<PathBuf>, git_timeout: Duration) -> Self {
        let repo_dir = repo_dir.into();
        let repo_dir = std::path::absolute(&repo_dir).unwrap_or(repo_dir);
        Self {
            repo_dir,
            git_timeout,
            clone_base: GITHUB_CLONE_BASE.to_string(),
        }
    }

    /// Clone from `<base>/<owner>/<repo>.git` instead of GitHub
    pub fn with_clone_base(mut self, base: impl Into<String>) -> Self {
        self.clone_base = base.into();
        self
    }

    pub fn checkout_path(&self, repo: &str) -> PathBuf {
        self.repo_dir.join(checkout_dir_name(repo))
    }

    pub fn worktree_path(&self, repo: &str, pr_number: u64) -> PathBuf {
        self.checkout_path(repo)
            .join("worktrees")
            .join(format!("pr-{pr_number}"))
    }

    fn clone_url(&self, repo: &str) -> String {
        format!("{}/{}.git", self.clone_base.trim_end_matches('/'), repo)
    }

    async fn ensure_checkout(&self, repo: &str) -> Result<PathBuf> {
        let checkout = self.checkout_path(repo);
        if checkout.exists() {
            return Ok(checkout);
        }

        std::fs::create_dir_all(&self.repo_dir)?;
        let url = self.clone_url(repo);
        info!(repo, url = %url, path = %checkout.display(), "Cloning repository");

        let target = checkout.to_string_lossy();
        run_git(&["clone", &url, &target], &self.repo_dir, self.git_timeout).await?;
        Ok(checkout)
    }

    /// Remove a worktree, falling back to deleting the directory
    async fn remove_worktree(&self, checkout: &Path, worktree: &Path) -> Result<()> {
        let target = worktree.to_string_lossy();
        let removed = run_git(
            &["worktree", "remove", "--force", &target],
            checkout,
            self.git_timeout,
        )
        .await;

        if let Err(e) = removed {
            // Not registered with git, or already half gone
            if worktree.exists() {
                warn!(path = %worktree.display(), error = %e, "git worktree remove failed, deleting directory");
                std::fs::remove_dir_all(worktree).map_err(|e| {
                    Error::Git(format!("Failed to remove worktree directory: {}", e))
                })?;
            }
            let _ = run_git(&["worktree", "prune"], checkout, self.git_timeout).await;
        }

        Ok(())
    }
}

#[async_trait]
impl Workspace for GitWorkspace {
    fn worktree_for(&self, request: &ReviewRequest) -> PathBuf {
        self.worktree_path(&request.repo, request.pr_number)
    }

    async fn prepare(&self, request: &ReviewRequest) -> Result<PathBuf> {
        let checkout = self.ensure_checkout(&request.repo).await?;

        run_git(&["fetch", "--all", "--prune"], &checkout, self.git_timeout).await?;

        let worktree = self.worktree_for(request);
        if worktree.exists() {
            warn!(path = %worktree.display(), "Stale worktree found, removing");
            self.remove_worktree(&checkout, &worktree).await?;
        }

        if let Some(parent) = worktree.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let target = worktree.to_string_lossy();
        let start = format!("origin/{}", request.branch);
        run_git(
            &["worktree", "add", "--detach", &target, &start],
            &checkout,
            self.git_timeout,
        )
        .await?;

        match head_commit(&worktree) {
            Ok(sha) if !request.head_sha.is_empty() && sha != request.head_sha => {
                warn!(
                    expected = %request.head_sha,
                    actual = %sha,
                    "Worktree head differs from the PR head seen by the poller"
                );
            }
            Ok(sha) => info!(path = %worktree.display(), commit = %sha, "Worktree ready"),
            Err(e) => warn!(error = %e, "Could not resolve worktree head"),
        }

        Ok(worktree)
    }

    async fn cleanup(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        info!(path = %path.display(), "Cleaning up worktree");
        // <checkout>/worktrees/pr-N
        let checkout = path
            .parent()
            .and_then(Path::parent)
            .ok_or_else(|| Error::Git(format!("Not a review worktree: {}", path.display())))?;
        self.remove_worktree(checkout, path).await
    }
}
