//! Git checkouts and per-review worktrees
//!
//! Each watched repository has one long-lived checkout under `repo_dir`.
//! Every review gets a detached worktree of the PR branch inside that
//! checkout, removed again when the review ends.

mod command;
mod repo;
mod worktree;

pub use command::run_git;
pub use repo::head_commit;
pub use worktree::{checkout_dir_name, GitWorkspace};

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::review::ReviewRequest;
use crate::Result;

/// Where a review runs
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Directory [`Workspace::prepare`] builds for `request`
    ///
    /// Known up front so a preparation that dies halfway can still be cleaned.
    fn worktree_for(&self, request: &ReviewRequest) -> PathBuf;

    /// Produce a fresh working directory holding the PR's branch
    async fn prepare(&self, request: &ReviewRequest) -> Result<PathBuf>;

    /// Dispose of a directory left by [`Workspace::prepare`], complete or not
    async fn cleanup(&self, path: &Path) -> Result<()>;
}
