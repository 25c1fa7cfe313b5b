//! revd core - pull request review daemon
//!
//! Watches GitHub pull requests, launches an out-of-process review whenever a
//! PR's head commit moves, and publishes the result as a PR comment.

pub mod comment;
pub mod config;
pub mod daemon;
pub mod error;
pub mod git;
pub mod notify;
pub mod pulls;
pub mod review;
pub mod secrets;
pub mod state;

pub use comment::{CommentApi, CommentPublisher, IssueComment};
pub use config::{Config, RepoConfig};
pub use daemon::{needs_review, Backoff, Daemon, Shutdown};
pub use error::{Error, Result};
pub use git::{GitWorkspace, Workspace};
pub use notify::SlackNotifier;
pub use pulls::{FetchOutcome, GitRef, PullRequest, PullSource};
pub use review::{ReviewCoordinator, ReviewOutcome, ReviewRequest, ReviewRunner};
pub use secrets::Secrets;
pub use state::{ReviewStatus, StateStore};
