//! Idempotent PR comment publishing
//!
//! Every comment the daemon posts starts with a hidden marker naming the
//! skill, so a later review of the same PR finds and rewrites its previous
//! comment instead of stacking a new one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::Result;

/// GitHub rejects comment bodies above 65536 characters
pub const MAX_COMMENT_LENGTH: usize = 65_000;

/// Appended to bodies cut down to [`MAX_COMMENT_LENGTH`]
pub const TRUNCATION_NOTICE: &str = "\n\n---\n*Output truncated (exceeded GitHub comment limit)*";

/// Prefix for comments describing a failed review
pub const ERROR_HEADING: &str = "**Claude Review Daemon Error**";

/// Hidden marker identifying the daemon's comment for `skill`
pub fn comment_marker(skill: &str) -> String {
    format!("<!-- claude-review-daemon:{skill} -->")
}

/// Body of an error comment
pub fn error_body(message: &str) -> String {
    format!("{ERROR_HEADING}\n\n{message}")
}

/// A comment on a PR's conversation thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueComment {
    pub id: u64,
    pub body: String,
    pub html_url: Option<String>,
}

/// Comment operations on a PR's conversation thread
#[async_trait]
pub trait CommentApi: Send + Sync {
    /// Every comment on the PR, across all pages
    async fn list_comments(&self, repo: &str, pr_number: u64) -> Result<Vec<IssueComment>>;

    async fn create_comment(&self, repo: &str, pr_number: u64, body: &str) -> Result<IssueComment>;

    async fn update_comment(&self, repo: &str, comment_id: u64, body: &str) -> Result<IssueComment>;
}

/// Cut `body` to at most [`MAX_COMMENT_LENGTH`] characters, ending in the notice
pub fn truncate_comment(body: &str) -> String {
    if body.chars().count() <= MAX_COMMENT_LENGTH {
        return body.to_string();
    }

    let keep = MAX_COMMENT_LENGTH - TRUNCATION_NOTICE.chars().count();
    let mut truncated: String = body.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_NOTICE);
    truncated
}

/// Full comment text: marker, blank line, body, footer; truncated to fit
pub fn render_comment(body: &str, skill: &str, head_sha: Option<&str>, now: DateTime<Utc>) -> String {
    let mut footer = Vec::with_capacity(2);
    if let Some(sha) = head_sha.filter(|s| !s.is_empty()) {
        let short: String = sha.chars().take(7).collect();
        footer.push(format!("Reviewed commit: `{short}`"));
    }
    footer.push(format!("at {}", now.format("%Y-%m-%d %H:%M UTC")));

    let full = format!(
        "{}\n\n{}\n\n---\n*{}*",
        comment_marker(skill),
        body,
        footer.join(" ")
    );
    truncate_comment(&full)
}

/// Create-or-update of the marked comment
pub struct CommentPublisher<C> {
    api: C,
}

impl<C: CommentApi> CommentPublisher<C> {
    pub fn new(api: C) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    /// Id of the first comment carrying the skill's marker
    ///
    /// Lookup failures are logged and reported as no match.
    pub async fn find_existing(&self, repo: &str, pr_number: u64, skill: &str) -> Option<u64> {
        let marker = comment_marker(skill);
        match self.api.list_comments(repo, pr_number).await {
            Ok(comments) => {
                let found = comments
                    .into_iter()
                    .find(|c| c.body.starts_with(&marker))
                    .map(|c| c.id);
                if let Some(id) = found {
                    info!(repo, pr = pr_number, comment_id = id, skill, "Found existing comment");
                }
                found
            }
            Err(e) => {
                warn!(repo, pr = pr_number, error = %e, "Failed to search for existing comment");
                None
            }
        }
    }

    /// Publish `body` as the skill's comment on the PR
    ///
    /// Rewrites the existing marked comment when there is one, falling back to
    /// a new comment if the update is rejected. Returns the comment URL when
    /// the API reports one; a failed create is logged and yields `None`.
    pub async fn upsert(
        &self,
        repo: &str,
        pr_number: u64,
        body: &str,
        skill: &str,
        head_sha: Option<&str>,
    ) -> Option<String> {
        let full_body = render_comment(body, skill, head_sha, Utc::now());

        if let Some(id) = self.find_existing(repo, pr_number, skill).await {
            info!(repo, pr = pr_number, comment_id = id, "Updating comment");
            match self.api.update_comment(repo, id, &full_body).await {
                Ok(comment) => {
                    info!("Comment updated successfully");
                    return comment.html_url;
                }
                Err(e) => {
                    warn!(comment_id = id, error = %e, "Failed to update comment, falling back to create");
                }
            }
        }

        info!(repo, pr = pr_number, chars = full_body.chars().count(), "Creating comment");
        match self.api.create_comment(repo, pr_number, &full_body).await {
            Ok(comment) => {
                info!("Comment created successfully");
                comment.html_url
            }
            Err(e) => {
                error!(repo, pr = pr_number, error = %e, "Failed to create comment");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::Error;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub struct Calls {
        pub existing: Vec<IssueComment>,
        pub fail_list: bool,
        pub fail_update: bool,
        pub fail_create: bool,
        pub created: Vec<(String, u64, String)>,
        pub updated: Vec<(String, u64, String)>,
    }

    /// In-memory comment thread
    #[derive(Clone, Default)]
    pub struct FakeComments {
        pub calls: Arc<Mutex<Calls>>,
    }

    impl FakeComments {
        pub fn with_existing(comments: Vec<IssueComment>) -> Self {
            let fake = Self::default();
            fake.calls.lock().unwrap().existing = comments;
            fake
        }

        pub fn created(&self) -> Vec<(String, u64, String)> {
            self.calls.lock().unwrap().created.clone()
        }

        pub fn updated(&self) -> Vec<(String, u64, String)> {
            self.calls.lock().unwrap().updated.clone()
        }
    }

    #[async_trait]
    impl CommentApi for FakeComments {
        async fn list_comments(&self, _repo: &str, _pr_number: u64) -> Result<Vec<IssueComment>> {
            let calls = self.calls.lock().unwrap();
            if calls.fail_list {
                return Err(Error::Remote("list failed".to_string()));
            }
            Ok(calls.existing.clone())
        }

        async fn create_comment(&self, repo: &str, pr_number: u64, body: &str) -> Result<IssueComment> {
            let mut calls = self.calls.lock().unwrap();
            calls.created.push((repo.to_string(), pr_number, body.to_string()));
            if calls.fail_create {
                return Err(Error::Remote("create failed".to_string()));
            }
            Ok(IssueComment {
                id: 1000 + calls.created.len() as u64,
                body: body.to_string(),
                html_url: Some(format!("https://github.com/{repo}/pull/{pr_number}#issuecomment-new")),
            })
        }

        async fn update_comment(&self, repo: &str, comment_id: u64, body: &str) -> Result<IssueComment> {
            let mut calls = self.calls.lock().unwrap();
            calls.updated.push((repo.to_string(), comment_id, body.to_string()));
            if calls.fail_update {
                return Err(Error::Remote("update failed".to_string()));
            }
            Ok(IssueComment {
                id: comment_id,
                body: body.to_string(),
                html_url: Some(format!("https://github.com/{repo}/pull/1#issuecomment-{comment_id}")),
            })
        }
    }
}
