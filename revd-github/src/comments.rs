//! PR conversation comments through octocrab

use async_trait::async_trait;
use octocrab::Octocrab;
use revd_core::comment::{CommentApi, IssueComment};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::{Error, Result};

const PAGE_SIZE: u8 = 100;

/// The fields of an issue comment the publisher needs
#[derive(Debug, Deserialize)]
struct RawComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
}

impl From<RawComment> for IssueComment {
    fn from(raw: RawComment) -> Self {
        IssueComment {
            id: raw.id,
            body: raw.body.unwrap_or_default(),
            html_url: raw.html_url,
        }
    }
}

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
    page: u32,
}

/// Issue comment endpoints, authenticated with a personal token
pub struct GitHubComments {
    client: Octocrab,
}

impl std::fmt::Debug for GitHubComments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubComments").finish_non_exhaustive()
    }
}

impl GitHubComments {
    /// Client for api.github.com; unauthenticated when `token` is `None`
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::build(token, None)
    }

    /// Client for an alternate API root
    pub fn with_base_uri(token: Option<String>, base_uri: &str) -> Result<Self> {
        Self::build(token, Some(base_uri))
    }

    fn build(token: Option<String>, base_uri: Option<&str>) -> Result<Self> {
        let mut builder = Octocrab::builder();
        if let Some(token) = token {
            builder = builder.personal_token(token);
        }
        if let Some(uri) = base_uri {
            builder = builder
                .base_uri(uri)
                .map_err(|e| Error::Auth(format!("Invalid GitHub API URL {}: {}", uri, e)))?;
        }

        let client = builder
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        info!("Created GitHub client");
        Ok(Self { client })
    }

    pub fn client(&self) -> &Octocrab {
        &self.client
    }

    async fn list_all(&self, repo: &str, pr_number: u64) -> Result<Vec<IssueComment>> {
        let route = format!("/repos/{}/issues/{}/comments", checked_repo(repo)?, pr_number);
        let mut comments = Vec::new();
        let mut page = 1;

        loop {
            let params = PageParams {
                per_page: PAGE_SIZE,
                page,
            };
            let batch: Vec<RawComment> = self.client.get(&route, Some(&params)).await?;
            let done = batch.len() < usize::from(PAGE_SIZE);
            comments.extend(batch.into_iter().map(IssueComment::from));
            if done {
                break;
            }
            page += 1;
        }

        debug!(repo, pr = pr_number, count = comments.len(), "Listed comments");
        Ok(comments)
    }

    async fn create(&self, repo: &str, pr_number: u64, body: &str) -> Result<IssueComment> {
        let route = format!("/repos/{}/issues/{}/comments", checked_repo(repo)?, pr_number);
        let created: RawComment = self.client.post(route, Some(&json!({ "body": body }))).await?;
        Ok(created.into())
    }

    async fn update(&self, repo: &str, comment_id: u64, body: &str) -> Result<IssueComment> {
        let route = format!("/repos/{}/issues/comments/{}", checked_repo(repo)?, comment_id);
        let updated: RawComment = self.client.patch(route, Some(&json!({ "body": body }))).await?;
        Ok(updated.into())
    }
}

/// `repo` must be `owner/name` to form a route
fn checked_repo(repo: &str) -> Result<&str> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok(repo),
        _ => Err(Error::InvalidRepo(repo.to_string())),
    }
}

#[async_trait]
impl CommentApi for GitHubComments {
    async fn list_comments(&self, repo: &str, pr_number: u64) -> revd_core::Result<Vec<IssueComment>> {
        Ok(self.list_all(repo, pr_number).await?)
    }

    async fn create_comment(&self, repo: &str, pr_number: u64, body: &str) -> revd_core::Result<IssueComment> {
        Ok(self.create(repo, pr_number, body).await?)
    }

    async fn update_comment(&self, repo: &str, comment_id: u64, body: &str) -> revd_core::Result<IssueComment> {
        Ok(self.update(repo, comment_id, body).await?)
    }
}
