//! Open pull request listing
//!
//! The daemon only needs a thin slice of GitHub's pull request payload, and a
//! small vocabulary of fetch outcomes. Transport details live behind
//! [`PullSource`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A branch tip as reported in a PR payload (`head` / `base`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

/// The fields of a GitHub pull request the daemon acts on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    pub head: GitRef,
    pub base: GitRef,
}

impl PullRequest {
    /// Commit at the tip of the PR's source branch
    pub fn head_sha(&self) -> &str {
        &self.head.sha
    }

    /// Source branch name
    pub fn branch(&self) -> &str {
        &self.head.ref_name
    }

    /// Target branch name
    pub fn base_branch(&self) -> &str {
        &self.base.ref_name
    }
}

/// Normalized result of one conditional fetch of a repository's open PRs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A fresh listing (any 2xx)
    Modified {
        status: u16,
        pulls: Vec<PullRequest>,
        etag: Option<String>,
    },
    /// 304: the cached ETag still matches
    NotModified { etag: Option<String> },
    /// 403 with the rate limit exhausted
    RateLimited,
    /// 404: repository missing or not accessible
    NotFound,
    /// Any other HTTP status, or a 2xx whose body could not be read
    Failed { status: u16 },
    /// Connection error or timeout; distinct from every real HTTP status
    Transient,
}

impl FetchOutcome {
    /// HTTP status code of the outcome, with 0 standing for a transport failure
    pub fn status(&self) -> u16 {
        match self {
            FetchOutcome::Modified { status, .. } => *status,
            FetchOutcome::NotModified { .. } => 304,
            FetchOutcome::RateLimited => 403,
            FetchOutcome::NotFound => 404,
            FetchOutcome::Failed { status } => *status,
            FetchOutcome::Transient => 0,
        }
    }
}

/// Source of open pull request listings
#[async_trait]
pub trait PullSource: Send {
    /// Fetch open PRs for `repo` (`owner/name`), sending `etag` as a
    /// conditional-request validator when present
    async fn open_pulls(&mut self, repo: &str, etag: Option<&str>) -> FetchOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_github_payload() {
        let json = r#"[{
            "number": 42,
            "title": "Add widgets",
            "html_url": "https://github.com/o/r/pull/42",
            "state": "open",
            "head": {"ref": "feature/widgets", "sha": "abc123", "label": "o:feature/widgets"},
            "base": {"ref": "main", "sha": "def456"},
            "user": {"login": "someone"}
        }]"#;

        let pulls: Vec<PullRequest> = serde_json::from_str(json).unwrap();
        assert_eq!(pulls.len(), 1);
        let pr = &pulls[0];
        assert_eq!(pr.number, 42);
        assert_eq!(pr.head_sha(), "abc123");
        assert_eq!(pr.branch(), "feature/widgets");
        assert_eq!(pr.base_branch(), "main");
        assert_eq!(pr.title.as_deref(), Some("Add widgets"));
    }

    #[test]
    fn test_outcome_status_codes() {
        assert_eq!(FetchOutcome::Transient.status(), 0);
        assert_eq!(FetchOutcome::NotModified { etag: None }.status(), 304);
        assert_eq!(FetchOutcome::RateLimited.status(), 403);
        assert_eq!(FetchOutcome::NotFound.status(), 404);
        assert_eq!(FetchOutcome::Failed { status: 502 }.status(), 502);
        let modified = FetchOutcome::Modified {
            status: 200,
            pulls: vec![],
            etag: None,
        };
        assert_eq!(modified.status(), 200);
    }
}
