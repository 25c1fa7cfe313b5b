//! Review job requests
//!
//! A [`ReviewRequest`] carries everything an out-of-process review job needs
//! to check out a pull request and review it. The daemon builds one from a PR
//! payload and hands it to a launcher, which turns it into command line
//! arguments for the `review` subcommand.

use serde::{Deserialize, Serialize};

use crate::config::RepoConfig;
use crate::pulls::PullRequest;

/// Identity of a review job: one repository and PR number
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReviewKey {
    pub repo: String,
    pub pr_number: u64,
}

impl ReviewKey {
    pub fn new(repo: impl Into<String>, pr_number: u64) -> Self {
        Self {
            repo: repo.into(),
            pr_number,
        }
    }
}

impl std::fmt::Display for ReviewKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.repo, self.pr_number)
    }
}

/// Parameters of one review job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// Repository in `owner/repo` form
    pub repo: String,
    pub pr_number: u64,
    /// PR source branch
    pub branch: String,
    /// PR target branch
    pub base_branch: String,
    /// Head commit observed when the review was scheduled
    pub head_sha: String,
    /// Skill injected into the reviewer
    pub skill: String,
    /// PR title, used in notifications
    pub title: Option<String>,
}

impl ReviewRequest {
    /// Build a request from a PR payload and its repository settings
    pub fn from_pull(repo: &RepoConfig, pr: &PullRequest) -> Self {
        Self {
            repo: repo.name.clone(),
            pr_number: pr.number,
            branch: pr.branch().to_string(),
            base_branch: pr.base_branch().to_string(),
            head_sha: pr.head_sha().to_string(),
            skill: repo.skill.clone(),
            title: pr.title.clone(),
        }
    }

    pub fn key(&self) -> ReviewKey {
        ReviewKey::new(self.repo.clone(), self.pr_number)
    }

    /// Abbreviated head SHA for log lines
    pub fn short_sha(&self) -> &str {
        let end = self
            .head_sha
            .char_indices()
            .nth(8)
            .map_or(self.head_sha.len(), |(i, _)| i);
        &self.head_sha[..end]
    }

    /// Arguments for the `review` subcommand
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "review".to_string(),
            "--repo".to_string(),
            self.repo.clone(),
            "--pr-number".to_string(),
            self.pr_number.to_string(),
            "--branch".to_string(),
            self.branch.clone(),
            "--base-branch".to_string(),
            self.base_branch.clone(),
            "--skill".to_string(),
            self.skill.clone(),
            "--head-sha".to_string(),
            self.head_sha.clone(),
        ];

        if let Some(ref title) = self.title {
            args.push("--title".to_string());
            args.push(title.clone());
        }

        args
    }
}
