//! Review command - run one review job
//!
//! This is what the daemon launches for every PR that needs a review. It can
//! also be run by hand to review a PR once.

use clap::Args;
use revd_core::config::{parse_repo_name, DEFAULT_SKILL};
use revd_core::review::ClaudeReviewer;
use revd_core::{Config, GitWorkspace, ReviewRequest, ReviewRunner, SlackNotifier};
use revd_github::GitHubComments;

use super::github_token;

/// Arguments for the review command
#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Repository (owner/repo or GitHub URL)
    #[arg(long)]
    pub repo: String,

    /// Pull request number
    #[arg(long)]
    pub pr_number: u64,

    /// PR source branch
    #[arg(long)]
    pub branch: String,

    /// PR target branch
    #[arg(long)]
    pub base_branch: String,

    /// Skill to run
    #[arg(long, default_value = DEFAULT_SKILL)]
    pub skill: String,

    /// Head commit the review is for
    #[arg(long)]
    pub head_sha: Option<String>,

    /// PR title, for notifications
    #[arg(long)]
    pub title: Option<String>,
}

impl ReviewArgs {
    pub fn to_request(&self) -> anyhow::Result<ReviewRequest> {
        Ok(ReviewRequest {
            repo: parse_repo_name(&self.repo)?,
            pr_number: self.pr_number,
            branch: self.branch.clone(),
            base_branch: self.base_branch.clone(),
            head_sha: self.head_sha.clone().unwrap_or_default(),
            skill: self.skill.clone(),
            title: self.title.clone(),
        })
    }

    /// Run the review; returns the process exit code
    pub async fn execute(&self, config: &Config) -> anyhow::Result<i32> {
        let request = self.to_request()?;

        let workspace = GitWorkspace::new(&config.paths.repo_dir, config.agent.git_timeout);
        let agent = ClaudeReviewer::from_config(&config.agent);
        let comments = GitHubComments::new(github_token())?;
        let notifier = match config.notify.slack_webhook_url {
            Some(ref url) => Some(SlackNotifier::new(url.clone())?),
            None => None,
        };

        let runner = ReviewRunner::new(workspace, agent, comments).with_notifier(notifier);
        let outcome = runner.run(&request).await;
        Ok(outcome.exit_code())
    }
}
