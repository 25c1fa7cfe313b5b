//! One review job, start to finish
//!
//! Runs inside the detached `review` process: prepares a worktree, runs the
//! reviewer with the repository's skill, and publishes whatever came out. Every
//! failure ends up as a PR comment, and the worktree is removed on every path.

use std::time::Duration;

use tracing::{error, info, warn};

use super::agent::{AgentOutput, ReviewAgent};
use super::request::ReviewRequest;
use super::skill::{load_skill, missing_skill_message};
use crate::comment::{error_body, CommentApi, CommentPublisher};
use crate::git::Workspace;
use crate::notify::SlackNotifier;
use crate::{Error, Result};

const NO_OUTPUT: &str = "Claude exited with no output";
const EMPTY_REVIEW: &str = "Review completed but produced no output.";

/// How a review job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Reviewer succeeded and its output was handed to the publisher
    Published { comment_url: Option<String> },
    /// Reviewer exited nonzero; its output was still published
    ReviewerFailed { exit_code: Option<i32> },
    /// No skill file in the worktree
    SkillMissing,
    TimedOut(Duration),
    /// Anything else, by error class
    Failed { kind: &'static str },
}

impl ReviewOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ReviewOutcome::Published { .. })
    }

    /// Process exit code for the `review` subcommand
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Instruction handed to the reviewer alongside the skill
pub fn review_prompt(request: &ReviewRequest) -> String {
    format!(
        "Execute the following skill for PR #{} (branch `{}` targeting `{}`).\n\nThe repository is `{}`. You are in the PR's worktree.",
        request.pr_number, request.branch, request.base_branch, request.repo
    )
}

/// Comment text for a finished reviewer run
pub fn review_body(output: &AgentOutput) -> String {
    let text = if output.success() || !output.stdout.is_empty() {
        output.stdout.as_str()
    } else if !output.stderr.is_empty() {
        output.stderr.as_str()
    } else {
        NO_OUTPUT
    };

    if text.trim().is_empty() {
        EMPTY_REVIEW.to_string()
    } else {
        text.to_string()
    }
}

/// Drives a single review through workspace, reviewer and publisher
pub struct ReviewRunner<W, A, C> {
    workspace: W,
    agent: A,
    publisher: CommentPublisher<C>,
    notifier: Option<SlackNotifier>,
}

impl<W: Workspace, A: ReviewAgent, C: CommentApi> ReviewRunner<W, A, C> {
    pub fn new(workspace: W, agent: A, comments: C) -> Self {
        Self {
            workspace,
            agent,
            publisher: CommentPublisher::new(comments),
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Option<SlackNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub async fn run(&self, request: &ReviewRequest) -> ReviewOutcome {
        info!(
            repo = %request.repo,
            pr = request.pr_number,
            branch = %request.branch,
            base = %request.base_branch,
            skill = %request.skill,
            "Starting review"
        );

        let worktree = self.workspace.worktree_for(request);
        let outcome = match self.execute(request).await {
            Ok(outcome) => outcome,
            Err(Error::Timeout(limit)) => {
                error!(repo = %request.repo, pr = request.pr_number, "Review timed out");
                let message = format!("Review timed out after {}.", humantime::format_duration(limit));
                self.publish_error(request, &message).await;
                ReviewOutcome::TimedOut(limit)
            }
            Err(e) => {
                error!(repo = %request.repo, pr = request.pr_number, error = %e, "Review failed");
                self.publish_error(request, &format!("Review failed: {}", e.kind())).await;
                ReviewOutcome::Failed { kind: e.kind() }
            }
        };

        if worktree.exists() {
            if let Err(e) = self.workspace.cleanup(&worktree).await {
                warn!(path = %worktree.display(), error = %e, "Failed to remove worktree");
            }
        }

        info!(repo = %request.repo, pr = request.pr_number, outcome = ?outcome, "Review finished");
        outcome
    }

    async fn execute(&self, request: &ReviewRequest) -> Result<ReviewOutcome> {
        let path = self.workspace.prepare(request).await?;

        let Some((skill_path, skill)) = load_skill(&path, &request.skill)? else {
            let message = missing_skill_message(&request.skill);
            error!(skill = %request.skill, "Skill file not found");
            self.publish_error(request, &message).await;
            return Ok(ReviewOutcome::SkillMissing);
        };
        info!(path = %skill_path.display(), bytes = skill.len(), "Loaded skill file");

        let output = self
            .agent
            .review(&review_prompt(request), &skill, &path)
            .await?;
        let body = review_body(&output);

        let comment_url = self.publish(request, &body).await;
        if let Some(ref notifier) = self.notifier {
            notifier
                .review_posted(
                    &request.repo,
                    request.pr_number,
                    request.title.as_deref(),
                    &body,
                    comment_url.as_deref(),
                )
                .await;
        }

        if output.success() {
            Ok(ReviewOutcome::Published { comment_url })
        } else {
            Ok(ReviewOutcome::ReviewerFailed {
                exit_code: output.exit_code,
            })
        }
    }

    async fn publish(&self, request: &ReviewRequest, body: &str) -> Option<String> {
        self.publisher
            .upsert(
                &request.repo,
                request.pr_number,
                body,
                &request.skill,
                Some(request.head_sha.as_str()),
            )
            .await
    }

    async fn publish_error(&self, request: &ReviewRequest, message: &str) {
        self.publish(request, &error_body(message)).await;
    }
}
