//! Bounded tracking of in-flight review jobs
//!
//! The coordinator owns the table of running jobs, keyed by `repo#number`.
//! Jobs are reaped cooperatively: every capacity check first polls each job
//! without blocking and retires the ones that exited. The concurrency bound is
//! global across repositories.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{info, warn};

use super::launcher::{JobExit, ReviewJob, ReviewLauncher};
use super::request::{ReviewKey, ReviewRequest};
use crate::config::RepoConfig;
use crate::pulls::PullRequest;
use crate::state::{ReviewStatus, StateStore};
use crate::Result;

/// A launched review that has not been observed to exit
struct ActiveReview {
    request: ReviewRequest,
    job: Box<dyn ReviewJob>,
    started_at: Instant,
}

/// Starts review jobs and tracks them until they exit
pub struct ReviewCoordinator<L> {
    launcher: L,
    max_concurrent: usize,
    active: HashMap<ReviewKey, ActiveReview>,
}

impl<L> std::fmt::Debug for ReviewCoordinator<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self.active.keys().map(|k| k.to_string()).collect();
        keys.sort();
        f.debug_struct("ReviewCoordinator")
            .field("max_concurrent", &self.max_concurrent)
            .field("active", &keys)
            .finish_non_exhaustive()
    }
}

impl<L: ReviewLauncher> ReviewCoordinator<L> {
    pub fn new(launcher: L, max_concurrent: usize) -> Self {
        Self {
            launcher,
            max_concurrent,
            active: HashMap::new(),
        }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn capacity(&self) -> usize {
        self.max_concurrent
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn has_active(&self) -> bool {
        !self.active.is_empty()
    }

    /// Whether a job for this PR is currently tracked
    pub fn is_reviewing(&self, repo: &str, pr_number: u64) -> bool {
        self.active.contains_key(&ReviewKey::new(repo, pr_number))
    }

    /// Poll every job once and retire the ones that exited
    ///
    /// A successful job marks its PR completed at the head SHA it reviewed. A
    /// failed job leaves the record `in_progress`, so the PR is picked up
    /// again on the next listing that reaches it. Returns the number of jobs
    /// retired.
    pub fn reap(&mut self, state: &mut StateStore) -> usize {
        let mut finished = Vec::new();

        for (key, review) in self.active.iter_mut() {
            let exit = match review.job.poll() {
                Ok(Some(exit)) => exit,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to poll review job, dropping it");
                    JobExit::Failure(None)
                }
            };
            finished.push((key.clone(), exit));
        }

        for (key, exit) in &finished {
            let Some(review) = self.active.remove(key) else {
                continue;
            };
            let elapsed = review.started_at.elapsed();

            match exit {
                JobExit::Success => {
                    info!(key = %key, elapsed = ?elapsed, "Review completed");
                    if !state.complete_review(&key.repo, key.pr_number, &review.request.head_sha) {
                        info!(key = %key, "PR no longer tracked at this head, not recording completion");
                    }
                }
                JobExit::Failure(code) => {
                    warn!(key = %key, code = ?code, elapsed = ?elapsed, "Review failed");
                }
            }
        }

        finished.len()
    }

    /// Reap finished jobs, then report whether another may start
    pub fn can_start_review(&mut self, state: &mut StateStore) -> bool {
        self.reap(state);
        self.active.len() < self.max_concurrent
    }

    /// Launch a review for `pr`
    ///
    /// The PR is recorded `in_progress` and the state persisted before the job
    /// is spawned, so a crash during launch is retried on a later cycle.
    /// Returns `Ok(false)` without side effects when at capacity or when the
    /// PR is already being reviewed.
    pub fn start_review(
        &mut self,
        state: &mut StateStore,
        repo: &RepoConfig,
        pr: &PullRequest,
    ) -> Result<bool> {
        let request = ReviewRequest::from_pull(repo, pr);
        let key = request.key();

        if self.active.len() >= self.max_concurrent || self.active.contains_key(&key) {
            return Ok(false);
        }

        info!(key = %key, head = request.short_sha(), skill = %request.skill, "Starting review");

        state.mark_reviewed(
            &request.repo,
            request.pr_number,
            request.head_sha.clone(),
            ReviewStatus::InProgress,
        );
        state.save()?;

        let job = self.launcher.launch(&request)?;
        self.active.insert(
            key,
            ActiveReview {
                request,
                job,
                started_at: Instant::now(),
            },
        );

        Ok(true)
    }
}
