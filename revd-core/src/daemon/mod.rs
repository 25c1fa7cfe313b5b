//! The polling daemon
//!
//! One task runs everything: each cycle polls the configured repositories in
//! order, starts reviews for PRs whose head moved, persists state, then sleeps.
//! A failing cycle is retried after an exponential backoff instead of
//! stopping the loop. On shutdown the loop stops starting cycles and waits for
//! every in-flight review to exit before saving state one last time.

mod backoff;
mod shutdown;

pub use backoff::Backoff;
pub use shutdown::Shutdown;

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::{Config, RepoConfig};
use crate::pulls::{FetchOutcome, PullSource};
use crate::review::{ReviewCoordinator, ReviewLauncher};
use crate::state::{PrRecord, ReviewStatus, StateStore};
use crate::Result;

/// Pause between reap attempts while draining on shutdown
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Whether a PR at `head_sha` needs a (new) review
///
/// True when nothing was recorded, the head moved, or the last review never
/// reported completion. The last case covers a daemon restart while a review
/// was running: the review is started again rather than assumed to have
/// succeeded, so delivery is at-least-once.
pub fn needs_review(record: Option<&PrRecord>, head_sha: &str) -> bool {
    match record {
        None => true,
        Some(record) => {
            record.head_sha != head_sha || record.review_status == ReviewStatus::InProgress
        }
    }
}

/// Poll loop state: one owner for the state store, PR source and coordinator
pub struct Daemon<S, L> {
    repos: Vec<RepoConfig>,
    interval: Duration,
    drain_interval: Duration,
    state: StateStore,
    source: S,
    coordinator: ReviewCoordinator<L>,
    backoff: Backoff,
    shutdown: Shutdown,
}

impl<S: PullSource, L: ReviewLauncher> Daemon<S, L> {
    pub fn new(
        config: &Config,
        state: StateStore,
        source: S,
        launcher: L,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            repos: config.repos.clone(),
            interval: config.polling.interval(),
            drain_interval: DRAIN_POLL_INTERVAL,
            state,
            source,
            coordinator: ReviewCoordinator::new(launcher, config.polling.max_concurrent_reviews),
            backoff: Backoff::default(),
            shutdown,
        }
    }

    /// Override the pause between reap attempts during shutdown
    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn coordinator(&self) -> &ReviewCoordinator<L> {
        &self.coordinator
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Poll one repository and start the reviews it needs
    ///
    /// A fetch that does not yield a fresh listing leaves the state untouched.
    pub async fn poll_repo(&mut self, repo: &RepoConfig) -> Result<()> {
        if !repo.enabled {
            return Ok(());
        }

        let etag = self.state.etag(&repo.name).map(str::to_string);
        let outcome = self.source.open_pulls(&repo.name, etag.as_deref()).await;

        let (pulls, new_etag) = match outcome {
            FetchOutcome::Modified { pulls, etag, .. } => (pulls, etag),
            FetchOutcome::NotModified { .. } => {
                debug!(repo = %repo.name, "No changes (ETag match)");
                return Ok(());
            }
            FetchOutcome::NotFound => {
                error!(repo = %repo.name, "Repository not found");
                return Ok(());
            }
            other => {
                warn!(repo = %repo.name, status = other.status(), "Failed to fetch PRs");
                return Ok(());
            }
        };

        let mut launch_error = None;
        let mut open_pr_numbers = HashSet::with_capacity(pulls.len());

        for pr in &pulls {
            open_pr_numbers.insert(pr.number);

            if !repo.admits_branch(pr.base_branch()) {
                debug!(repo = %repo.name, pr = pr.number, base = pr.base_branch(), "Base branch not watched");
                continue;
            }

            if self.coordinator.is_reviewing(&repo.name, pr.number) {
                continue;
            }

            if !needs_review(self.state.pr_record(&repo.name, pr.number), pr.head_sha()) {
                continue;
            }

            if !self.coordinator.can_start_review(&mut self.state) {
                debug!(repo = %repo.name, pr = pr.number, "At review capacity, deferring");
                continue;
            }

            if let Err(e) = self.coordinator.start_review(&mut self.state, repo, pr) {
                error!(repo = %repo.name, pr = pr.number, error = %e, "Failed to start review");
                launch_error.get_or_insert(e);
            }
        }

        self.state.cleanup_closed_prs(&repo.name, &open_pr_numbers);

        // The ETag is only kept once every PR in the listing was handled, so a
        // failed launch sees the same listing again instead of a 304.
        if let Some(e) = launch_error {
            return Err(e);
        }
        if let Some(etag) = new_etag {
            self.state.set_etag(&repo.name, etag);
        }
        Ok(())
    }

    /// One pass over every repository, then persist state
    ///
    /// A repository that fails does not stop the others from being polled;
    /// the first failure is returned after state is saved.
    pub async fn sweep(&mut self) -> Result<()> {
        self.coordinator.reap(&mut self.state);

        let mut failure = None;
        let repos = self.repos.clone();
        for repo in &repos {
            if self.shutdown.is_triggered() {
                break;
            }
            if let Err(e) = self.poll_repo(repo).await {
                warn!(repo = %repo.name, error = %e, "Poll failed");
                failure.get_or_insert(e);
            }
        }

        self.state.save()?;
        failure.map_or(Ok(()), Err)
    }

    /// Run until shutdown, then drain in-flight reviews and save state
    pub async fn run(&mut self) -> Result<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            max_concurrent = self.coordinator.capacity(),
            repos = self.repos.len(),
            "Review daemon starting"
        );
        for repo in self.repos.iter().filter(|r| r.enabled) {
            let branches = if repo.branches.is_empty() {
                "all".to_string()
            } else {
                repo.branches.join(", ")
            };
            info!(repo = %repo.name, skill = %repo.skill, branches = %branches, "Watching repository");
        }

        while !self.shutdown.is_triggered() {
            match self.sweep().await {
                Ok(()) => self.backoff.reset(),
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    error!(error = %e, "Error during poll cycle");
                    info!(delay_secs = delay.as_secs(), "Backing off");
                    self.shutdown.sleep(delay).await;
                    continue;
                }
            }

            self.shutdown.sleep(self.interval).await;
        }

        self.drain().await;
        self.state.save()?;
        info!("Daemon stopped");
        Ok(())
    }

    /// Block until every tracked review has exited
    async fn drain(&mut self) {
        if !self.coordinator.has_active() {
            return;
        }

        info!(active = self.coordinator.active_count(), "Waiting for active reviews to complete...");
        loop {
            self.coordinator.reap(&mut self.state);
            if !self.coordinator.has_active() {
                break;
            }
            tokio::time::sleep(self.drain_interval).await;
        }
    }
}
