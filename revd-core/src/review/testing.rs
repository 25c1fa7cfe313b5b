//! Test doubles for review jobs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::launcher::{JobExit, ReviewJob, ReviewLauncher};
use super::request::ReviewRequest;
use crate::pulls::{GitRef, PullRequest};
use crate::state::{ReviewStatus, StateStore};
use crate::{Error, Result};

/// Build a PR payload targeting `main`
pub fn pull(number: u64, head_sha: &str) -> PullRequest {
    pull_to(number, head_sha, "main")
}

/// Build a PR payload targeting `base`
pub fn pull_to(number: u64, head_sha: &str, base: &str) -> PullRequest {
    PullRequest {
        number,
        title: Some(format!("PR {}", number)),
        html_url: None,
        head: GitRef {
            ref_name: format!("feature-{}", number),
            sha: head_sha.to_string(),
        },
        base: GitRef {
            ref_name: base.to_string(),
            sha: "base-sha".to_string(),
        },
    }
}

#[derive(Default)]
struct Inner {
    launched: Vec<ReviewRequest>,
    exits: HashMap<u64, JobExit>,
    status_at_launch: Vec<Option<ReviewStatus>>,
    fail_launches: bool,
}

/// Launcher whose jobs run until told to finish
#[derive(Clone, Default)]
pub struct FakeLauncher {
    inner: Arc<Mutex<Inner>>,
    observe: Option<PathBuf>,
}

impl FakeLauncher {
    /// Record the PR's persisted status in `state_path` at every launch
    pub fn observing(state_path: &Path) -> Self {
        Self {
            inner: Arc::default(),
            observe: Some(state_path.to_path_buf()),
        }
    }

    pub fn launched(&self) -> Vec<ReviewRequest> {
        self.inner.lock().unwrap().launched.clone()
    }

    /// Make every job for PR `number` report `exit` on its next poll
    pub fn finish(&self, number: u64, exit: JobExit) {
        self.inner.lock().unwrap().exits.insert(number, exit);
    }

    pub fn fail_launches(&self) {
        self.inner.lock().unwrap().fail_launches = true;
    }

    pub fn allow_launches(&self) {
        self.inner.lock().unwrap().fail_launches = false;
    }

    pub fn status_on_disk_at_launch(&self) -> Vec<Option<ReviewStatus>> {
        self.inner.lock().unwrap().status_at_launch.clone()
    }
}

impl ReviewLauncher for FakeLauncher {
    fn launch(&self, request: &ReviewRequest) -> Result<Box<dyn ReviewJob>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_launches {
            return Err(Error::Agent("launch refused".to_string()));
        }

        if let Some(ref path) = self.observe {
            let on_disk = StateStore::load(path);
            inner
                .status_at_launch
                .push(on_disk.review_status(&request.repo, request.pr_number));
        }

        inner.exits.remove(&request.pr_number);
        inner.launched.push(request.clone());
        Ok(Box::new(FakeJob {
            inner: Arc::clone(&self.inner),
            number: request.pr_number,
        }))
    }
}

struct FakeJob {
    inner: Arc<Mutex<Inner>>,
    number: u64,
}

impl ReviewJob for FakeJob {
    fn poll(&mut self) -> std::io::Result<Option<JobExit>> {
        Ok(self.inner.lock().unwrap().exits.get(&self.number).copied())
    }
}
