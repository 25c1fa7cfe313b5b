//! Persistent review state
//!
//! Tracks, per repository, the last ETag seen for the open-PR listing and, per
//! pull request, the head commit that was last sent for review. The whole
//! structure is written as JSON after every poll cycle, via a temp file that
//! is renamed over the real path so readers never observe a partial write.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Result;

/// Current on-disk format version
pub const STATE_VERSION: u32 = 1;

/// Review status of a tracked pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// A review was launched and has not been confirmed finished
    InProgress,
    /// The review for `head_sha` finished successfully
    Completed,
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewStatus::InProgress => write!(f, "in_progress"),
            ReviewStatus::Completed => write!(f, "completed"),
        }
    }
}

/// What we know about one pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrRecord {
    pub head_sha: String,
    pub reviewed_at: DateTime<Utc>,
    pub review_status: ReviewStatus,
}

/// Per-repository state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default)]
    pub prs: BTreeMap<u64, PrRecord>,
}

/// The document stored in the state file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    #[serde(default)]
    pub repos: BTreeMap<String, RepoState>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            repos: BTreeMap::new(),
        }
    }
}

/// Durable record of review progress, bound to a file path
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    data: PersistedState,
}

impl StateStore {
    /// Load state from `path`
    ///
    /// A missing, unreadable, malformed or newer-versioned file yields an empty
    /// state; this never fails.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match Self::read(&path) {
            Ok(Some(data)) => {
                info!(path = %path.display(), repos = data.repos.len(), "Loaded state");
                data
            }
            Ok(None) => {
                info!(path = %path.display(), "No state file, starting fresh");
                PersistedState::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load state file, starting fresh");
                PersistedState::default()
            }
        };

        Self { path, data }
    }

    fn read(path: &Path) -> Result<Option<PersistedState>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)?;
        let data: PersistedState = serde_json::from_str(&contents)?;
        if data.version > STATE_VERSION {
            return Err(crate::Error::Other(format!(
                "state version {} is newer than supported version {}",
                data.version, STATE_VERSION
            )));
        }

        Ok(Some(PersistedState {
            version: STATE_VERSION,
            ..data
        }))
    }

    /// Write the full state atomically (temp file + rename)
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(&self.data)?;

        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), "Saved state");
        Ok(())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only view of the whole state
    pub fn data(&self) -> &PersistedState {
        &self.data
    }

    fn repo_mut(&mut self, repo: &str) -> &mut RepoState {
        self.data.repos.entry(repo.to_string()).or_default()
    }

    fn record(&self, repo: &str, pr_number: u64) -> Option<&PrRecord> {
        self.data.repos.get(repo)?.prs.get(&pr_number)
    }

    /// Cached ETag for the repository's open-PR listing
    pub fn etag(&self, repo: &str) -> Option<&str> {
        self.data.repos.get(repo)?.etag.as_deref()
    }

    pub fn set_etag(&mut self, repo: &str, etag: impl Into<String>) {
        self.repo_mut(repo).etag = Some(etag.into());
    }

    /// Head SHA recorded at the last review start or completion
    pub fn reviewed_sha(&self, repo: &str, pr_number: u64) -> Option<&str> {
        self.record(repo, pr_number).map(|r| r.head_sha.as_str())
    }

    pub fn review_status(&self, repo: &str, pr_number: u64) -> Option<ReviewStatus> {
        self.record(repo, pr_number).map(|r| r.review_status)
    }

    pub fn pr_record(&self, repo: &str, pr_number: u64) -> Option<&PrRecord> {
        self.record(repo, pr_number)
    }

    /// Upsert the PR record, stamped with the current time
    pub fn mark_reviewed(
        &mut self,
        repo: &str,
        pr_number: u64,
        head_sha: impl Into<String>,
        status: ReviewStatus,
    ) {
        self.repo_mut(repo).prs.insert(
            pr_number,
            PrRecord {
                head_sha: head_sha.into(),
                reviewed_at: Utc::now(),
                review_status: status,
            },
        );
    }

    /// Mark a finished review as completed, if the PR is still tracked at `head_sha`
    ///
    /// Returns false when the record was pruned in the meantime (PR closed) or
    /// now holds a different head.
    pub fn complete_review(&mut self, repo: &str, pr_number: u64, head_sha: &str) -> bool {
        match self.record(repo, pr_number) {
            Some(record) if record.head_sha == head_sha => {}
            _ => return false,
        }
        self.mark_reviewed(repo, pr_number, head_sha, ReviewStatus::Completed);
        true
    }

    /// Drop every record for `repo` whose PR number is not in `open_pr_numbers`
    pub fn cleanup_closed_prs(&mut self, repo: &str, open_pr_numbers: &HashSet<u64>) {
        let Some(repo_state) = self.data.repos.get_mut(repo) else {
            return;
        };

        repo_state.prs.retain(|number, _| {
            let open = open_pr_numbers.contains(number);
            if !open {
                info!(repo = %repo, pr = number, "Cleaned up closed PR from state");
            }
            open
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> StateStore {
        StateStore::load(dir.path().join("state.json"))
    }

    #[test]
    fn test_fresh_state_when_missing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.data(), &PersistedState::default());
        assert_eq!(store.data().version, STATE_VERSION);
    }

    #[test]
    fn test_corrupt_json_resets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = StateStore::load(&path);
        assert!(store.data().repos.is_empty());
    }

    #[test]
    fn test_newer_version_resets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"version": 99, "repos": {"o/r": {"prs": {}}}}"#).unwrap();

        let store = StateStore::load(&path);
        assert!(store.data().repos.is_empty());
    }

    #[test]
    fn test_load_existing_file_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{
  "version": 1,
  "repos": {
    "o/r": {
      "etag": "W/\"abc\"",
      "prs": {
        "12": {
          "head_sha": "deadbeef",
          "reviewed_at": "2026-01-02T03:04:05Z",
          "review_status": "in_progress"
        }
      }
    }
  }
}"#,
        )
        .unwrap();

        let store = StateStore::load(&path);
        assert_eq!(store.etag("o/r"), Some("W/\"abc\""));
        assert_eq!(store.reviewed_sha("o/r", 12), Some("deadbeef"));
        assert_eq!(store.review_status("o/r", 12), Some(ReviewStatus::InProgress));
    }

    #[test]
    fn test_save_reload_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.set_etag("o/r", "etag-1");
        store.mark_reviewed("o/r", 1, "aaa", ReviewStatus::Completed);
        store.mark_reviewed("o/r", 2, "bbb", ReviewStatus::InProgress);
        store.mark_reviewed("x/y", 7, "ccc", ReviewStatus::Completed);
        store.save().unwrap();

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.data(), store.data());
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::load(dir.path().join("nested").join("state.json"));
        store.set_etag("o/r", "e");
        store.save().unwrap();

        assert!(dir.path().join("nested").join("state.json").exists());
        assert!(!dir.path().join("nested").join("state.tmp").exists());
    }

    #[test]
    fn test_get_set_etag() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert_eq!(store.etag("o/r"), None);
        store.set_etag("o/r", "abc");
        assert_eq!(store.etag("o/r"), Some("abc"));
    }

    #[test]
    fn test_mark_reviewed_overwrites() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert_eq!(store.reviewed_sha("o/r", 5), None);
        assert_eq!(store.review_status("o/r", 5), None);

        store.mark_reviewed("o/r", 5, "old", ReviewStatus::InProgress);
        store.mark_reviewed("o/r", 5, "new", ReviewStatus::Completed);
        assert_eq!(store.reviewed_sha("o/r", 5), Some("new"));
        assert_eq!(store.review_status("o/r", 5), Some(ReviewStatus::Completed));
    }

    #[test]
    fn test_complete_review_only_for_tracked_prs() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert!(!store.complete_review("o/r", 3, "sha"));
        assert_eq!(store.review_status("o/r", 3), None);

        store.mark_reviewed("o/r", 3, "sha", ReviewStatus::InProgress);
        assert!(store.complete_review("o/r", 3, "sha"));
        assert_eq!(store.review_status("o/r", 3), Some(ReviewStatus::Completed));
    }

    #[test]
    fn test_complete_review_ignores_moved_head() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.mark_reviewed("o/r", 3, "newer", ReviewStatus::InProgress);

        assert!(!store.complete_review("o/r", 3, "older"));
        assert_eq!(store.reviewed_sha("o/r", 3), Some("newer"));
        assert_eq!(store.review_status("o/r", 3), Some(ReviewStatus::InProgress));
    }

    #[test]
    fn test_cleanup_closed_prs() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        for n in [1, 2, 3, 4] {
            store.mark_reviewed("o/r", n, format!("sha{}", n), ReviewStatus::Completed);
        }
        store.mark_reviewed("other/repo", 1, "keep", ReviewStatus::Completed);
        let before = store.pr_record("o/r", 2).cloned();

        store.cleanup_closed_prs("o/r", &HashSet::from([2, 4, 99]));

        let remaining: Vec<u64> = store.data().repos["o/r"].prs.keys().copied().collect();
        assert_eq!(remaining, vec![2, 4]);
        assert_eq!(store.pr_record("o/r", 2).cloned(), before);
        assert_eq!(store.reviewed_sha("other/repo", 1), Some("keep"));
    }

    #[test]
    fn test_cleanup_unknown_repo_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.cleanup_closed_prs("nobody/here", &HashSet::new());
        assert!(store.data().repos.is_empty());
    }
}
