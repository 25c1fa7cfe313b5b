//! Conditional polling of open pull requests over the REST API

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, ETAG, IF_NONE_MATCH, USER_AGENT};
use reqwest::StatusCode;
use revd_core::{FetchOutcome, PullRequest, PullSource};
use tracing::{error, warn};

use crate::{Error, Result};

pub const GITHUB_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest pause taken for an exhausted rate limit; GitHub windows are an hour
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(3600);

/// Last rate-limit state reported by the API
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    pub remaining: u64,
    /// Unix time (seconds) at which the window resets
    pub reset: f64,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            remaining: 5000,
            reset: 0.0,
        }
    }
}

impl RateLimit {
    /// How long to wait before the next request, if the budget is spent
    pub fn delay(&self, now: f64) -> Option<Duration> {
        if self.remaining == 0 && now < self.reset {
            let wait = Duration::try_from_secs_f64(self.reset - now).unwrap_or(MAX_RATE_LIMIT_WAIT);
            Some(wait.min(MAX_RATE_LIMIT_WAIT))
        } else {
            None
        }
    }

    /// Take `X-RateLimit-*` values from `headers`; absent or unparsable
    /// headers keep the previous values
    pub fn update(&mut self, headers: &HeaderMap) {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        if let Some(remaining) = header("x-ratelimit-remaining").and_then(|v| v.parse().ok()) {
            self.remaining = remaining;
        }
        if let Some(reset) = header("x-ratelimit-reset").and_then(|v| v.parse::<f64>().ok()) {
            if reset.is_finite() {
                self.reset = reset;
            } else {
                warn!(value = reset, "Ignoring non-finite X-RateLimit-Reset");
            }
        }
    }
}

/// Polls `GET /repos/{repo}/pulls` with ETag revalidation
pub struct GitHubPoller {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    rate_limit: RateLimit,
}

impl std::fmt::Debug for GitHubPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubPoller")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl GitHubPoller {
    pub fn new(token: Option<String>) -> Result<Self> {
        if token.is_none() {
            warn!("No GitHub token found (GH_TOKEN or GITHUB_TOKEN). API rate limits will be very restrictive.");
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: GITHUB_API_URL.to_string(),
            token,
            rate_limit: RateLimit::default(),
        })
    }

    /// Send requests to `base_url` instead of api.github.com
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn rate_limit(&self) -> RateLimit {
        self.rate_limit
    }

    async fn wait_for_rate_limit(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        if let Some(wait) = self.rate_limit.delay(now) {
            warn!(wait_secs = wait.as_secs(), "Rate limited, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Fetch the first page of open PRs
    pub async fn fetch_open_pulls(&mut self, repo: &str, etag: Option<&str>) -> FetchOutcome {
        self.wait_for_rate_limit().await;

        let url = format!("{}/repos/{}/pulls", self.base_url, repo);
        let mut request = self
            .client
            .get(&url)
            .query(&[("state", "open"), ("per_page", "100")])
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(USER_AGENT, concat!("revd/", env!("CARGO_PKG_VERSION")));

        if let Some(ref token) = self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(repo, error = %e, "Network error");
                return FetchOutcome::Transient;
            }
        };

        self.rate_limit.update(response.headers());
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            return FetchOutcome::NotModified {
                etag: etag.map(str::to_string),
            };
        }
        if status == StatusCode::FORBIDDEN && self.rate_limit.remaining == 0 {
            error!(repo, "Rate limit exceeded");
            return FetchOutcome::RateLimited;
        }
        if status == StatusCode::NOT_FOUND {
            warn!(repo, "Resource not found");
            return FetchOutcome::NotFound;
        }
        if !status.is_success() {
            error!(repo, status = status.as_u16(), reason = status.canonical_reason().unwrap_or(""), "HTTP error");
            return FetchOutcome::Failed {
                status: status.as_u16(),
            };
        }

        let new_etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match response.json::<Vec<PullRequest>>().await {
            Ok(pulls) => FetchOutcome::Modified {
                status: status.as_u16(),
                pulls,
                etag: new_etag,
            },
            Err(e) => {
                error!(repo, error = %e, "Unreadable pull request listing");
                FetchOutcome::Failed {
                    status: status.as_u16(),
                }
            }
        }
    }
}

#[async_trait]
impl PullSource for GitHubPoller {
    async fn open_pulls(&mut self, repo: &str, etag: Option<&str>) -> FetchOutcome {
        self.fetch_open_pulls(repo, etag).await
    }
}
