//! Review-sheet GitHub infrastructure adapter.
//!
//! Implements [`review::IssueSource`] over the GitHub REST API. Pagination,
//! authentication headers and rate-limit detection are handled here; the
//! [`review`] crate only ever sees [`review::Issue`] pages.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. Pull requests
//! are reported as issues with `is_pull_request` set; dropping them is the
//! row builder's decision.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::debug;

use review::{Issue, IssueNumber, IssueSource, RepositoryId, ServiceError, Timestamp};

/// Public GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Largest page size the issues endpoint accepts.
pub const MAX_PER_PAGE: u32 = 100;

const USER_AGENT: &str = "review-sheet";
const API_VERSION: &str = "2022-11-28";

/// Connection settings for [`GitHubIssues`].
#[derive(Debug, Clone)]
pub struct GitHubSettings {
    pub api_url: String,
    /// Personal access token. Anonymous requests work for public
    /// repositories but have a much lower rate limit.
    pub token: Option<String>,
    pub per_page: u32,
    pub timeout: Duration,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            per_page: MAX_PER_PAGE,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Open-issue listing of GitHub repositories.
pub struct GitHubIssues {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
    per_page: u32,
}

impl GitHubIssues {
    pub fn new(settings: GitHubSettings) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            token: settings.token,
            per_page: settings.per_page.clamp(1, MAX_PER_PAGE),
        })
    }

    fn issues_url(&self, repository: &RepositoryId, page: u32) -> String {
        // GitHub pages are 1-based.
        format!(
            "{}/repos/{}/issues?state=open&per_page={}&page={}",
            self.api_url,
            repository,
            self.per_page,
            page + 1
        )
    }
}

#[async_trait]
impl IssueSource for GitHubIssues {
    async fn issues_page(
        &self,
        repository: &RepositoryId,
        page: u32,
    ) -> Result<Vec<Issue>, ServiceError> {
        let url = self.issues_url(repository, page);

        let mut request = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if let Some(retry_after) = rate_limit_back_off(status.as_u16(), response.headers(), unix_now()) {
            return Err(ServiceError::RateLimited {
                retry_after: Some(retry_after),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let issues = parse_issues(&body)?;
        debug!(%repository, page, count = issues.len(), "GitHub issues page");
        Ok(issues)
    }
}

#[derive(Deserialize)]
struct GhIssue {
    number: u64,
    title: String,
    created_at: DateTime<Utc>,
    html_url: String,
    #[serde(default)]
    labels: Vec<GhLabel>,
    /// Present (with links to the PR) only for pull requests.
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GhLabel {
    name: String,
}

impl From<GhIssue> for Issue {
    fn from(issue: GhIssue) -> Self {
        Issue {
            number: IssueNumber::new(issue.number),
            title: issue.title,
            created_at: Timestamp::from_utc(issue.created_at),
            html_url: issue.html_url,
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            is_pull_request: issue.pull_request.is_some(),
        }
    }
}

/// Decodes one page of the issues endpoint.
fn parse_issues(body: &[u8]) -> Result<Vec<Issue>, ServiceError> {
    let issues: Vec<GhIssue> =
        serde_json::from_slice(body).map_err(|e| ServiceError::Decode(e.to_string()))?;
    Ok(issues.into_iter().map(Issue::from).collect())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// How long to wait when the response says we are rate limited, `None` if
/// it does not.
///
/// GitHub signals primary limits with 403/429 and `x-ratelimit-remaining: 0`
/// (reset time in `x-ratelimit-reset`), secondary limits with `retry-after`.
fn rate_limit_back_off(status: u16, headers: &HeaderMap, now: u64) -> Option<Duration> {
    if status != 403 && status != 429 {
        return None;
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
    };

    if let Some(seconds) = header("retry-after") {
        return Some(Duration::from_secs(seconds));
    }

    if header("x-ratelimit-remaining") == Some(0) {
        let wait = header("x-ratelimit-reset")
            .map(|reset| reset.saturating_sub(now))
            .unwrap_or(60);
        return Some(Duration::from_secs(wait.clamp(10, 60 * 60)));
    }

    (status == 429).then(|| Duration::from_secs(60))
}
