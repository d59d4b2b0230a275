//! GitHub repository search over the REST API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{instrument, warn};

use repoharvest_shared::{GitHubConfig, HarvestError, Relevance, RepositoryRecord, Result};

use crate::host::{HostError, PageRequest, SearchHost, SearchPage};

/// User-Agent string for API requests (GitHub rejects requests without one).
const USER_AGENT: &str = concat!("repoharvest/", env!("CARGO_PKG_VERSION"));

/// Pinned REST API version.
const API_VERSION: &str = "2022-11-28";

/// The search API never serves more than this many results per query.
const RESULT_WINDOW: usize = 1000;

/// Largest `per_page` the search API accepts.
const MAX_PER_PAGE: u32 = 100;

/// Wait used when a 429 carries no usable header.
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    total_count: usize,
    #[serde(default)]
    incomplete_results: bool,
    #[serde(default)]
    items: Vec<RepoItem>,
}

#[derive(Debug, Deserialize)]
struct RepoItem {
    full_name: String,
    description: Option<String>,
    language: Option<String>,
    stargazers_count: u32,
    #[serde(default)]
    forks_count: u32,
    #[serde(default)]
    watchers_count: u32,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    html_url: String,
    clone_url: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    pushed_at: Option<DateTime<Utc>>,
}

impl RepoItem {
    fn into_record(self) -> Result<RepositoryRecord> {
        Ok(RepositoryRecord {
            id: self.full_name.parse()?,
            description: self.description.filter(|d| !d.trim().is_empty()),
            language: self.language,
            stars: self.stargazers_count,
            forks: self.forks_count,
            watchers: self.watchers_count,
            topics: self.topics,
            html_url: self.html_url,
            clone_url: self.clone_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
            pushed_at: self.pushed_at,
            relevance: Relevance::ZERO,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// GitHubHost
// ---------------------------------------------------------------------------

/// [`SearchHost`] backed by `GET /search/repositories`.
pub struct GitHubHost {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubHost {
    /// Build a host from the `[github]` config section and a resolved token.
    pub fn new(config: &GitHubConfig, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl SearchHost for GitHubHost {
    #[instrument(skip_all, fields(page = request.page))]
    async fn fetch_page(&self, request: &PageRequest) -> std::result::Result<SearchPage, HostError> {
        let url = format!("{}/search/repositories", self.base_url);
        let per_page = request.per_page.to_string();
        let page = request.page.to_string();

        let mut builder = self
            .client
            .get(&url)
            .query(&[
                ("q", request.query.as_str()),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
                ("page", page.as_str()),
            ])
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);

        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HostError::Transient(format!("{url}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let body: SearchResponse = response
                .json()
                .await
                .map_err(|e| HostError::Malformed(format!("search response: {e}")))?;
            return Ok(into_page(body));
        }

        if let Some(retry_after) = rate_limit_wait(status, response.headers(), Utc::now()) {
            return Err(HostError::RateLimited { retry_after });
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| status.to_string());

        Err(classify(status, message))
    }

    fn max_page_size(&self) -> u32 {
        MAX_PER_PAGE
    }

    fn result_window(&self) -> Option<usize> {
        Some(RESULT_WINDOW)
    }

    fn name(&self) -> &str {
        "github"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Convert a decoded response, skipping items with unusable identifiers.
fn into_page(body: SearchResponse) -> SearchPage {
    let received = body.items.len();
    let records = body
        .items
        .into_iter()
        .filter_map(|item| {
            let name = item.full_name.clone();
            match item.into_record() {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(full_name = %name, error = %e, "skipping search item");
                    None
                }
            }
        })
        .collect();

    SearchPage {
        records,
        received,
        total_count: body.total_count,
        incomplete: body.incomplete_results,
    }
}

/// Map a non-rate-limit failure status to a [`HostError`].
fn classify(status: StatusCode, message: String) -> HostError {
    match status {
        StatusCode::UNAUTHORIZED => HostError::Unauthorized(message),
        StatusCode::REQUEST_TIMEOUT => HostError::Transient(format!("HTTP {status}: {message}")),
        s if s.is_server_error() => HostError::Transient(format!("HTTP {s}: {message}")),
        s => HostError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

/// How long the host asks us to wait, if `status` is a rate-limit signal.
///
/// Prefers `retry-after`; otherwise uses `x-ratelimit-reset` when
/// `x-ratelimit-remaining` is zero, measured against the response `date`
/// header if present. A bare 429 falls back to a fixed wait; a bare 403 is a
/// plain permission error.
fn rate_limit_wait(status: StatusCode, headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::FORBIDDEN {
        return None;
    }

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(secs) = header(RETRY_AFTER.as_str()).and_then(|v| v.trim().parse::<u64>().ok()) {
        return Some(Duration::from_secs(secs));
    }

    if header("x-ratelimit-remaining").map(str::trim) == Some("0") {
        if let Some(reset) = header("x-ratelimit-reset").and_then(|v| v.trim().parse::<i64>().ok())
        {
            let reference = header("date")
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or(now);
            let secs = (reset - reference.timestamp()).max(0) as u64;
            // One extra second so we land after the reset, not on it.
            return Some(Duration::from_secs(secs + 1));
        }
    }

    (status == StatusCode::TOO_MANY_REQUESTS).then_some(DEFAULT_RATE_LIMIT_WAIT)
}
