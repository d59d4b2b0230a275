//! The seam between the search adapter and a concrete hosting API.

use std::time::Duration;

use async_trait::async_trait;

use repoharvest_shared::RepositoryRecord;

/// One page request against the host's repository search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Full `q=` value, qualifiers included.
    pub query: String,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub records: Vec<RepositoryRecord>,
    /// Items the host sent, including any that were dropped while decoding.
    pub received: usize,
    /// Total matches the host reports for the query.
    pub total_count: usize,
    /// Host flagged the result set as possibly incomplete.
    pub incomplete: bool,
}

/// Host-level failure, classified so the adapter can wait, retry, or give up.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Rate limit hit; the host asked us to wait this long.
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Momentary failure (connection reset, 5xx, timeout).
    #[error("transient host failure: {0}")]
    Transient(String),

    /// Credentials missing or rejected.
    #[error("authentication rejected: {0}")]
    Unauthorized(String),

    /// The host refused the request for a reason retrying will not fix.
    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A repository search backend.
#[async_trait]
pub trait SearchHost: Send + Sync {
    /// Fetch a single page of results.
    async fn fetch_page(&self, request: &PageRequest) -> Result<SearchPage, HostError>;

    /// Largest page size the host accepts.
    fn max_page_size(&self) -> u32 {
        100
    }

    /// Maximum results the host will ever serve for one query, if bounded.
    fn result_window(&self) -> Option<usize> {
        None
    }

    /// Human-readable host name for tracing.
    fn name(&self) -> &str;
}
