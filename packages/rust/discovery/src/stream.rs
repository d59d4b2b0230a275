//! Capped, paged search stream over a [`SearchHost`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use repoharvest_shared::{HarvestError, RepositoryRecord, Result, SearchCriteria, Truncation};

use crate::host::{HostError, PageRequest, SearchHost, SearchPage};
use crate::query::ComposedQuery;
use crate::retry::{Clock, RetryPolicy, TokioClock};

/// Bounds applied to a single search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    /// Hard cap on records yielded.
    pub max_results: usize,
    /// Wall-clock budget for paging.
    pub max_duration: Option<Duration>,
}

impl From<&SearchCriteria> for SearchLimits {
    fn from(criteria: &SearchCriteria) -> Self {
        Self {
            max_results: criteria.max_results,
            max_duration: criteria.max_duration,
        }
    }
}

/// Everything a drained stream produced.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub records: Vec<RepositoryRecord>,
    /// Why paging stopped early, if it did.
    pub truncation: Option<Truncation>,
    pub pages_fetched: u32,
    pub rate_limit_waits: u32,
}

// ---------------------------------------------------------------------------
// SearchClient
// ---------------------------------------------------------------------------

/// Search adapter: a host, a retry policy, and a clock to wait on.
pub struct SearchClient<H, C = TokioClock> {
    host: H,
    clock: C,
    policy: RetryPolicy,
    per_page: u32,
}

impl<H: SearchHost> SearchClient<H, TokioClock> {
    /// Create a client that waits on the real clock.
    pub fn new(host: H, policy: RetryPolicy) -> Self {
        Self::with_clock(host, TokioClock, policy)
    }
}

impl<H: SearchHost, C: Clock> SearchClient<H, C> {
    /// Create a client with an explicit clock (tests use a manual one).
    pub fn with_clock(host: H, clock: C, policy: RetryPolicy) -> Self {
        let per_page = host.max_page_size();
        Self {
            host,
            clock,
            policy,
            per_page,
        }
    }

    /// Override the page size, clamped to what the host accepts.
    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, self.host.max_page_size());
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Start a new search. Each call re-queries the host from page 1.
    pub fn search(&self, query: &ComposedQuery, limits: SearchLimits) -> SearchStream<'_, H, C> {
        SearchStream {
            client: self,
            query: query.host_query(),
            limits,
            started: self.clock.now(),
            next_page: 1,
            buffer: VecDeque::new(),
            yielded: 0,
            received: 0,
            exhausted: false,
            pages_fetched: 0,
            rate_limit_waits: 0,
            truncation: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SearchStream
// ---------------------------------------------------------------------------

/// Finite, non-restartable sequence of search results.
///
/// Never yields more than `limits.max_results` records. Pages are fetched
/// lazily, one at a time, as the buffer drains.
pub struct SearchStream<'a, H, C> {
    client: &'a SearchClient<H, C>,
    query: String,
    limits: SearchLimits,
    started: Instant,
    next_page: u32,
    buffer: VecDeque<RepositoryRecord>,
    yielded: usize,
    received: usize,
    exhausted: bool,
    pages_fetched: u32,
    rate_limit_waits: u32,
    truncation: Option<Truncation>,
}

impl<H: SearchHost, C: Clock> SearchStream<'_, H, C> {
    /// Next record, `Ok(None)` once the cap is reached or the host runs dry.
    pub async fn next(&mut self) -> Result<Option<RepositoryRecord>> {
        loop {
            if self.yielded >= self.limits.max_results {
                return Ok(None);
            }
            if let Some(record) = self.buffer.pop_front() {
                self.yielded += 1;
                return Ok(Some(record));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fill().await?;
        }
    }

    /// Drain the stream into a [`SearchOutcome`].
    ///
    /// A fatal error discards everything collected so far; the caller never
    /// sees a silently shortened result set.
    pub async fn collect(mut self) -> Result<SearchOutcome> {
        let mut records = Vec::new();
        loop {
            match self.next().await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => break,
                Err(e) => {
                    error!(
                        collected = records.len(),
                        pages = self.pages_fetched,
                        error = %e,
                        "search aborted, discarding partial results"
                    );
                    return Err(e);
                }
            }
        }

        info!(
            records = records.len(),
            pages = self.pages_fetched,
            rate_limit_waits = self.rate_limit_waits,
            truncated = self.truncation.is_some(),
            "search complete"
        );

        Ok(SearchOutcome {
            records,
            truncation: self.truncation,
            pages_fetched: self.pages_fetched,
            rate_limit_waits: self.rate_limit_waits,
        })
    }

    pub fn yielded(&self) -> usize {
        self.yielded
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn truncation(&self) -> Option<&Truncation> {
        self.truncation.as_ref()
    }

    /// Fetch the next page into the buffer, or mark the stream exhausted.
    async fn fill(&mut self) -> Result<()> {
        if let Some(budget) = self.limits.max_duration {
            let elapsed = self.elapsed();
            if elapsed >= budget {
                self.truncate(Truncation::TimeBudget {
                    elapsed_secs: elapsed.as_secs(),
                });
                return Ok(());
            }
        }

        if let Some(window) = self.client.host.result_window() {
            if self.received >= window {
                self.truncate(Truncation::ResultWindow { limit: window });
                return Ok(());
            }
        }

        let request = PageRequest {
            query: self.query.clone(),
            page: self.next_page,
            per_page: self.client.per_page,
        };

        let Some(page) = self.fetch_with_retry(&request).await? else {
            return Ok(());
        };
        self.next_page += 1;
        self.pages_fetched += 1;

        // Decoding may drop items; paging follows what the host sent.
        let count = page.received;
        self.received += count;

        debug!(
            page = request.page,
            records = page.records.len(),
            received = count,
            total_count = page.total_count,
            "fetched search page"
        );

        if page.incomplete && self.truncation.is_none() {
            warn!(page = request.page, "host reported incomplete results");
            self.truncation = Some(Truncation::HostIncomplete);
        }

        if count < request.per_page as usize || self.received >= page.total_count {
            self.exhausted = true;
        }

        self.buffer.extend(page.records);
        Ok(())
    }

    fn elapsed(&self) -> Duration {
        self.client.clock.now().saturating_duration_since(self.started)
    }

    /// Whether sleeping `wait` still fits the time budget. Records a
    /// `TimeBudget` truncation when it does not.
    fn wait_fits_budget(&mut self, wait: Duration) -> bool {
        let Some(budget) = self.limits.max_duration else {
            return true;
        };
        let elapsed = self.elapsed();
        if elapsed.saturating_add(wait) < budget {
            return true;
        }
        self.truncate(Truncation::TimeBudget {
            elapsed_secs: elapsed.as_secs(),
        });
        false
    }

    fn truncate(&mut self, reason: Truncation) {
        warn!(
            yielded = self.yielded,
            cap = self.limits.max_results,
            reason = %reason,
            "search truncated before reaching the result cap"
        );
        self.truncation = Some(reason);
        self.exhausted = true;
    }

    /// `Ok(None)` when a required wait would overrun the time budget.
    async fn fetch_with_retry(&mut self, request: &PageRequest) -> Result<Option<SearchPage>> {
        let client = self.client;
        let mut failures: u32 = 0;

        loop {
            match client.host.fetch_page(request).await {
                Ok(page) => return Ok(Some(page)),
                Err(HostError::RateLimited { retry_after }) => {
                    if self.rate_limit_waits >= client.policy.max_rate_limit_waits {
                        return Err(HarvestError::RateLimitExhausted {
                            waits: self.rate_limit_waits,
                        });
                    }
                    self.rate_limit_waits += 1;
                    let wait = client.policy.rate_limit_wait(retry_after);
                    if !self.wait_fits_budget(wait) {
                        return Ok(None);
                    }
                    warn!(
                        host = client.host.name(),
                        page = request.page,
                        wait_secs = wait.as_secs(),
                        waits = self.rate_limit_waits,
                        "rate limited, pausing search"
                    );
                    client.clock.sleep(wait).await;
                }
                Err(HostError::Transient(message)) => {
                    failures += 1;
                    if failures >= client.policy.max_attempts {
                        return Err(HarvestError::Network(format!(
                            "page {} failed after {failures} attempts: {message}",
                            request.page
                        )));
                    }
                    let backoff = client.policy.backoff_for(failures);
                    if !self.wait_fits_budget(backoff) {
                        return Ok(None);
                    }
                    warn!(
                        page = request.page,
                        attempt = failures,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %message,
                        "transient search failure, retrying"
                    );
                    client.clock.sleep(backoff).await;
                }
                Err(HostError::Unauthorized(message)) => {
                    return Err(HarvestError::Host {
                        status: 401,
                        message,
                    });
                }
                Err(HostError::Rejected { status, message }) => {
                    return Err(HarvestError::Host { status, message });
                }
                Err(HostError::Malformed(message)) => {
                    return Err(HarvestError::parse(message));
                }
            }
        }
    }
}
