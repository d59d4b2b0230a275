//! Test doubles for the search adapter.
//!
//! [`ScriptedHost`] replays queued page responses and records every request;
//! [`ManualClock`] records sleeps and advances virtual time instead of waiting.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use repoharvest_shared::{Relevance, RepositoryRecord};

use crate::host::{HostError, PageRequest, SearchHost, SearchPage};
use crate::retry::Clock;

/// Build a minimal record for tests: Rust, no description, no topics.
///
/// # Panics
///
/// Panics if `id` is not a valid `owner/name` identifier.
pub fn repo(id: &str, stars: u32) -> RepositoryRecord {
    RepositoryRecord {
        id: id.parse().expect("valid repo id"),
        description: None,
        language: Some("Rust".into()),
        stars,
        forks: 0,
        watchers: 0,
        topics: Vec::new(),
        html_url: format!("https://github.com/{id}"),
        clone_url: format!("https://github.com/{id}.git"),
        created_at: None,
        updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        pushed_at: None,
        relevance: Relevance::ZERO,
    }
}

// ---------------------------------------------------------------------------
// ScriptedHost
// ---------------------------------------------------------------------------

/// A [`SearchHost`] that serves queued responses in order.
///
/// Once the queue is empty every request gets an empty final page.
#[derive(Default)]
pub struct ScriptedHost {
    responses: Mutex<VecDeque<Result<SearchPage, HostError>>>,
    requests: Mutex<Vec<PageRequest>>,
    window: Option<usize>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the total results this host will serve per query.
    pub fn with_result_window(mut self, window: usize) -> Self {
        self.window = Some(window);
        self
    }

    /// Queue a successful page.
    pub fn push_page(&self, records: Vec<RepositoryRecord>, total_count: usize) {
        self.push(Ok(SearchPage {
            received: records.len(),
            records,
            total_count,
            incomplete: false,
        }));
    }

    /// Queue a successful page flagged as incomplete.
    pub fn push_incomplete_page(&self, records: Vec<RepositoryRecord>, total_count: usize) {
        self.push(Ok(SearchPage {
            received: records.len(),
            records,
            total_count,
            incomplete: true,
        }));
    }

    /// Queue a page whose host-side item count differs from the records
    /// that survived decoding.
    pub fn push_page_with_received(
        &self,
        records: Vec<RepositoryRecord>,
        received: usize,
        total_count: usize,
    ) {
        self.push(Ok(SearchPage {
            records,
            received,
            total_count,
            incomplete: false,
        }));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: HostError) {
        self.push(Err(error));
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    fn push(&self, response: Result<SearchPage, HostError>) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(response);
    }
}

#[async_trait]
impl SearchHost for ScriptedHost {
    async fn fetch_page(&self, request: &PageRequest) -> Result<SearchPage, HostError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Ok(SearchPage::default()))
    }

    fn result_window(&self) -> Option<usize> {
        self.window
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// A [`Clock`] whose `sleep` returns immediately and advances virtual time.
pub struct ManualClock {
    base: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move virtual time forward without recording a sleep.
    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock().expect("elapsed lock") += by;
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("sleeps lock").clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.elapsed.lock().expect("elapsed lock")
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().expect("sleeps lock").push(duration);
        self.advance(duration);
    }
}
