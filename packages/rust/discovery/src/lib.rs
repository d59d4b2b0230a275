//! Repository discovery against a code-hosting search API.
//!
//! A run composes one query from the configured criteria ([`build_query`]),
//! then pages through the host's results with a [`SearchClient`]. The client
//! yields a capped [`SearchStream`]: it waits out rate limits, retries
//! transient failures within a [`RetryPolicy`], and surfaces anything else as
//! a fatal error.

mod github;
mod host;
mod query;
mod retry;
mod stream;
pub mod testing;

pub use github::GitHubHost;
pub use host::{HostError, PageRequest, SearchHost, SearchPage};
pub use query::{ComposedQuery, SearchFilters, build_query};
pub use retry::{Clock, RetryPolicy, TokioClock};
pub use stream::{SearchClient, SearchLimits, SearchOutcome, SearchStream};
