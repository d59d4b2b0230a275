//! Core domain types for a repoharvest run.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HarvestError;

/// Current schema version for the exported run report.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// One `owner` or `name` segment of a repository identifier.
static SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("segment regex"));

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RepoId
// ---------------------------------------------------------------------------

/// A validated `owner/name` repository identifier.
///
/// Ordering is plain lexical order of the full `owner/name` string, which is
/// the tie-break order used by the selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId(String);

impl RepoId {
    /// Build an identifier from separate owner and name segments.
    pub fn new(owner: &str, name: &str) -> crate::Result<Self> {
        format!("{owner}/{name}").parse()
    }

    /// The owner (user or organization) segment.
    pub fn owner(&self) -> &str {
        self.0.split_once('/').map(|(o, _)| o).unwrap_or(&self.0)
    }

    /// The repository name segment.
    pub fn name(&self) -> &str {
        self.0.split_once('/').map(|(_, n)| n).unwrap_or(&self.0)
    }

    /// The full `owner/name` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn valid_segment(segment: &str) -> bool {
    segment != "." && segment != ".." && SEGMENT_RE.is_match(segment)
}

impl FromStr for RepoId {
    type Err = HarvestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name)) if valid_segment(owner) && valid_segment(name) => {
                Ok(Self(s.to_string()))
            }
            _ => Err(HarvestError::validation(format!(
                "invalid repository identifier '{s}': expected owner/name"
            ))),
        }
    }
}

impl TryFrom<String> for RepoId {
    type Error = HarvestError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepoId> for String {
    fn from(id: RepoId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Relevance
// ---------------------------------------------------------------------------

/// Industry relevance score, always within `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Relevance(f64);

impl Relevance {
    pub const ZERO: Relevance = Relevance(0.0);
    pub const MAX: Relevance = Relevance(1.0);

    /// Clamp `value` into `[0.0, 1.0]`. NaN becomes zero.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self::ZERO
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for Relevance {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Relevance> for f64 {
    fn from(r: Relevance) -> Self {
        r.0
    }
}

// ---------------------------------------------------------------------------
// RepositoryRecord
// ---------------------------------------------------------------------------

/// Metadata for one repository returned by the search host.
///
/// Created by the search adapter; the relevance score is attached once by the
/// scorer through [`RepositoryRecord::with_relevance`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// `owner/name` identifier.
    pub id: RepoId,
    /// Free-text description, if the owner set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Primary language as detected by the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Stargazer count.
    pub stars: u32,
    /// Fork count.
    #[serde(default)]
    pub forks: u32,
    /// Watcher count.
    #[serde(default)]
    pub watchers: u32,
    /// Topic tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    /// Web URL of the repository.
    #[serde(default)]
    pub html_url: String,
    /// URL handed to the clone protocol.
    pub clone_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last metadata update.
    pub updated_at: DateTime<Utc>,
    /// Last push.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pushed_at: Option<DateTime<Utc>>,
    /// Industry relevance, zero until scored.
    #[serde(default)]
    pub relevance: Relevance,
}

impl RepositoryRecord {
    /// Consume the record and return it with `relevance` attached.
    pub fn with_relevance(self, relevance: Relevance) -> Self {
        Self { relevance, ..self }
    }
}

// ---------------------------------------------------------------------------
// Enumerated settings
// ---------------------------------------------------------------------------

/// Named recency window for the `pushed:>=` qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    Week,
    Month,
    Quarter,
    Year,
}

impl DateRange {
    pub fn days(self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
            Self::Year => 365,
        }
    }

    /// Calendar date `days()` before `now`.
    pub fn cutoff(self, now: DateTime<Utc>) -> NaiveDate {
        (now - Duration::days(self.days())).date_naive()
    }
}

impl FromStr for DateRange {
    type Err = HarvestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "quarter" => Ok(Self::Quarter),
            "year" => Ok(Self::Year),
            other => Err(HarvestError::config(format!(
                "unknown date range '{other}': expected week, month, quarter, or year"
            ))),
        }
    }
}

/// Key the selector sorts by (always descending).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Stars,
    Relevance,
    Updated,
}

impl FromStr for SortKey {
    type Err = HarvestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stars" => Ok(Self::Stars),
            "relevance" => Ok(Self::Relevance),
            "updated" => Ok(Self::Updated),
            other => Err(HarvestError::config(format!(
                "unknown sort key '{other}': expected stars, relevance, or updated"
            ))),
        }
    }
}

/// What the clone executor does when the destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingPolicy {
    /// Record an "already present" outcome and move on.
    #[default]
    Skip,
    /// Record a failed outcome for that entry.
    Fail,
}

/// Why paging stopped before the host ran out of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Truncation {
    /// The host flagged its own result set as incomplete.
    HostIncomplete,
    /// The host's maximum result window was reached.
    ResultWindow { limit: usize },
    /// The wall-clock search budget elapsed.
    TimeBudget { elapsed_secs: u64 },
}

impl std::fmt::Display for Truncation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HostIncomplete => f.write_str("host reported incomplete results"),
            Self::ResultWindow { limit } => write!(f, "host result window of {limit} reached"),
            Self::TimeBudget { elapsed_secs } => {
                write!(f, "search time budget elapsed after {elapsed_secs}s")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SelectionResult
// ---------------------------------------------------------------------------

/// Per-stage counters recorded by the selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionStats {
    /// Records handed to the selector.
    pub candidates: usize,
    /// Dropped because the language is outside the allow-list.
    pub dropped_language: usize,
    /// Dropped for having fewer stars than the minimum.
    pub dropped_below_stars: usize,
    /// Dropped for scoring below the minimum relevance.
    pub dropped_below_relevance: usize,
    /// Later occurrences of an identifier already kept.
    pub dropped_duplicates: usize,
    /// Cut by the maximum repository count.
    pub dropped_over_cap: usize,
}

/// Ordered, deduplicated, bounded selection chosen for cloning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected: Vec<RepositoryRecord>,
    pub stats: SelectionStats,
}

impl SelectionResult {
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

// ---------------------------------------------------------------------------
// CloneOutcome
// ---------------------------------------------------------------------------

/// Terminal status of one clone attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CloneStatus {
    Cloned { path: PathBuf },
    AlreadyPresent { path: PathBuf },
    Failed { error: String },
}

/// Result of materializing one selected repository locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneOutcome {
    pub id: RepoId,
    pub clone_url: String,
    #[serde(flatten)]
    pub status: CloneStatus,
}

impl CloneOutcome {
    /// `true` for a fresh clone or an already-present checkout.
    pub fn is_success(&self) -> bool {
        !matches!(self.status, CloneStatus::Failed { .. })
    }

    /// Local path on success.
    pub fn path(&self) -> Option<&PathBuf> {
        match &self.status {
            CloneStatus::Cloned { path } | CloneStatus::AlreadyPresent { path } => Some(path),
            CloneStatus::Failed { .. } => None,
        }
    }

    /// Failure description, if the attempt failed.
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            CloneStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// HarvestReport
// ---------------------------------------------------------------------------

/// Everything a run produced, handed to the reporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestReport {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    pub run_id: RunId,
    /// Tool version that produced the report.
    pub tool_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Composed query text sent to the host.
    pub query: String,
    /// Whether cloning was skipped.
    pub search_only: bool,
    /// Set when paging stopped early.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<Truncation>,
    pub selection: SelectionResult,
    /// One entry per selected repository, in selection order (empty in search-only runs).
    #[serde(default)]
    pub outcomes: Vec<CloneOutcome>,
}

impl HarvestReport {
    /// Number of outcomes that ended with a usable checkout.
    pub fn cloned_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of failed clone attempts.
    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.cloned_count()
    }
}
