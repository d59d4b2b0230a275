//! Application configuration for repoharvest.
//!
//! User config lives at `~/.repoharvest/repoharvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};
use crate::types::{DateRange, ExistingPolicy, SortKey};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "repoharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".repoharvest";

// ---------------------------------------------------------------------------
// Config structs (matching repoharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host API settings.
    #[serde(default)]
    pub github: GitHubConfig,

    /// Search criteria.
    #[serde(default)]
    pub search: SearchSection,

    /// Retry and rate-limit budget for the search adapter.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Selection thresholds.
    #[serde(default)]
    pub selection: SelectionSection,

    /// Clone behavior.
    #[serde(default)]
    pub clone: CloneSection,

    /// Report export.
    #[serde(default)]
    pub export: ExportConfig,
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Name of the env var holding the token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// API root, overridable for GitHub Enterprise or test servers.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Results requested per page (the host caps this at 100).
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            api_base_url: default_api_base_url(),
            per_page: default_per_page(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_api_base_url() -> String {
    "https://api.github.com".into()
}
fn default_per_page() -> u32 {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSection {
    /// Base keyword query.
    #[serde(default)]
    pub query: String,

    /// OR-append the industry keywords to the base query.
    #[serde(default = "default_true")]
    pub expand_industry_keywords: bool,

    /// Industry keywords, in the order they are appended and scored.
    #[serde(default)]
    pub industry_keywords: Vec<String>,

    /// Language allow-list (empty means any language).
    #[serde(default)]
    pub languages: Vec<String>,

    /// Host-side star threshold.
    #[serde(default)]
    pub min_stars: u32,

    /// Only repositories pushed within this window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,

    /// Upper bound on records pulled from the host.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Wall-clock budget for paging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_secs: Option<u64>,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            query: String::new(),
            expand_industry_keywords: true,
            industry_keywords: Vec::new(),
            languages: Vec::new(),
            min_stars: 0,
            date_range: None,
            max_results: default_max_results(),
            max_duration_secs: None,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_results() -> usize {
    100
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per page for transient failures (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles per attempt.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Ceiling for a single backoff.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// How many rate-limit waits a run tolerates.
    #[serde(default = "default_max_rate_limit_waits")]
    pub max_rate_limit_waits: u32,

    /// Ceiling for a single rate-limit wait.
    #[serde(default = "default_max_rate_limit_wait_secs")]
    pub max_rate_limit_wait_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_rate_limit_waits: default_max_rate_limit_waits(),
            max_rate_limit_wait_secs: default_max_rate_limit_wait_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_backoff_ms() -> u64 {
    1_000
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_max_rate_limit_waits() -> u32 {
    5
}
fn default_max_rate_limit_wait_secs() -> u64 {
    3_600
}

/// `[selection]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionSection {
    #[serde(default)]
    pub min_stars: u32,

    /// Minimum industry relevance in `[0.0, 1.0]`.
    #[serde(default)]
    pub min_relevance: f64,

    #[serde(default)]
    pub sort_by: SortKey,

    /// Upper bound on repositories selected for cloning.
    #[serde(default = "default_max_repositories")]
    pub max_repositories: usize,
}

impl Default for SelectionSection {
    fn default() -> Self {
        Self {
            min_stars: 0,
            min_relevance: 0.0,
            sort_by: SortKey::default(),
            max_repositories: default_max_repositories(),
        }
    }
}

fn default_max_repositories() -> usize {
    10
}

/// `[clone]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneSection {
    /// Target directory for clones.
    #[serde(default = "default_clone_dir")]
    pub directory: String,

    /// Behavior when a destination already exists.
    #[serde(default)]
    pub on_existing: ExistingPolicy,

    /// Shallow clone depth (`None` for full history).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,

    /// Per-clone timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for CloneSection {
    fn default() -> Self {
        Self {
            directory: default_clone_dir(),
            on_existing: ExistingPolicy::default(),
            depth: None,
            timeout_secs: None,
        }
    }
}

fn default_clone_dir() -> String {
    "cloned_repos".into()
}

/// Report serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(HarvestError::config(format!(
                "unknown export format '{other}': expected json or csv"
            ))),
        }
    }
}

/// `[export]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub format: ExportFormat,

    /// Output path; a timestamped name is generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
}

// ---------------------------------------------------------------------------
// Runtime criteria (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Immutable search criteria for one run.
#[derive(Debug, Clone)]
pub struct SearchCriteria {
    /// Base keyword query.
    pub query: String,
    /// Whether keywords are OR-appended to the query.
    pub expand_keywords: bool,
    /// Ordered industry keywords.
    pub industry_keywords: Vec<String>,
    /// Language allow-list.
    pub languages: Vec<String>,
    /// Host-side star threshold.
    pub min_stars: u32,
    /// Recency window.
    pub date_range: Option<DateRange>,
    /// Maximum records pulled from the host.
    pub max_results: usize,
    /// Wall-clock paging budget.
    pub max_duration: Option<Duration>,
}

impl From<&AppConfig> for SearchCriteria {
    fn from(config: &AppConfig) -> Self {
        let s = &config.search;
        Self {
            query: s.query.clone(),
            expand_keywords: s.expand_industry_keywords,
            industry_keywords: s.industry_keywords.clone(),
            languages: s.languages.clone(),
            min_stars: s.min_stars,
            date_range: s.date_range,
            max_results: s.max_results,
            max_duration: s.max_duration_secs.map(Duration::from_secs),
        }
    }
}

impl SearchCriteria {
    /// Reject criteria that cannot produce a meaningful query.
    pub fn validate(&self) -> Result<()> {
        let has_keywords = self.industry_keywords.iter().any(|k| !k.trim().is_empty());
        if self.query.trim().is_empty() && !(self.expand_keywords && has_keywords) {
            return Err(HarvestError::config(
                "search query is empty and no industry keywords are expanded into it",
            ));
        }
        if self.max_results == 0 {
            return Err(HarvestError::config("search.max_results must be at least 1"));
        }
        Ok(())
    }
}

/// Immutable selector thresholds for one run.
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    pub min_stars: u32,
    pub min_relevance: f64,
    pub sort_by: SortKey,
    pub max_repositories: usize,
    /// Language allow-list (case-insensitive, empty allows all).
    pub languages: Vec<String>,
}

impl From<&AppConfig> for SelectionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            min_stars: config.selection.min_stars,
            min_relevance: config.selection.min_relevance,
            sort_by: config.selection.sort_by,
            max_repositories: config.selection.max_repositories,
            languages: config.search.languages.clone(),
        }
    }
}

impl SelectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_relevance) {
            return Err(HarvestError::config(format!(
                "selection.min_relevance must be within 0.0..=1.0, got {}",
                self.min_relevance
            )));
        }
        if self.max_repositories == 0 {
            return Err(HarvestError::config(
                "selection.max_repositories must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Immutable clone settings for one run.
#[derive(Debug, Clone)]
pub struct CloneConfig {
    pub directory: PathBuf,
    pub on_existing: ExistingPolicy,
    pub depth: Option<u32>,
    pub timeout: Option<Duration>,
}

impl From<&AppConfig> for CloneConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            directory: PathBuf::from(&config.clone.directory),
            on_existing: config.clone.on_existing,
            depth: config.clone.depth,
            timeout: config.clone.timeout_secs.map(Duration::from_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.repoharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.repoharvest/repoharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the GitHub token from the env var named in the config.
pub fn resolve_token(config: &AppConfig) -> Result<String> {
    let var_name = &config.github.token_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(HarvestError::config(format!(
            "GitHub token not found. Set the {var_name} environment variable.\n\
             Create one at https://github.com/settings/tokens"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_repositories"));
        assert!(toml_str.contains("GITHUB_TOKEN"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.search.max_results, 100);
        assert_eq!(parsed.selection.max_repositories, 10);
        assert_eq!(parsed.github.token_env, "GITHUB_TOKEN");
    }

    #[test]
    fn config_with_sections() {
        let toml_str = r#"
[search]
query = "dashboard"
industry_keywords = ["Manufacturing KPI", "OEE"]
languages = ["Python", "Rust"]
date_range = "quarter"
max_results = 250

[selection]
min_stars = 10
min_relevance = 0.3
sort_by = "relevance"
max_repositories = 5

[clone]
directory = "/tmp/repos"
on_existing = "fail"
depth = 1
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.search.industry_keywords.len(), 2);
        assert_eq!(config.search.date_range, Some(DateRange::Quarter));
        assert_eq!(config.selection.sort_by, SortKey::Relevance);
        assert_eq!(config.clone.on_existing, ExistingPolicy::Fail);
        assert_eq!(config.clone.depth, Some(1));
        assert_eq!(config.export.format, ExportFormat::Json);
    }

    #[test]
    fn runtime_configs_from_app_config() {
        let mut app = AppConfig::default();
        app.search.languages = vec!["Rust".into()];
        app.search.max_duration_secs = Some(90);

        let criteria = SearchCriteria::from(&app);
        assert_eq!(criteria.max_results, 100);
        assert_eq!(criteria.max_duration, Some(Duration::from_secs(90)));

        let selection = SelectionConfig::from(&app);
        assert_eq!(selection.languages, vec!["Rust".to_string()]);
        assert_eq!(selection.max_repositories, 10);

        let clone = CloneConfig::from(&app);
        assert_eq!(clone.directory, PathBuf::from("cloned_repos"));
        assert_eq!(clone.on_existing, ExistingPolicy::Skip);
    }

    #[test]
    fn criteria_validation() {
        let mut criteria = SearchCriteria::from(&AppConfig::default());
        assert!(criteria.validate().is_err(), "empty query without keywords");

        criteria.industry_keywords = vec!["OEE".into()];
        assert!(criteria.validate().is_ok(), "keywords alone form a query");

        criteria.expand_keywords = false;
        assert!(criteria.validate().is_err());

        criteria.query = "dashboard".into();
        criteria.max_results = 0;
        assert!(criteria.validate().is_err());
    }

    #[test]
    fn selection_validation() {
        let mut selection = SelectionConfig::from(&AppConfig::default());
        assert!(selection.validate().is_ok());
        selection.min_relevance = 1.5;
        assert!(selection.validate().is_err());
        selection.min_relevance = 0.5;
        selection.max_repositories = 0;
        assert!(selection.validate().is_err());
    }

    #[test]
    fn token_resolution() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.github.token_env = "RH_TEST_NONEXISTENT_TOKEN_12345".into();
        let result = resolve_token(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("token not found"));
    }
}
