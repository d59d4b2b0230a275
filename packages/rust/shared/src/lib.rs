//! Shared types, error model, and configuration for repoharvest.
//!
//! This crate is the foundation depended on by all other repoharvest crates.
//! It provides:
//! - [`HarvestError`]: the unified error type
//! - Domain types ([`RepositoryRecord`], [`SelectionResult`], [`CloneOutcome`], [`HarvestReport`])
//! - Configuration ([`AppConfig`], [`SearchCriteria`], [`SelectionConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CloneConfig, CloneSection, ExportConfig, ExportFormat, GitHubConfig, RetryConfig,
    SearchCriteria, SearchSection, SelectionConfig, SelectionSection, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_token,
};
pub use error::{HarvestError, Result};
pub use types::{
    CURRENT_SCHEMA_VERSION, CloneOutcome, CloneStatus, DateRange, ExistingPolicy, HarvestReport,
    Relevance, RepoId, RepositoryRecord, RunId, SelectionResult, SelectionStats, SortKey,
    Truncation,
};
