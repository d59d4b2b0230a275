//! Core pipeline orchestration and domain logic for repoharvest.
//!
//! This crate ties together search, relevance scoring, selection and
//! cloning into a single run (`run_harvest`).

pub mod clone;
pub mod pipeline;
pub mod scoring;
pub mod selection;

#[cfg(test)]
mod test_support;

pub use clone::{CloneError, CloneExecutor, Cloner, GitCliCloner};
pub use pipeline::{HarvestConfig, ProgressReporter, SilentProgress, run_harvest};
pub use scoring::RelevanceScorer;
pub use selection::Selector;
