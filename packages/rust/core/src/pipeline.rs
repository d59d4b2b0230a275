//! End-to-end harvest: criteria → search → score → select → clone → report.

use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, instrument};

use repoharvest_discovery::{Clock, SearchClient, SearchHost, SearchLimits, build_query};
use repoharvest_shared::{
    CURRENT_SCHEMA_VERSION, CloneOutcome, HarvestReport, Result, RunId, SearchCriteria,
    SelectionConfig,
};

use crate::clone::{CloneExecutor, Cloner};
use crate::scoring::RelevanceScorer;
use crate::selection::Selector;

/// Configuration for one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub criteria: SearchCriteria,
    pub selection: SelectionConfig,
    /// Stop after selection; nothing touches the filesystem.
    pub search_only: bool,
    /// Tool version string recorded in the report.
    pub tool_version: String,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the search stage has drained.
    fn search_finished(&self, found: usize, pages: u32);
    /// Called after each clone attempt.
    fn repo_cloned(&self, outcome: &CloneOutcome, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, report: &HarvestReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn search_finished(&self, _found: usize, _pages: u32) {}
    fn repo_cloned(&self, _outcome: &CloneOutcome, _current: usize, _total: usize) {}
    fn done(&self, _report: &HarvestReport) {}
}

/// Run one harvest.
///
/// Configuration is validated before any request is made. A fatal search
/// error aborts the run with no partial report; individual clone failures
/// are recorded in the report and never abort it.
#[instrument(skip_all, fields(query = %config.criteria.query, search_only = config.search_only))]
pub async fn run_harvest<H, K, C>(
    config: &HarvestConfig,
    search: &SearchClient<H, K>,
    executor: &CloneExecutor<C>,
    progress: &dyn ProgressReporter,
) -> Result<HarvestReport>
where
    H: SearchHost,
    K: Clock,
    C: Cloner,
{
    config.criteria.validate()?;
    config.selection.validate()?;

    let start = Instant::now();
    let started_at = Utc::now();
    let run_id = RunId::new();

    // --- Phase 1: Search ---
    progress.phase("Searching repositories");
    let query = build_query(&config.criteria, started_at);
    let host_query = query.host_query();
    info!(%run_id, host = search.host().name(), query = %host_query, "starting harvest");

    let outcome = search
        .search(&query, SearchLimits::from(&config.criteria))
        .collect()
        .await
        .inspect_err(|e| error!(error = %e, "search failed, aborting run"))?;
    progress.search_finished(outcome.records.len(), outcome.pages_fetched);

    // --- Phase 2: Score ---
    progress.phase("Scoring relevance");
    let scored = RelevanceScorer::new(&config.criteria.industry_keywords).score_all(outcome.records);

    // --- Phase 3: Select ---
    progress.phase("Selecting repositories");
    let selection = Selector::new(config.selection.clone()).select(scored);

    // --- Phase 4: Clone ---
    let outcomes = if config.search_only {
        info!(selected = selection.len(), "search-only run, skipping clones");
        Vec::new()
    } else {
        progress.phase("Cloning repositories");
        executor.execute(&selection, progress).await?
    };

    let report = HarvestReport {
        schema_version: CURRENT_SCHEMA_VERSION,
        run_id,
        tool_version: config.tool_version.clone(),
        started_at,
        finished_at: Utc::now(),
        query: host_query,
        search_only: config.search_only,
        truncation: outcome.truncation,
        selection,
        outcomes,
    };

    progress.done(&report);

    info!(
        run_id = %report.run_id,
        selected = report.selection.len(),
        cloned = report.cloned_count(),
        failed = report.failed_count(),
        elapsed_ms = start.elapsed().as_millis(),
        "harvest complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    use repoharvest_discovery::testing::{ManualClock, ScriptedHost, repo};
    use repoharvest_discovery::{HostError, RetryPolicy};
    use repoharvest_shared::{
        CloneConfig, ExistingPolicy, HarvestError, RepositoryRecord, SortKey, Truncation,
    };

    use crate::test_support::FakeCloner;

    fn harvest_config() -> HarvestConfig {
        HarvestConfig {
            criteria: SearchCriteria {
                query: "manufacturing".into(),
                expand_keywords: false,
                industry_keywords: vec!["OEE".into(), "MES".into()],
                languages: Vec::new(),
                min_stars: 0,
                date_range: None,
                max_results: 100,
                max_duration: None,
            },
            selection: SelectionConfig {
                min_stars: 10,
                min_relevance: 0.5,
                sort_by: SortKey::Stars,
                max_repositories: 3,
                languages: Vec::new(),
            },
            search_only: false,
            tool_version: "0.0.0-test".into(),
        }
    }

    fn clone_config(dir: &Path) -> CloneConfig {
        CloneConfig {
            directory: dir.to_path_buf(),
            on_existing: ExistingPolicy::Skip,
            depth: None,
            timeout: None,
        }
    }

    fn described(id: &str, stars: u32, description: &str) -> RepositoryRecord {
        RepositoryRecord {
            description: Some(description.into()),
            ..repo(id, stars)
        }
    }

    fn client(host: ScriptedHost) -> SearchClient<ScriptedHost, ManualClock> {
        SearchClient::with_clock(host, ManualClock::new(), RetryPolicy::default()).per_page(3)
    }

    /// Records phases so tests can check what the pipeline announced.
    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<String>>,
        clones: Mutex<usize>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.lock().unwrap().push(name.to_string());
        }
        fn search_finished(&self, _found: usize, _pages: u32) {}
        fn repo_cloned(&self, _outcome: &CloneOutcome, _current: usize, _total: usize) {
            *self.clones.lock().unwrap() += 1;
        }
        fn done(&self, _report: &HarvestReport) {}
    }

    fn scripted_pages(host: &ScriptedHost) {
        host.push_page(
            vec![
                described("acme/line-oee", 400, "OEE and MES integration"),
                described("acme/toy", 900, "a toy project"),
                described("fab/mes-core", 50, "Lightweight MES"),
            ],
            6,
        );
        host.push_error(HostError::RateLimited {
            retry_after: Duration::from_secs(5),
        });
        host.push_page(
            vec![
                described("fab/oee-calc", 5, "OEE calculator"),
                described("plant/oee-mes", 120, "MES with OEE dashboards"),
                described("acme/line-oee", 400, "OEE and MES integration"),
            ],
            6,
        );
    }

    #[tokio::test]
    async fn full_run_selects_and_clones() {
        let tmp = tempfile::tempdir().unwrap();
        let host = ScriptedHost::new();
        scripted_pages(&host);
        let search = client(host);
        let config = harvest_config();
        let executor = CloneExecutor::new(
            FakeCloner::failing(&["https://github.com/fab/mes-core.git"]),
            clone_config(tmp.path()),
        );
        let progress = RecordingProgress::default();

        let report = run_harvest(&config, &search, &executor, &progress)
            .await
            .unwrap();

        let selected: Vec<&str> = report.selection.selected.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(selected, vec!["acme/line-oee", "plant/oee-mes", "fab/mes-core"]);
        assert_eq!(report.selection.stats.candidates, 6);
        assert_eq!(report.selection.stats.dropped_below_stars, 1);
        assert_eq!(report.selection.stats.dropped_below_relevance, 1);
        assert_eq!(report.selection.stats.dropped_duplicates, 1);

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.cloned_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.outcomes[2].id.as_str(), "fab/mes-core");
        assert!(report.truncation.is_none());
        assert_eq!(report.query, "manufacturing");
        assert_eq!(report.schema_version, CURRENT_SCHEMA_VERSION);

        assert_eq!(search.clock().sleeps(), vec![Duration::from_secs(5)]);
        assert_eq!(*progress.clones.lock().unwrap(), 3);
        assert!(progress
            .phases
            .lock()
            .unwrap()
            .contains(&"Cloning repositories".to_string()));
    }

    #[tokio::test]
    async fn search_only_never_clones() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("never-created");
        let host = ScriptedHost::new();
        scripted_pages(&host);
        let search = client(host);
        let mut config = harvest_config();
        config.search_only = true;
        let executor = CloneExecutor::new(FakeCloner::default(), clone_config(&target));

        let report = run_harvest(&config, &search, &executor, &SilentProgress)
            .await
            .unwrap();

        assert!(report.search_only);
        assert_eq!(report.selection.len(), 3);
        assert!(report.outcomes.is_empty());
        assert!(executor.cloner().calls().is_empty());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn invalid_config_fails_before_any_request() {
        let tmp = tempfile::tempdir().unwrap();
        let search = client(ScriptedHost::new());
        let mut config = harvest_config();
        config.selection.min_relevance = 1.5;
        let executor = CloneExecutor::new(FakeCloner::default(), clone_config(tmp.path()));

        let err = run_harvest(&config, &search, &executor, &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::Config { .. }));
        assert!(search.host().requests().is_empty());
    }

    #[tokio::test]
    async fn fatal_search_error_aborts_before_cloning() {
        let tmp = tempfile::tempdir().unwrap();
        let host = ScriptedHost::new();
        host.push_error(HostError::Unauthorized("Bad credentials".into()));
        let search = client(host);
        let config = harvest_config();
        let executor = CloneExecutor::new(FakeCloner::default(), clone_config(tmp.path()));

        let err = run_harvest(&config, &search, &executor, &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::Host { status: 401, .. }));
        assert!(executor.cloner().calls().is_empty());
    }

    #[tokio::test]
    async fn truncation_is_carried_into_report() {
        let tmp = tempfile::tempdir().unwrap();
        let host = ScriptedHost::new();
        host.push_incomplete_page(vec![described("acme/a", 20, "OEE MES")], 1);
        let search = client(host);
        let config = harvest_config();
        let executor = CloneExecutor::new(FakeCloner::default(), clone_config(tmp.path()));

        let report = run_harvest(&config, &search, &executor, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.truncation, Some(Truncation::HostIncomplete));
        assert_eq!(report.cloned_count(), 1);
    }

    #[tokio::test]
    async fn no_results_is_an_empty_report() {
        let tmp = tempfile::tempdir().unwrap();
        let search = client(ScriptedHost::new());
        let config = harvest_config();
        let executor = CloneExecutor::new(FakeCloner::default(), clone_config(tmp.path()));

        let report = run_harvest(&config, &search, &executor, &SilentProgress)
            .await
            .unwrap();

        assert!(report.selection.is_empty());
        assert!(report.outcomes.is_empty());
        assert_eq!(report.selection.stats.candidates, 0);
    }
}
