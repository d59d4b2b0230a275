//! Run report export: JSON and CSV renderings of a [`HarvestReport`].
//!
//! JSON carries the whole report. CSV is flat: one row per selected
//! repository, joined with its clone outcome when there is one.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use repoharvest_shared::{CloneStatus, ExportFormat, HarvestError, HarvestReport, Result};

/// File name used when no output path is given, e.g.
/// `repoharvest_results_20240501_093000.json`.
pub fn default_file_name(format: ExportFormat, now: DateTime<Utc>) -> String {
    format!(
        "repoharvest_results_{}.{}",
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Render and write `report`, returning the path written.
///
/// Without `output`, the file lands in the current directory under
/// [`default_file_name`]. The write goes through a temp file and a rename.
#[instrument(skip_all, fields(format = ?format))]
pub fn write_report(
    report: &HarvestReport,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<PathBuf> {
    let path = match output {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(default_file_name(format, report.finished_at)),
    };

    let content = match format {
        ExportFormat::Json => render_json(report)?,
        ExportFormat::Csv => render_csv(report)?,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| HarvestError::Export(format!("not a file path: {}", path.display())))?;
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, &content).map_err(|e| HarvestError::io(&temp, e))?;
    std::fs::rename(&temp, &path).map_err(|e| HarvestError::io(&path, e))?;

    info!(
        path = %path.display(),
        rows = report.selection.len(),
        "exported results"
    );
    Ok(path)
}

/// The full report as pretty-printed JSON.
pub fn render_json(report: &HarvestReport) -> Result<String> {
    serde_json::to_string_pretty(report)
        .map_err(|e| HarvestError::Export(format!("JSON serialization failed: {e}")))
}

#[derive(Serialize)]
struct CsvRow<'a> {
    id: &'a str,
    owner: &'a str,
    name: &'a str,
    description: &'a str,
    language: &'a str,
    stars: u32,
    forks: u32,
    watchers: u32,
    topics: String,
    relevance: f64,
    html_url: &'a str,
    clone_url: &'a str,
    created_at: Option<String>,
    updated_at: String,
    pushed_at: Option<String>,
    clone_status: &'static str,
    local_path: Option<String>,
    clone_error: Option<&'a str>,
}

/// Selected repositories as CSV, in selection order.
pub fn render_csv(report: &HarvestReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for record in &report.selection.selected {
        let outcome = report.outcomes.iter().find(|o| o.id == record.id);
        let (clone_status, local_path, clone_error) = match outcome.map(|o| &o.status) {
            None => ("not_attempted", None, None),
            Some(CloneStatus::Cloned { path }) => ("cloned", Some(path.display().to_string()), None),
            Some(CloneStatus::AlreadyPresent { path }) => {
                ("already_present", Some(path.display().to_string()), None)
            }
            Some(CloneStatus::Failed { error }) => ("failed", None, Some(error.as_str())),
        };

        writer
            .serialize(CsvRow {
                id: record.id.as_str(),
                owner: record.id.owner(),
                name: record.id.name(),
                description: record.description.as_deref().unwrap_or(""),
                language: record.language.as_deref().unwrap_or(""),
                stars: record.stars,
                forks: record.forks,
                watchers: record.watchers,
                topics: record.topics.join(";"),
                relevance: record.relevance.value(),
                html_url: &record.html_url,
                clone_url: &record.clone_url,
                created_at: record.created_at.map(|t| t.to_rfc3339()),
                updated_at: record.updated_at.to_rfc3339(),
                pushed_at: record.pushed_at.map(|t| t.to_rfc3339()),
                clone_status,
                local_path,
                clone_error,
            })
            .map_err(|e| HarvestError::Export(format!("CSV serialization failed: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| HarvestError::Export(format!("CSV flush failed: {e}")))?;
    debug!(bytes = bytes.len(), "rendered CSV");
    String::from_utf8(bytes).map_err(|e| HarvestError::Export(format!("CSV is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use repoharvest_shared::{
        CURRENT_SCHEMA_VERSION, CloneOutcome, Relevance, RepositoryRecord, RunId,
        SelectionResult, SelectionStats,
    };

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rh-report-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn record(id: &str, stars: u32, description: Option<&str>) -> RepositoryRecord {
        RepositoryRecord {
            id: id.parse().unwrap(),
            description: description.map(String::from),
            language: Some("Python".into()),
            stars,
            forks: 3,
            watchers: stars,
            topics: vec!["manufacturing".into(), "oee".into()],
            html_url: format!("https://github.com/{id}"),
            clone_url: format!("https://github.com/{id}.git"),
            created_at: None,
            updated_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            pushed_at: None,
            relevance: Relevance::new(0.5),
        }
    }

    fn make_report() -> HarvestReport {
        let finished = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        HarvestReport {
            schema_version: CURRENT_SCHEMA_VERSION,
            run_id: RunId::new(),
            tool_version: "0.1.0".into(),
            started_at: finished,
            finished_at: finished,
            query: "manufacturing".into(),
            search_only: false,
            truncation: None,
            selection: SelectionResult {
                selected: vec![
                    record("acme/line-kpi", 412, Some("KPI dashboard, \"real-time\"")),
                    record("fab/plc", 38, None),
                ],
                stats: SelectionStats {
                    candidates: 5,
                    dropped_below_stars: 3,
                    ..SelectionStats::default()
                },
            },
            outcomes: vec![
                CloneOutcome {
                    id: "acme/line-kpi".parse().unwrap(),
                    clone_url: "https://github.com/acme/line-kpi.git".into(),
                    status: CloneStatus::Cloned {
                        path: PathBuf::from("cloned_repos/acme/line-kpi"),
                    },
                },
                CloneOutcome {
                    id: "fab/plc".parse().unwrap(),
                    clone_url: "https://github.com/fab/plc.git".into(),
                    status: CloneStatus::Failed {
                        error: "git clone exited with status 128: not found".into(),
                    },
                },
            ],
        }
    }

    #[test]
    fn default_name_has_timestamp_and_extension() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 5).unwrap();
        assert_eq!(
            default_file_name(ExportFormat::Csv, now),
            "repoharvest_results_20240501_093005.csv"
        );
        assert_eq!(
            default_file_name(ExportFormat::Json, now),
            "repoharvest_results_20240501_093005.json"
        );
    }

    #[test]
    fn json_export_round_trips_the_report() {
        let tmp = temp_dir();
        let target = tmp.join("out").join("report.json");
        let report = make_report();

        let written = write_report(&report, ExportFormat::Json, Some(&target)).unwrap();
        assert_eq!(written, target);

        let parsed: HarvestReport =
            serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(parsed.run_id, report.run_id);
        assert_eq!(parsed.selection, report.selection);
        assert_eq!(parsed.outcomes, report.outcomes);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn csv_has_one_row_per_selected_repo() {
        let csv = render_csv(&make_report()).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());

        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "id");
        assert!(headers.iter().any(|h| h == "clone_status"));

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "acme/line-kpi");
        assert_eq!(&rows[0][3], "KPI dashboard, \"real-time\"");
        assert_eq!(&rows[0][8], "manufacturing;oee");

        let status = headers.iter().position(|h| h == "clone_status").unwrap();
        assert_eq!(&rows[0][status], "cloned");
        assert_eq!(&rows[1][status], "failed");
    }

    #[test]
    fn search_only_rows_are_not_attempted() {
        let mut report = make_report();
        report.search_only = true;
        report.outcomes.clear();

        let csv = render_csv(&report).unwrap();
        assert_eq!(csv.matches("not_attempted").count(), 2);
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let tmp = temp_dir();
        let target = tmp.join("results.csv");
        write_report(&make_report(), ExportFormat::Csv, Some(&target)).unwrap();

        let names: Vec<String> = std::fs::read_dir(&tmp)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["results.csv".to_string()]);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
