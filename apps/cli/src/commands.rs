//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use repoharvest_core::{
    CloneExecutor, GitCliCloner, HarvestConfig, ProgressReporter, run_harvest,
};
use repoharvest_discovery::{GitHubHost, RetryPolicy, SearchClient};
use repoharvest_shared::{
    AppConfig, CloneConfig, CloneOutcome, CloneStatus, DateRange, ExportFormat, HarvestReport,
    SearchCriteria, SelectionConfig, SortKey, config_file_path, init_config, load_config,
    load_config_from, resolve_token,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// repoharvest: find and clone industry-relevant GitHub repositories.
#[derive(Parser)]
#[command(
    name = "repoharvest",
    version,
    about = "Search GitHub, rank repositories by industry relevance, and clone the best of them.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.repoharvest/repoharvest.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Search, score, select, clone, and export a report.
    Run(RunArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Per-run overrides of the config file.
#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Base search query.
    #[arg(short, long)]
    pub query: Option<String>,

    /// Minimum stars, applied both in the host query and by the selector.
    #[arg(long)]
    pub min_stars: Option<u32>,

    /// Only repositories pushed within this window: week, month, quarter, year.
    #[arg(long)]
    pub date_range: Option<DateRange>,

    /// Maximum number of search results to pull.
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Minimum relevance score in [0, 1].
    #[arg(long)]
    pub min_relevance: Option<f64>,

    /// Directory to clone into.
    #[arg(long)]
    pub clone_dir: Option<PathBuf>,

    /// Maximum number of repositories to clone.
    #[arg(long)]
    pub max_clone: Option<usize>,

    /// Ranking key: stars, relevance, updated.
    #[arg(long)]
    pub sort_by: Option<SortKey>,

    /// Report format: json or csv.
    #[arg(long)]
    pub export_format: Option<ExportFormat>,

    /// Report path (defaults to repoharvest_results_<timestamp>.<ext>).
    #[arg(short, long)]
    pub output_file: Option<PathBuf>,

    /// Search and select only; do not clone.
    #[arg(long)]
    pub search_only: bool,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "repoharvest=info",
        1 => "repoharvest=debug",
        _ => "repoharvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(cli.config.as_deref(), args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Fold command-line overrides into the file config.
fn apply_overrides(config: &mut AppConfig, args: &RunArgs) {
    if let Some(query) = &args.query {
        config.search.query = query.clone();
    }
    if let Some(stars) = args.min_stars {
        config.search.min_stars = stars;
        config.selection.min_stars = stars;
    }
    if let Some(range) = args.date_range {
        config.search.date_range = Some(range);
    }
    if let Some(max) = args.max_results {
        config.search.max_results = max;
    }
    if let Some(relevance) = args.min_relevance {
        config.selection.min_relevance = relevance;
    }
    if let Some(dir) = &args.clone_dir {
        config.clone.directory = dir.to_string_lossy().into_owned();
    }
    if let Some(max) = args.max_clone {
        config.selection.max_repositories = max;
    }
    if let Some(key) = args.sort_by {
        config.selection.sort_by = key;
    }
    if let Some(format) = args.export_format {
        config.export.format = format;
    }
    if let Some(path) = &args.output_file {
        config.export.output_file = Some(path.to_string_lossy().into_owned());
    }
}

async fn cmd_run(config_path: Option<&Path>, args: RunArgs) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    apply_overrides(&mut config, &args);

    let criteria = SearchCriteria::from(&config);
    let selection = SelectionConfig::from(&config);
    criteria.validate()?;
    selection.validate()?;

    // Token check happens before anything touches the network.
    let token = resolve_token(&config)?;

    let host = GitHubHost::new(&config.github, Some(token))?;
    let search = SearchClient::new(host, RetryPolicy::from(&config.retry))
        .per_page(config.github.per_page);

    let clone_config = CloneConfig::from(&config);
    let executor = CloneExecutor::new(GitCliCloner::new(&clone_config), clone_config);

    let harvest = HarvestConfig {
        criteria,
        selection,
        search_only: args.search_only,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    info!(
        query = %harvest.criteria.query,
        max_results = harvest.criteria.max_results,
        max_clone = harvest.selection.max_repositories,
        search_only = harvest.search_only,
        "starting run"
    );

    let reporter = CliProgress::new();
    let report = run_harvest(&harvest, &search, &executor, &reporter).await?;

    let output = config.export.output_file.as_deref().map(Path::new);
    let export_path = repoharvest_report::write_report(&report, config.export.format, output)
        .wrap_err("failed to export results")?;

    print_summary(&report, &export_path);
    Ok(())
}

fn print_summary(report: &HarvestReport, export_path: &Path) {
    let stats = &report.selection.stats;

    println!();
    println!("  Run:        {}", report.run_id);
    println!("  Query:      {}", report.query);
    println!("  Candidates: {}", stats.candidates);
    println!("  Selected:   {}", report.selection.len());
    if let Some(truncation) = &report.truncation {
        println!("  Truncated:  {truncation}");
    }
    println!();

    for (i, record) in report.selection.selected.iter().enumerate() {
        println!(
            "  {:>2}. {:<40} {:>7} stars  relevance {:.2}",
            i + 1,
            record.id.as_str(),
            record.stars,
            record.relevance.value()
        );
    }

    if !report.search_only {
        println!();
        println!("  Cloned:     {}", report.cloned_count());
        println!("  Failed:     {}", report.failed_count());
        for outcome in report.outcomes.iter().filter(|o| !o.is_success()) {
            println!("    {}: {}", outcome.id, outcome.error().unwrap_or("unknown error"));
        }
    }

    println!();
    println!("  Report:     {}", export_path.display());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn search_finished(&self, found: usize, pages: u32) {
        self.spinner
            .set_message(format!("Found {found} repositories in {pages} page(s)"));
    }

    fn repo_cloned(&self, outcome: &CloneOutcome, current: usize, total: usize) {
        let verb = match outcome.status {
            CloneStatus::Cloned { .. } => "Cloned",
            CloneStatus::AlreadyPresent { .. } => "Present",
            CloneStatus::Failed { .. } => "Failed",
        };
        self.spinner
            .set_message(format!("[{current}/{total}] {verb} {}", outcome.id));
    }

    fn done(&self, _report: &HarvestReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let source = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    println!("# {}", source.display());
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
