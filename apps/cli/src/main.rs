//! repoharvest CLI: find industry-relevant GitHub repositories and clone
//! the best of them.
//!
//! Searches the host, scores each result against a keyword list, selects a
//! bounded top-N, clones it locally and exports a run report.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
