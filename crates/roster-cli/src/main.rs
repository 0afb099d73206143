//! Roster Migrate - one-time bulk migration of roster records.
//!
//! Reads a collection from a document-store export and creates each record
//! on the target CMS, writing every outcome to a JSON checkpoint so the job
//! can be re-run safely.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{ReportArgs, RunArgs};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "roster-migrate")]
#[command(about = "Resumable bulk migration of school roster records")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Migrate a source collection into the target
    Run(RunArgs),
    /// Summarize an existing checkpoint file
    Report(ReportArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.json_logs);

    match cli.command {
        Command::Run(args) => commands::run(args).await,
        Command::Report(args) => commands::report(args),
    }
}

/// Logs go to stderr; stdout carries only the final summary.
fn init_logging(debug: bool, json: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .json()
            .init();
    } else {
        FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .init();
    }
}
