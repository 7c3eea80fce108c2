//! boardsync CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: flags and their environment bindings are
//!    parsed by `clap` and validated into a [`config::SyncConfig`],
//!    [`config::ProjectConfig`] or [`config::JiraConfig`] before any request
//!    is made.
//! 2. **Wire observability**: `tracing-subscriber` with text or JSON output,
//!    plus an OTLP exporter when `OTEL_EXPORTER_OTLP_ENDPOINT` is set. Every
//!    run is wrapped in a root span carrying a fresh [`SyncRunId`].
//! 3. **Construct infrastructure**: the GitHub transport, retrying executor,
//!    project boards, feeds and timeline from the `github` crate, and the
//!    ticket search from the `jira` crate.
//! 4. **Dispatch the sub-command** and print its report to stdout.

mod commands;
mod config;
mod observability;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::{info_span, Instrument};

use reconcile::{ItemKind, SyncRunId};

use crate::config::{GlobalArgs, JiraArgs, JiraConfig, ProjectConfig, SyncConfig};

/// Sync GitHub issues and pull requests onto a Projects board.
#[derive(Debug, Parser)]
#[command(name = "boardsync", version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sync pull requests from the configured repositories to the project
    Prs,
    /// Sync issues from the configured repositories to the project
    Issues,
    /// Copy pull requests with a due date from another project
    Project {
        /// Organization that owns the source project
        source_owner: String,
        /// Number of the source project
        source_number: u64,
    },
    /// Mirror Jira tickets onto the board items of their GitHub issues
    Jira(JiraArgs),
    /// Show the current GitHub API rate limits
    RateLimits,
    /// List the fields each sync can populate
    Fields,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Prs | Command::Issues => {
            let kind = if matches!(cli.command, Command::Prs) {
                ItemKind::PullRequest
            } else {
                ItemKind::Issue
            };
            let config = SyncConfig::from_args(&cli.global)?;
            let summaries = commands::sync::run(&config, kind).await?;

            let mut failed = 0;
            for (repo, summary) in &summaries {
                print!("{}", commands::sync::render_summary(repo, summary));
                failed += summary.failures.len();
            }
            if failed > 0 {
                bail!("{failed} item(s) failed to sync");
            }
        }
        Command::Project {
            ref source_owner,
            source_number,
        } => {
            let config = ProjectConfig::from_args(&cli.global, source_owner, source_number)?;
            let summary = commands::project::run(&config).await?;
            println!(
                "{} copied ({} added), {} skipped",
                summary.copied, summary.added, summary.skipped
            );
            for (url, message) in &summary.failures {
                println!("  FAILED {url}: {message}");
            }
            if !summary.failures.is_empty() {
                bail!("{} item(s) failed to copy", summary.failures.len());
            }
        }
        Command::Jira(ref jira) => {
            let config = JiraConfig::from_args(&cli.global, jira)?;
            let summary = commands::jira::run(&config).await?;
            println!("{} tickets synced ({} added)", summary.synced, summary.added);
            for (key, message) in &summary.failures {
                println!("  FAILED {key}: {message}");
            }
            if !summary.failures.is_empty() {
                bail!("{} ticket(s) failed to sync", summary.failures.len());
            }
        }
        Command::RateLimits => {
            let token = cli.global.require_token()?;
            print!("{}", commands::rate_limits::run(&token, &cli.global.api_url).await?);
        }
        Command::Fields => print!("{}", commands::fields::render()),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let telemetry = observability::init(cli.global.log_format)?;

    let run_id = SyncRunId::new_random();
    let span = info_span!("boardsync", run_id = %run_id, dry_run = cli.global.dry_run);
    let result = run(cli).instrument(span).await;

    telemetry.shutdown();
    result
}
