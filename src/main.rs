//! assetdownloader keeps local copies of GitHub release assets current.
//!
//! Each requested (repository, asset, destination) triple has a YAML record
//! remembering the last release tag downloaded. A run resolves the latest
//! release of every repository concurrently and downloads only the assets
//! whose tag changed or whose local file is missing.

#![warn(clippy::all)]

mod cli;
mod config;
mod download;
mod lifecycle;
mod records;
mod release;
pub mod retry;
mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Command, DeleteArgs, DownloadArgs};
use config::Config;
use download::{HttpFetcher, ReconcileOutcome, ReconcileReport, Reconciler, WorkItem};
use records::{RecordStore, YamlRecordStore};
use release::GithubResolver;

async fn run_download(args: DownloadArgs, config: Config) -> anyhow::Result<()> {
    let items = args.work_items()?;
    let started = Instant::now();

    let client = release::build_client(config.timeout)?;
    let store: Arc<dyn RecordStore> = Arc::new(YamlRecordStore::new(&config.records_dir));
    let resolver = Arc::new(GithubResolver::new(client.clone(), config.api_url.clone()));
    let fetcher = Arc::new(HttpFetcher::new(client, config.retry));

    tracing::debug!(records = %config.records_dir.display(), "using record directory");
    let reconciler =
        Reconciler::new(store, resolver, fetcher).with_concurrency(config.concurrency);
    let report = reconciler.reconcile_all(items).await;

    log_summary(&report, started.elapsed());
    report.ensure_success()
}

fn log_summary(report: &ReconcileReport, elapsed: Duration) {
    tracing::info!("── Summary ──");
    for (item, outcome) in &report.results {
        let line = outcome_line(item, outcome);
        if outcome.is_failed() {
            tracing::error!("{}", line);
        } else {
            tracing::info!("{}", line);
        }
    }
    tracing::info!(
        "  {} updated, {} up to date, {} failed, {} total",
        report.updated(),
        report.skipped(),
        report.failed(),
        report.results.len()
    );
    tracing::info!("  elapsed: {}", format_duration(elapsed));
}

fn outcome_line(item: &WorkItem, outcome: &ReconcileOutcome) -> String {
    match outcome {
        ReconcileOutcome::Updated {
            tag,
            previous_tag,
            bytes,
        } => {
            let from = if previous_tag.is_empty() {
                "(none)"
            } else {
                previous_tag.as_str()
            };
            format!(
                "  updated  {} {}: {} -> {} ({} bytes)",
                item.repository, item.filename, from, tag, bytes
            )
        }
        ReconcileOutcome::Skipped { tag } => {
            format!("  current  {} {}: {}", item.repository, item.filename, tag)
        }
        ReconcileOutcome::Failed(error) => format!("  failed   {}: {}", item, error),
    }
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}.{:01}s", secs, d.subsec_millis() / 100)
    }
}

async fn run_list(config: Config) -> anyhow::Result<()> {
    let store = YamlRecordStore::new(&config.records_dir);
    let listing = lifecycle::list_all(&store).await?;
    print!("{listing}");
    Ok(())
}

async fn run_delete(args: DeleteArgs, config: Config) -> anyhow::Result<()> {
    let store = YamlRecordStore::new(&config.records_dir);
    let results = lifecycle::delete_by_index(&store, &args.indices).await?;

    let mut failed = 0;
    for (index, result) in &results {
        match result {
            Ok(record) => println!(
                "Deleted {}: {} {} ({})",
                index, record.repository_name, record.file_name, record.download_path
            ),
            Err(e) => {
                failed += 1;
                eprintln!("Could not delete {}: {}", index, e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} deletions failed", failed, results.len());
    }
    Ok(())
}

fn run_version() {
    println!(
        "assetdownloader {} (built {})",
        env!("CARGO_PKG_VERSION"),
        env!("ASSETDL_BUILD_DATE")
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    if matches!(cli.command, Command::Version) {
        run_version();
        return Ok(());
    }

    let config = Config::from_cli(&cli)?;
    match cli.command {
        Command::Download(args) => run_download(args, config).await,
        Command::List => run_list(config).await,
        Command::Delete(args) => run_delete(args, config).await,
        Command::Version => Ok(()),
    }
}
