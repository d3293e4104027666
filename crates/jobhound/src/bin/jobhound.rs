//! Runs one scrape from the command line and prints its summary.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use jobhound::export::{export_filename, ExportScope};
use jobhound::orchestrator::request::{DEFAULT_LIMIT, MAX_LIMIT, MIN_LIMIT};
use jobhound::progress::OperationStage;
use jobhound::{load_config, JobAggregator, ScrapeRequest};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "jobhound")]
#[command(about = "Aggregate job postings into a deduplicated local store")]
struct Cli {
    /// Path to the JSON config file
    config: PathBuf,

    /// Platform to scrape, as named in the config
    platform: String,

    /// Role to search for
    role: String,

    /// Location to search in
    location: String,

    /// Maximum number of postings to collect
    #[arg(default_value_t = DEFAULT_LIMIT)]
    limit: u32,

    /// Write the platform's jobs as CSV to this path (a directory gets the default file name)
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    jobhound::logging::init(&config.logging)?;

    let aggregator = JobAggregator::from_config(&config)?;
    let shutdown = CancellationToken::new();
    let sweeper = aggregator.spawn_sweeper(shutdown.clone());

    let request = ScrapeRequest::new(&cli.platform, &cli.role, &cli.location, cli.limit);
    let operation_id = aggregator.start_scrape(request).with_context(|| {
        format!(
            "Rejected request (platforms: {}; limit {}..={})",
            aggregator.platforms().join(", "),
            MIN_LIMIT,
            MAX_LIMIT
        )
    })?;

    let mut last_message = String::new();
    let snapshot = loop {
        let snapshot = aggregator.get_progress(&operation_id);
        if snapshot.message != last_message {
            eprintln!("[{:>3}%] {}", snapshot.percentage, snapshot.message);
            last_message = snapshot.message.clone();
        }
        if snapshot.is_terminal() {
            break snapshot;
        }

        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = tokio::signal::ctrl_c() => {
                aggregator.cancel(&operation_id);
            }
        }
    };

    shutdown.cancel();
    let _ = sweeper.await;

    if snapshot.stage == OperationStage::Error {
        bail!("{}", snapshot.message);
    }

    if let Some(summary) = &snapshot.outcome {
        println!("{}", serde_json::to_string_pretty(summary)?);
    }

    if let Some(path) = cli.csv {
        let scope = ExportScope::Platform(cli.platform.clone());
        let path = if path.is_dir() {
            path.join(export_filename(&scope))
        } else {
            path
        };
        let bytes = aggregator.export_csv(&scope)?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Wrote {}", path.display());
    }

    Ok(())
}
