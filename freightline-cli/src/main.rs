//! Freightline CLI tool
//!
//! One binary covering the pipeline's entry points:
//! - `freightline init` - create tables, partitions, and tracking state
//! - `freightline ingest` - run one ingestion batch over the raw files
//! - `freightline listen` - run the completion listener process
//! - `freightline status <batch-id>` - print a batch's tracker snapshot

use clap::{Parser, Subcommand};
use freightline_core::BatchId;
use freightline_ingest::{IngestConfig, IngestRunner};
use freightline_refresh::{CompletionListener, RefreshOrchestrator};
use freightline_storage::{BatchTracker, PgStore, SchemaManager};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "freightline")]
#[command(author, version, about = "Freightline batch-ingestion pipeline CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create tables, partitions, and tracking state
    Init,

    /// Run one ingestion batch over the raw source files
    Ingest {
        /// Root data directory (expects raw/ inside)
        #[arg(long, env = "DATA_DIR", default_value = "data")]
        data_dir: PathBuf,

        /// Records per bulk-load buffer
        #[arg(long, env = "BATCH_SIZE", default_value_t = 10_000)]
        batch_size: usize,

        /// Bulk-load attempts before a buffer is quarantined
        #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
        max_retries: u32,
    },

    /// Run the completion listener and refresh orchestrator
    Listen {
        /// Seconds to block between liveness checks
        #[arg(long, default_value_t = 60)]
        wait_timeout: u64,
    },

    /// Show a batch's completion status
    Status {
        /// Batch identifier to look up
        batch_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .init();

    let database_url = cli
        .database_url
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL not set"))?;

    match cli.command {
        Commands::Init => {
            let store = Arc::new(PgStore::new(&database_url).await?);
            SchemaManager::new(store).ensure_all().await?;
            info!("Schema initialized");
        }
        Commands::Ingest {
            data_dir,
            batch_size,
            max_retries,
        } => {
            let config = IngestConfig {
                data_dir,
                batch_size,
                max_retries,
            };
            config.validate()?;

            let store = Arc::new(PgStore::new(&database_url).await?);
            let summary = IngestRunner::new(store, config).run().await?;

            for outcome in &summary.outcomes {
                match &outcome.result {
                    Ok(report) => info!(
                        table = %outcome.table,
                        loaded = report.loaded,
                        invalid = report.invalid,
                        complete = outcome.marked_complete,
                        "Table result"
                    ),
                    Err(e) => warn!(table = %outcome.table, error = %e, "Table failed"),
                }
            }

            if !summary.all_complete() {
                anyhow::bail!("Batch {} finished with incomplete tables", summary.batch_id);
            }
        }
        Commands::Listen { wait_timeout } => {
            let store = Arc::new(PgStore::new(&database_url).await?);
            let orchestrator = RefreshOrchestrator::new(store);

            // The listener runs on its own dedicated connection; the pool
            // above only serves the orchestrator's maintenance work.
            let handle = CompletionListener::new(&database_url, orchestrator)
                .with_wait_timeout(std::time::Duration::from_secs(wait_timeout))
                .start()
                .await?;

            info!("Listener running, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            info!("Received Ctrl-C, shutting down");
            handle.shutdown().await;
        }
        Commands::Status { batch_id } => {
            let store = Arc::new(PgStore::new(&database_url).await?);
            let tracker = BatchTracker::new(store);

            match tracker.get_batch_status(&BatchId::new(batch_id)).await? {
                Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
                None => anyhow::bail!("Batch not found"),
            }
        }
    }

    Ok(())
}
