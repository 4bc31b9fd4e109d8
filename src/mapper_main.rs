//! Wallet association mapper binary
//!
//! Drains the pending-address queue: looks up each account's public key,
//! derives the EVM address, and commits results through the serialized
//! writer. Exits cleanly once every batch has resolved and the writer has
//! confirmed the store is closed.

use anyhow::{Context, Result};
use clap::Parser;
use seimap::config::{
    self, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, DEFAULT_ENDPOINT, DEFAULT_LOOKUP_TIMEOUT_SECS,
    DEFAULT_RETRY_CAP,
};
use seimap::dispatcher::{Dispatcher, RunConfig};
use seimap::lookup::LookupClient;
use seimap::store::{SqliteWalletStore, WalletStore};
use seimap::writer::spawn_writer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

/// Wallet address mapper
#[derive(Parser)]
#[command(name = "mapper")]
#[command(about = "Derive EVM addresses for pending wallet addresses")]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, default_value = "./wallets.db")]
    db_path: PathBuf,

    /// Lookup endpoint base URL (repeat to spread load across mirrors)
    #[arg(short, long = "endpoint")]
    endpoints: Vec<String>,

    /// File with one endpoint URL per line (takes precedence over --endpoint)
    #[arg(long)]
    endpoints_file: Option<PathBuf>,

    /// Number of addresses per worker batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Number of batches processed concurrently
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Process every underived address, ignoring the retry cap
    #[arg(long)]
    ignore_retry_cap: bool,

    /// Per-lookup timeout in seconds
    #[arg(long, default_value_t = DEFAULT_LOOKUP_TIMEOUT_SECS)]
    lookup_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args = Args::parse();
    if args.batch_size == 0 || args.concurrency == 0 {
        anyhow::bail!("Batch size and concurrency must be at least 1");
    }

    let endpoints = match &args.endpoints_file {
        Some(path) => config::load_endpoints(path)?,
        None if args.endpoints.is_empty() => vec![DEFAULT_ENDPOINT.to_string()],
        None => args.endpoints.clone(),
    };

    info!("Starting wallet association mapper");
    info!("Database: {:?}", args.db_path);
    info!("Endpoints: {:?}", endpoints);

    let store = SqliteWalletStore::open(&args.db_path)
        .with_context(|| format!("Failed to open database at {:?}", args.db_path))?;

    let retry_cap = if args.ignore_retry_cap {
        None
    } else {
        Some(DEFAULT_RETRY_CAP)
    };
    let tasks = store
        .load_pending(retry_cap)
        .context("Failed to load pending addresses")?;
    info!("Loaded {} tasks into the queue", tasks.len());

    if tasks.is_empty() {
        info!("No tasks to process");
        store.close()?;
        return Ok(());
    }

    let source = Arc::new(LookupClient::new(
        endpoints,
        Duration::from_secs(args.lookup_timeout_secs),
    )?);

    // The writer owns the store from here on; all mutations go through it.
    let writer = spawn_writer(store)?;

    let dispatcher = Dispatcher::new(
        source,
        writer.clone(),
        tasks,
        RunConfig {
            batch_size: args.batch_size,
            concurrency: args.concurrency,
        },
    );

    tokio::select! {
        result = dispatcher.run() => {
            let summary = result.context("Pipeline run failed")?;
            info!(
                "All tasks completed ({} derived, {} failed lookups)",
                summary.derived, summary.failed
            );
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, flushing queued writes and shutting down...");
            // In-flight batches are abandoned; queued writes still land
            // before the store closes.
            writer.close().await.context("Failed to close writer")?;
        }
    }

    Ok(())
}
