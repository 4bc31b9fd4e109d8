//! CLI implementation for mapctl
//!
//! Provides a developer-friendly command-line interface for inspecting
//! and seeding the wallet association store. All commands output pretty
//! JSON.

use crate::config::{self, DEFAULT_RETRY_CAP};
use crate::store::{SqliteWalletStore, WalletStore};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;

/// Wallet association store CLI tool
#[derive(Parser)]
#[command(name = "mapctl")]
#[command(about = "Inspect and seed the wallet association store")]
pub struct Cli {
    /// Path to the SQLite database file
    #[arg(short, long, default_value = "./wallets.db")]
    db_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the stored record for one wallet address
    Show {
        /// Sei wallet address
        address: String,
    },
    /// List addresses still eligible for processing
    Pending {
        /// Ignore the retry cap and list every underived address
        #[arg(long)]
        ignore_retry_cap: bool,
        /// Maximum number of addresses to print
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Show aggregate row counts
    Stats,
    /// Seed wallet addresses from a file (one per line)
    Import {
        /// Path to the address file
        file: PathBuf,
    },
}

/// Run the CLI command and print JSON output.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut store = SqliteWalletStore::open(&cli.db_path)
        .with_context(|| format!("Failed to open database at {:?}", cli.db_path))?;

    let result = match cli.command {
        Commands::Show { address } => match store.get_record(&address)? {
            Some(record) => json!({
                "address": record.address,
                "public_key": record.public_key,
                "derived_evm_address": record.derived_evm_address,
                "failed_attempts": record.failed_attempts,
            }),
            None => json!({
                "address": address,
                "record": null,
            }),
        },
        Commands::Pending {
            ignore_retry_cap,
            limit,
        } => {
            let cap = if ignore_retry_cap {
                None
            } else {
                Some(DEFAULT_RETRY_CAP)
            };
            let pending = store.load_pending(cap)?;
            json!({
                "pending": pending.len(),
                "addresses": pending.into_iter().take(limit).collect::<Vec<_>>(),
            })
        }
        Commands::Stats => {
            let stats = store.stats(DEFAULT_RETRY_CAP)?;
            json!({
                "total": stats.total,
                "derived": stats.derived,
                "pending": stats.pending,
                "exhausted": stats.exhausted,
            })
        }
        Commands::Import { file } => {
            let addresses = config::load_address_file(&file)?;
            let created = store.insert_addresses(&addresses)?;
            json!({
                "status": "ok",
                "read": addresses.len(),
                "created": created,
            })
        }
    };

    // Pretty print JSON
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
