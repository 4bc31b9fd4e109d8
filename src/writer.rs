//! Serialized store writer
//!
//! All mutations of the wallet store flow through one dedicated thread
//! that drains a single channel in arrival order. Write serialization is
//! a property of the construction, not of a lock: after `spawn_writer`
//! the store is owned by the writer thread and nothing else can touch it.
//!
//! `Close` is the last request the writer processes; its acknowledgement
//! confirms every earlier write has been applied and the database handle
//! has been released.

use crate::records::DerivationResult;
use crate::store::{SqliteWalletStore, WalletStore};
use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// Size of the write request channel.
const WRITE_CHANNEL_SIZE: usize = 256;

/// A mutation request sent to the writer thread.
enum WriteRequest {
    /// Apply a batch of derivation results as one transaction.
    UpsertDerived {
        results: Vec<DerivationResult>,
        resp: oneshot::Sender<Result<(), String>>,
    },
    /// Increment the failure counter for one address.
    IncrementFailure {
        address: String,
        resp: oneshot::Sender<Result<(), String>>,
    },
    /// Flush and close the store. Always the final request.
    Close {
        resp: oneshot::Sender<Result<(), String>>,
    },
}

/// Async handle for submitting write requests.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<WriteRequest>,
}

impl WriterHandle {
    /// Upsert a batch of derivation results.
    ///
    /// Resolves once the writer has committed (or rejected) the batch.
    pub async fn upsert_derived(&self, results: Vec<DerivationResult>) -> Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(WriteRequest::UpsertDerived {
                results,
                resp: resp_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("Writer has shut down"))?;
        resp_rx
            .await
            .context("Writer dropped upsert response")?
            .map_err(|e| anyhow::anyhow!(e))
    }

    /// Increment the failure counter for one address.
    pub async fn increment_failure(&self, address: String) -> Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(WriteRequest::IncrementFailure {
                address,
                resp: resp_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("Writer has shut down"))?;
        resp_rx
            .await
            .context("Writer dropped increment response")?
            .map_err(|e| anyhow::anyhow!(e))
    }

    /// Flush pending writes and close the store.
    ///
    /// Returns once the writer confirms the database is closed. Calling
    /// this on an already-closed writer is a no-op.
    pub async fn close(&self) -> Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        if self
            .tx
            .send(WriteRequest::Close { resp: resp_tx })
            .await
            .is_err()
        {
            debug!("Writer already closed");
            return Ok(());
        }
        match resp_rx.await {
            Ok(outcome) => outcome.map_err(|e| anyhow::anyhow!(e)),
            // The writer exited before seeing this request, which means an
            // earlier Close already ran.
            Err(_) => {
                debug!("Writer already closed");
                Ok(())
            }
        }
    }
}

/// Spawn the writer thread, transferring store ownership to it.
pub fn spawn_writer(store: SqliteWalletStore) -> Result<WriterHandle> {
    let (tx, rx) = mpsc::channel(WRITE_CHANNEL_SIZE);

    std::thread::Builder::new()
        .name("wallet-db-writer".to_string())
        .spawn(move || run_writer(store, rx))
        .context("Failed to spawn writer thread")?;

    Ok(WriterHandle { tx })
}

/// Drain write requests strictly one at a time, in arrival order.
fn run_writer(mut store: SqliteWalletStore, mut rx: mpsc::Receiver<WriteRequest>) {
    while let Some(request) = rx.blocking_recv() {
        match request {
            WriteRequest::UpsertDerived { results, resp } => {
                let count = results.len();
                let outcome = store
                    .upsert_derived(&results)
                    .map_err(|e| format!("{:#}", e));
                if let Err(ref e) = outcome {
                    error!("Store rejected upsert batch of {}: {}", count, e);
                }
                let _ = resp.send(outcome);
            }
            WriteRequest::IncrementFailure { address, resp } => {
                let outcome = store
                    .increment_failure(&address)
                    .map_err(|e| format!("{:#}", e));
                if let Err(ref e) = outcome {
                    error!("Store rejected failure increment for {}: {}", address, e);
                }
                let _ = resp.send(outcome);
            }
            WriteRequest::Close { resp } => {
                info!("Writer closing database");
                let outcome = store.close().map_err(|e| format!("{:#}", e));
                let _ = resp.send(outcome);
                return;
            }
        }
    }

    // Every handle was dropped without an explicit Close; release the
    // store anyway so the database file is left consistent.
    if let Err(e) = store.close() {
        error!("Failed to close database after channel drop: {:#}", e);
    }
}
