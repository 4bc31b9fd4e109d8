//! Batch dispatcher
//!
//! Owns the pending task queue and the worker pool. Splits the startup
//! snapshot of pending addresses into fixed-size batches, keeps up to the
//! configured number of batch workers in flight, and routes every worker
//! outcome to the serialized writer. The queue and the per-batch states
//! are private to this actor; other components only see messages.
//!
//! A worker that terminates abnormally does not stop the run and its
//! batch is not re-queued: the batch's unreported addresses keep their
//! prior store state and surface again in the next run's snapshot.

use crate::config::{DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY};
use crate::lookup::KeySource;
use crate::records::DerivationResult;
use crate::worker;
use crate::writer::WriterHandle;
use anyhow::Result;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Size of the streamed-failure channel.
const FAILURE_CHANNEL_SIZE: usize = 64;

/// Tuning knobs for one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    /// Maximum number of addresses per batch.
    pub batch_size: usize,
    /// Maximum number of batches in flight.
    pub concurrency: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Lifecycle of one batch, transitioned on worker events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    /// Queued, waiting for a free worker slot
    Assigned,
    /// Handed to a worker task
    Running,
    /// Worker reported its results
    Completed,
    /// Worker terminated abnormally
    Crashed,
}

/// Counters reported when a run finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Addresses with a derivation committed to the store
    pub derived: usize,
    /// Addresses whose failure counter was incremented
    pub failed: usize,
    /// Batches lost to abnormal worker termination
    pub crashed_batches: usize,
}

/// Coordinates batch workers against the writer.
pub struct Dispatcher<S: KeySource> {
    source: Arc<S>,
    writer: WriterHandle,
    pending: VecDeque<(u64, Vec<String>)>,
    states: HashMap<u64, BatchState>,
    task_batches: HashMap<tokio::task::Id, u64>,
    workers: JoinSet<(u64, Vec<DerivationResult>)>,
    config: RunConfig,
    summary: RunSummary,
}

impl<S: KeySource> Dispatcher<S> {
    /// Create a dispatcher over a startup snapshot of pending addresses.
    pub fn new(
        source: Arc<S>,
        writer: WriterHandle,
        tasks: Vec<String>,
        config: RunConfig,
    ) -> Self {
        let mut pending = VecDeque::new();
        let mut states = HashMap::new();
        for (i, chunk) in tasks.chunks(config.batch_size.max(1)).enumerate() {
            pending.push_back((i as u64, chunk.to_vec()));
            states.insert(i as u64, BatchState::Assigned);
        }

        Self {
            source,
            writer,
            pending,
            states,
            task_batches: HashMap::new(),
            workers: JoinSet::new(),
            config,
            summary: RunSummary::default(),
        }
    }

    /// Drain the queue, then flush and close the writer.
    ///
    /// Returns once every batch has resolved (completed or crashed), every
    /// streamed failure has been recorded, and the writer has acknowledged
    /// closing the store.
    pub async fn run(mut self) -> Result<RunSummary> {
        let total: usize = self.pending.iter().map(|(_, batch)| batch.len()).sum();
        if total == 0 {
            info!("No pending addresses to process");
            self.writer.close().await?;
            return Ok(self.summary);
        }

        info!(
            "Distributing {} tasks across {} batches (concurrency limit {})",
            total,
            self.pending.len(),
            self.config.concurrency
        );

        let (failure_tx, mut failure_rx) = mpsc::channel::<String>(FAILURE_CHANNEL_SIZE);

        self.fill_pool(&failure_tx);
        while !(self.workers.is_empty() && self.pending.is_empty()) {
            tokio::select! {
                Some(address) = failure_rx.recv() => {
                    self.record_failure(address).await;
                }
                Some(joined) = self.workers.join_next() => {
                    match joined {
                        Ok((batch_id, derived)) => {
                            self.complete_batch(batch_id, derived).await;
                        }
                        Err(e) => {
                            let batch_id = self.task_batches.get(&e.id()).copied();
                            if let Some(id) = batch_id {
                                self.states.insert(id, BatchState::Crashed);
                            }
                            self.summary.crashed_batches += 1;
                            error!(
                                "Worker for batch {:?} terminated abnormally: {}",
                                batch_id, e
                            );
                        }
                    }
                    self.fill_pool(&failure_tx);
                }
            }
        }

        // Workers are gone; drain failures that were still in flight so the
        // writer sees them before the close request.
        drop(failure_tx);
        while let Some(address) = failure_rx.recv().await {
            self.record_failure(address).await;
        }

        let completed = self
            .states
            .values()
            .filter(|s| **s == BatchState::Completed)
            .count();
        debug!(
            "Batch states at shutdown: {} completed, {} crashed",
            completed, self.summary.crashed_batches
        );
        info!(
            "All batches resolved: {} derived, {} failed lookups, {} crashed batches",
            self.summary.derived, self.summary.failed, self.summary.crashed_batches
        );

        self.writer.close().await?;
        Ok(self.summary)
    }

    /// Launch queued batches until the pool is saturated or the queue is
    /// empty. Called at start and after every worker exit, so a finished
    /// worker is replaced immediately.
    fn fill_pool(&mut self, failure_tx: &mpsc::Sender<String>) {
        while self.workers.len() < self.config.concurrency.max(1) {
            let Some((batch_id, batch)) = self.pending.pop_front() else {
                break;
            };
            info!("Starting batch {} ({} addresses)", batch_id, batch.len());
            let handle = self.workers.spawn(worker::process_batch(
                batch_id,
                batch,
                Arc::clone(&self.source),
                failure_tx.clone(),
            ));
            self.task_batches.insert(handle.id(), batch_id);
            self.states.insert(batch_id, BatchState::Running);
        }
    }

    /// Route a finished batch's results to the writer.
    async fn complete_batch(&mut self, batch_id: u64, derived: Vec<DerivationResult>) {
        self.states.insert(batch_id, BatchState::Completed);

        let count = derived.len();
        if count == 0 {
            info!("Completed batch {} (no keys found)", batch_id);
            return;
        }

        match self.writer.upsert_derived(derived).await {
            Ok(()) => {
                self.summary.derived += count;
                info!(
                    "Completed batch {} ({} derived, {} total so far)",
                    batch_id, count, self.summary.derived
                );
            }
            // Rejected writes are not retried within a run; the rows stay
            // pending and the next run picks them up.
            Err(e) => error!("Store rejected batch {}: {:#}", batch_id, e),
        }
    }

    /// Record one streamed lookup failure.
    async fn record_failure(&mut self, address: String) {
        info!("Failed to fetch pubkey for {}, marked as failed", address);
        match self.writer.increment_failure(address).await {
            Ok(()) => self.summary.failed += 1,
            Err(e) => error!("Failed to record lookup failure: {:#}", e),
        }
    }
}
