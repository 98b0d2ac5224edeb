//! Write-mode routing between fact producers and the store

use super::reservoir::Reservoir;
use super::stream::{fact_channel, FactSender, StreamSummary};
use crate::config::{IngestConfig, DEFAULT_STREAM_BATCH};
use crate::graph::Fact;
use crate::storage::{FactStore, StorageError};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("fact producer failed: {0}")]
    Producer(Box<dyn std::error::Error + Send + Sync>),

    #[error("fact producer panicked: {0}")]
    ProducerPanicked(String),
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Counters describing what the pipeline has written so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Single-fact writes
    pub direct_writes: usize,
    /// Flushes triggered by the auto-bulk threshold
    pub auto_flushes: usize,
    /// Size of every batched write, in order
    pub batch_sizes: Vec<usize>,
    /// Facts written to the store by any route
    pub facts_committed: usize,
}

/// Routes facts to the store through the active write mode.
///
/// - direct (default): every `add_fact` is its own write
/// - auto-bulk: `add_fact` buffers and flushes once the buffer holds
///   `auto_bulk` facts
/// - reservoir: every fact, bulk or single, is offered to a fixed-size
///   uniform sample that is written out when the mode is switched off
///
/// Auto-bulk and reservoir exclude each other; enabling one flushes and
/// disables the other. The pipeline is driven through `&mut self`, so at
/// most one batch is in flight at a time.
pub struct IngestPipeline {
    store: Arc<dyn FactStore>,
    auto_bulk: usize,
    bulk_buf: Vec<Fact>,
    reservoir: Option<Reservoir>,
    stream_base: usize,
    stats: IngestStats,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn FactStore>) -> Self {
        Self {
            store,
            auto_bulk: 0,
            bulk_buf: Vec::new(),
            reservoir: None,
            stream_base: DEFAULT_STREAM_BATCH,
            stats: IngestStats::default(),
        }
    }

    /// Apply the write modes and stream batch size from configuration
    pub fn configure(&mut self, config: &IngestConfig) -> IngestResult<()> {
        self.set_stream_base(config.stream_base_batch);
        if config.reservoir > 0 {
            self.set_reservoir(config.reservoir)?;
        } else if config.auto_bulk > 0 {
            self.set_auto_bulk(config.auto_bulk)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Facts buffered by auto-bulk and not yet written
    pub fn pending(&self) -> usize {
        self.bulk_buf.len()
    }

    pub fn auto_bulk(&self) -> usize {
        self.auto_bulk
    }

    pub fn reservoir(&self) -> Option<&Reservoir> {
        self.reservoir.as_ref()
    }

    pub fn set_stream_base(&mut self, base: usize) {
        self.stream_base = base.max(1);
    }

    /// Enable auto-bulk with threshold `count`, or disable it with 0.
    ///
    /// Disabling flushes whatever is still buffered. Enabling ends reservoir
    /// mode, writing out its sample first.
    pub fn set_auto_bulk(&mut self, count: usize) -> IngestResult<()> {
        if count > 0 {
            self.end_reservoir()?;
            self.auto_bulk = count;
            debug!(threshold = count, "auto-bulk enabled");
        } else {
            self.auto_bulk = 0;
            self.flush_bulk()?;
            debug!("auto-bulk disabled");
        }
        Ok(())
    }

    /// Enable reservoir sampling with capacity `count`, or disable it with 0.
    ///
    /// Disabling writes the current sample as one batch. Enabling flushes and
    /// turns off auto-bulk, and replaces any reservoir already active.
    pub fn set_reservoir(&mut self, count: usize) -> IngestResult<()> {
        self.end_reservoir()?;
        if count > 0 {
            self.auto_bulk = 0;
            self.flush_bulk()?;
            self.reservoir = Some(Reservoir::new(count));
            debug!(capacity = count, "reservoir enabled");
        }
        Ok(())
    }

    /// Like `set_reservoir`, with a seeded generator for reproducible samples
    pub fn set_reservoir_seeded(&mut self, count: usize, seed: u64) -> IngestResult<()> {
        self.set_reservoir(count)?;
        if count > 0 {
            self.reservoir = Some(Reservoir::with_seed(count, seed));
        }
        Ok(())
    }

    /// Route one fact through the active mode
    pub fn add_fact(&mut self, fact: Fact) -> IngestResult<()> {
        if let Some(reservoir) = self.reservoir.as_mut() {
            reservoir.offer(fact);
        } else if self.auto_bulk > 0 {
            self.bulk_buf.push(fact);
            if self.bulk_buf.len() >= self.auto_bulk {
                self.stats.auto_flushes += 1;
                self.flush_bulk()?;
            }
        } else {
            self.store.insert(&fact)?;
            self.stats.direct_writes += 1;
            self.stats.facts_committed += 1;
        }
        Ok(())
    }

    /// Commit a batch directly, bypassing auto-bulk.
    ///
    /// In reservoir mode the facts are offered to the sample instead.
    pub fn add_facts_bulk(&mut self, facts: Vec<Fact>) -> IngestResult<()> {
        match self.reservoir.as_mut() {
            Some(reservoir) => reservoir.extend(facts),
            None => self.commit_batch(&facts)?,
        }
        Ok(())
    }

    /// Run `producer` as a separate task and batch what it sends.
    ///
    /// The first batch is flushed at the configured base size and every
    /// flush doubles the threshold for the next one. Returns once the
    /// producer has dropped its sender and the remainder is flushed.
    ///
    /// A store error closes the stream and cancels the producer task; the
    /// call returns only after that task has ended.
    pub async fn add_facts_from_stream<F, Fut, E>(
        &mut self,
        producer: F,
    ) -> IngestResult<StreamSummary>
    where
        F: FnOnce(FactSender) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    {
        let (tx, mut rx) = fact_channel();
        let handle = tokio::spawn(producer(tx));

        let mut summary = StreamSummary::default();
        if let Err(e) = self.drain_stream(&mut rx, &mut summary).await {
            // Stop the producer before reporting the store error
            rx.close();
            handle.abort();
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(producer_err)) => {
                    let producer_err: Box<dyn std::error::Error + Send + Sync> = producer_err.into();
                    warn!(error = %producer_err, "fact producer failed after store error");
                }
                Err(join) if join.is_cancelled() => debug!("fact producer cancelled"),
                Err(join) => warn!(error = %join, "fact producer panicked after store error"),
            }
            return Err(e);
        }

        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(IngestError::Producer(e.into())),
            Err(e) => return Err(IngestError::ProducerPanicked(e.to_string())),
        }

        info!(
            facts = summary.facts,
            batches = summary.batches.len(),
            "stream drained"
        );
        Ok(summary)
    }

    /// Batch facts from `rx` with doubling thresholds until the sender is gone
    async fn drain_stream(
        &mut self,
        rx: &mut mpsc::Receiver<Fact>,
        summary: &mut StreamSummary,
    ) -> IngestResult<()> {
        let mut buffer = Vec::new();
        let mut threshold = self.stream_base;

        while let Some(fact) = rx.recv().await {
            buffer.push(fact);
            summary.facts += 1;

            if buffer.len() >= threshold {
                summary.batches.push(buffer.len());
                self.add_facts_bulk(std::mem::take(&mut buffer))?;
                threshold = threshold.saturating_mul(2);
            }
        }

        if !buffer.is_empty() {
            summary.batches.push(buffer.len());
            self.add_facts_bulk(buffer)?;
        }
        Ok(())
    }

    /// Write out everything still held in memory.
    ///
    /// Flushes the auto-bulk buffer and, if reservoir mode is on, writes the
    /// sample and ends reservoir mode.
    pub fn flush(&mut self) -> IngestResult<()> {
        self.flush_bulk()?;
        self.end_reservoir()
    }

    fn flush_bulk(&mut self) -> IngestResult<()> {
        if self.bulk_buf.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.bulk_buf);
        self.commit_batch(&batch)
    }

    fn end_reservoir(&mut self) -> IngestResult<()> {
        if let Some(reservoir) = self.reservoir.take() {
            let seen = reservoir.seen();
            let sample = reservoir.into_sample();
            debug!(kept = sample.len(), seen, "committing reservoir");
            self.commit_batch(&sample)?;
        }
        Ok(())
    }

    fn commit_batch(&mut self, facts: &[Fact]) -> IngestResult<()> {
        if facts.is_empty() {
            return Ok(());
        }
        let written = self.store.insert_batch(facts)?;
        self.stats.batch_sizes.push(written);
        self.stats.facts_committed += written;
        Ok(())
    }
}
