//! Hand-off channel for streaming producers

use crate::graph::Fact;
use thiserror::Error;
use tokio::sync::mpsc;

/// The pipeline stopped receiving (it hit a fatal store error).
#[derive(Debug, Error)]
#[error("fact stream closed by the ingestion pipeline")]
pub struct StreamClosed;

/// Write-only end of a fact stream.
///
/// The channel holds a single fact, so a producer can run at most one fact
/// ahead of the pipeline. Dropping the sender ends the stream.
#[derive(Debug, Clone)]
pub struct FactSender {
    tx: mpsc::Sender<Fact>,
}

impl FactSender {
    pub async fn send(&self, fact: impl Into<Fact>) -> Result<(), StreamClosed> {
        self.tx.send(fact.into()).await.map_err(|_| StreamClosed)
    }

    pub async fn emit(
        &self,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Result<(), StreamClosed> {
        self.send(Fact::new(subject, predicate, object)).await
    }

    /// Send from synchronous code (a `spawn_blocking` task or plain thread).
    ///
    /// Must not be called from within an async context.
    pub fn blocking_send(&self, fact: impl Into<Fact>) -> Result<(), StreamClosed> {
        self.tx.blocking_send(fact.into()).map_err(|_| StreamClosed)
    }
}

pub(crate) fn fact_channel() -> (FactSender, mpsc::Receiver<Fact>) {
    let (tx, rx) = mpsc::channel(1);
    (FactSender { tx }, rx)
}

/// What one streaming call handed to the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Facts received from the producer
    pub facts: usize,
    /// Size of each batch, in flush order
    pub batches: Vec<usize>,
}
