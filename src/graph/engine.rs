//! BehaviorGraph: the composition root for writers and readers

use super::fact::{Fact, Triplet};
use crate::config::{IngestConfig, DEFAULT_QUERY_LIMIT};
use crate::ingest::{FactSender, IngestError, IngestPipeline, IngestStats, StreamSummary};
use crate::provider::ProviderOptions;
use crate::query::Binding;
use crate::storage::{open_store, EngineKind, FactStore, StorageError};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur in graph operations
#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("query result {0} has neither a value nor a vertex")]
    UnboundResult(usize),

    #[error("triplet query must tag '{0}'")]
    MissingTripletTag(&'static str),
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

const TRIPLET_TAGS: [&str; 3] = ["subject", "predicate", "object"];

/// A program behavior graph bound to one store.
///
/// Owns the store connection, the per-provider options, and the ingestion
/// pipeline. Providers write through `add_fact`, `add_facts_bulk`, and
/// `add_facts_from_stream`; downstream tools read with `query` and
/// `query_triplets`. Pending buffered facts are flushed by `close` and, as
/// a last resort, on drop.
pub struct BehaviorGraph {
    store: Arc<dyn FactStore>,
    pipeline: IngestPipeline,
    options: HashMap<String, ProviderOptions>,
    query_limit: usize,
}

impl BehaviorGraph {
    /// Open the store at `path`, initializing it first when `create_new`
    pub fn open(kind: EngineKind, path: impl AsRef<Path>, create_new: bool) -> GraphResult<Self> {
        let path = path.as_ref();
        let store = open_store(kind, path, create_new)?;
        info!(engine = %kind, path = %path.display(), create_new, "opened fact store");
        Ok(Self::with_store(store))
    }

    /// Wrap an already opened store
    pub fn with_store(store: Arc<dyn FactStore>) -> Self {
        Self {
            pipeline: IngestPipeline::new(store.clone()),
            store,
            options: HashMap::new(),
            query_limit: DEFAULT_QUERY_LIMIT,
        }
    }

    /// Apply write modes, stream batch size, and query cap
    pub fn configure(&mut self, config: &IngestConfig) -> GraphResult<()> {
        self.pipeline.configure(config)?;
        self.query_limit = config.query_limit;
        Ok(())
    }

    pub fn store(&self) -> &Arc<dyn FactStore> {
        &self.store
    }

    // === Options ===

    /// Set (or replace) the options a provider receives when it runs
    pub fn set_options(&mut self, provider: impl Into<String>, options: ProviderOptions) {
        self.options.insert(provider.into(), options);
    }

    pub fn options(&self, provider: &str) -> Option<&ProviderOptions> {
        self.options.get(provider)
    }

    // === Write side ===

    pub fn add_fact(
        &mut self,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> GraphResult<()> {
        self.pipeline
            .add_fact(Fact::new(subject, predicate, object))?;
        Ok(())
    }

    /// Commit a batch in one write (into the sample in reservoir mode)
    pub fn add_facts_bulk<I, F>(&mut self, facts: I) -> GraphResult<()>
    where
        I: IntoIterator<Item = F>,
        F: Into<Fact>,
    {
        let facts: Vec<Fact> = facts.into_iter().map(Into::into).collect();
        self.pipeline.add_facts_bulk(facts)?;
        Ok(())
    }

    /// Run `producer` concurrently and ingest its stream in doubling batches
    pub async fn add_facts_from_stream<P, Fut, E>(&mut self, producer: P) -> GraphResult<StreamSummary>
    where
        P: FnOnce(FactSender) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    {
        Ok(self.pipeline.add_facts_from_stream(producer).await?)
    }

    pub fn set_auto_bulk(&mut self, count: usize) -> GraphResult<()> {
        Ok(self.pipeline.set_auto_bulk(count)?)
    }

    pub fn set_reservoir(&mut self, count: usize) -> GraphResult<()> {
        Ok(self.pipeline.set_reservoir(count)?)
    }

    pub fn ingest_stats(&self) -> &IngestStats {
        self.pipeline.stats()
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    /// Write out buffered and sampled facts
    pub fn flush(&mut self) -> GraphResult<()> {
        Ok(self.pipeline.flush()?)
    }

    /// Flush and release the store
    pub fn close(mut self) -> GraphResult<()> {
        self.flush()
    }

    // === Read side ===

    pub fn fact_count(&self) -> GraphResult<usize> {
        Ok(self.store.fact_count()?)
    }

    pub fn query_limit(&self) -> usize {
        self.query_limit
    }

    pub fn set_query_limit(&mut self, limit: usize) {
        self.query_limit = limit;
    }

    /// Raw bindings of a traversal, capped at the query limit
    pub fn query_bindings(&self, expr: &str) -> GraphResult<Vec<Binding>> {
        Ok(self.store.evaluate(expr, self.query_limit)?)
    }

    /// Evaluate a traversal and return one string per result.
    ///
    /// Scalar results (such as `Count()`) yield their value, everything else
    /// the vertex the path ended on. Results past the query limit are
    /// dropped silently.
    pub fn query(&self, expr: &str) -> GraphResult<Vec<String>> {
        self.query_bindings(expr)?
            .into_iter()
            .enumerate()
            .map(|(i, binding)| {
                binding
                    .value
                    .or(binding.node)
                    .ok_or(GraphError::UnboundResult(i))
            })
            .collect()
    }

    /// Evaluate a traversal that tags `subject`, `predicate` and `object`
    pub fn query_triplets(&self, expr: &str) -> GraphResult<Vec<Triplet>> {
        self.query_bindings(expr)?
            .into_iter()
            .map(|binding| {
                let [subject, predicate, object] = TRIPLET_TAGS.map(|tag| {
                    binding
                        .tag(tag)
                        .map(str::to_string)
                        .ok_or(GraphError::MissingTripletTag(tag))
                });
                Ok(Triplet::new(subject?, predicate?, object?))
            })
            .collect()
    }
}

impl Drop for BehaviorGraph {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.flush() {
            warn!(error = %e, "failed to flush pending facts on drop");
        }
    }
}
