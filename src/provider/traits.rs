//! Provider trait: the contract data sources implement
//!
//! A provider reads one external source (source files, traces, debug info)
//! and writes facts through the graph it is handed. It declares its options
//! through an `OptionSchema`, checked by the scheduler before it runs.

use super::options::{OptionError, OptionSchema, ProviderOptions};
use crate::graph::{BehaviorGraph, GraphError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors a provider can fail with. Any of them aborts the run.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Options(#[from] OptionError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    Failed(String),
}

/// A data source that contributes facts to the behavior graph.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Options this provider accepts. Defaults to accepting anything.
    fn option_schema(&self) -> OptionSchema {
        OptionSchema::any()
    }

    /// Read the source and write its facts into `graph`.
    ///
    /// Malformed records are the provider's to skip; an `Err` aborts the
    /// whole run.
    async fn provide(
        &self,
        graph: &mut BehaviorGraph,
        options: &ProviderOptions,
    ) -> Result<(), ProviderError>;
}

/// Provider backed by a synchronous closure
pub struct FnProvider<F> {
    behavior: F,
    schema: OptionSchema,
}

impl<F> FnProvider<F>
where
    F: Fn(&mut BehaviorGraph, &ProviderOptions) -> Result<(), ProviderError> + Send + Sync,
{
    pub fn new(behavior: F) -> Self {
        Self {
            behavior,
            schema: OptionSchema::any(),
        }
    }

    pub fn with_schema(mut self, schema: OptionSchema) -> Self {
        self.schema = schema;
        self
    }
}

#[async_trait]
impl<F> Provider for FnProvider<F>
where
    F: Fn(&mut BehaviorGraph, &ProviderOptions) -> Result<(), ProviderError> + Send + Sync,
{
    fn option_schema(&self) -> OptionSchema {
        self.schema.clone()
    }

    async fn provide(
        &self,
        graph: &mut BehaviorGraph,
        options: &ProviderOptions,
    ) -> Result<(), ProviderError> {
        (self.behavior)(graph, options)
    }
}

/// Wrap a closure as a shareable provider
pub fn provider_fn<F>(behavior: F) -> Arc<dyn Provider>
where
    F: Fn(&mut BehaviorGraph, &ProviderOptions) -> Result<(), ProviderError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnProvider::new(behavior))
}
