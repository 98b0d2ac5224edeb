//! pbg: Program Behavior Graph
//!
//! Builds a fact graph describing a program's static and dynamic behavior.
//! Independent data sources ("providers") run in dependency order and write
//! subject–predicate–object facts into a shared store, through an ingestion
//! pipeline that keeps memory bounded for large or unbounded producers.
//!
//! # Core Concepts
//!
//! - **Facts**: `(subject, predicate, object)` string triples; duplicates
//!   are kept as parallel edges
//! - **Providers**: named data sources with declared dependencies, ordered
//!   and run by the `Scheduler`
//! - **BehaviorGraph**: one store plus its ingestion pipeline; the write API
//!   for providers and the query API for everything downstream
//!
//! # Example
//!
//! ```
//! use pbg::{BehaviorGraph, MemoryFactStore};
//! use std::sync::Arc;
//!
//! let mut graph = BehaviorGraph::with_store(Arc::new(MemoryFactStore::new()));
//! graph.add_fact("main", "calls", "init").unwrap();
//! assert_eq!(graph.query("g.V('main').Out('calls').All()").unwrap(), vec!["init"]);
//! ```

pub mod config;
pub mod export;
mod graph;
pub mod ingest;
pub mod provider;
pub mod query;
pub mod storage;

pub use config::{parse_whitelist, ConfigError, IngestConfig, ProjectConfig};
pub use graph::{BehaviorGraph, Fact, GraphError, GraphResult, Triplet};
pub use ingest::{FactSender, IngestError, IngestStats, StreamSummary};
pub use provider::{
    register_builtin, ExecutionPlan, ExecutionReport, Provider, ProviderError, ProviderOptions,
    ProviderRegistry, Scheduler, SchedulerError,
};
pub use query::{Binding, QueryError, TraversalQuery};
pub use storage::{
    open_store, EngineKind, FactStore, MemoryFactStore, OpenStore, SqliteFactStore, StorageError,
    StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
