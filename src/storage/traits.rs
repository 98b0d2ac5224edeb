//! Storage trait definitions

use crate::graph::Fact;
use crate::query::{Binding, QueryError, TraversalQuery};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to initialize store at {path}: {reason}")]
    Initialization { path: String, reason: String },

    #[error("Failed to open store at {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Unsupported store engine: {0}")]
    UnsupportedEngine(String),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Selectable store engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    /// SQLite database file
    #[default]
    Sqlite,
    /// Process-local store; the path is ignored
    Memory,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

impl FromStr for EngineKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(StorageError::UnsupportedEngine(other.to_string())),
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for fact store backends
///
/// Implementations must be thread-safe (Send + Sync); the facade shares the
/// store with the ingestion pipeline. Reads return facts in insertion order.
pub trait FactStore: Send + Sync {
    /// Commit a single fact
    fn insert(&self, fact: &Fact) -> StorageResult<()>;

    /// Commit a batch of facts as one write. Returns the number written.
    fn insert_batch(&self, facts: &[Fact]) -> StorageResult<usize>;

    /// Every distinct subject or object, in first-seen order
    fn nodes(&self) -> StorageResult<Vec<String>>;

    /// Facts whose subject is `node`, optionally restricted to one predicate
    fn outgoing(&self, node: &str, predicate: Option<&str>) -> StorageResult<Vec<Fact>>;

    /// Facts whose object is `node`, optionally restricted to one predicate
    fn incoming(&self, node: &str, predicate: Option<&str>) -> StorageResult<Vec<Fact>>;

    /// Total number of committed facts, duplicates included
    fn fact_count(&self) -> StorageResult<usize>;

    /// Evaluate a traversal expression, returning at most `limit` bindings.
    fn evaluate(&self, expr: &str, limit: usize) -> StorageResult<Vec<Binding>> {
        let query = TraversalQuery::parse(expr)?;
        query.execute(self, limit)
    }
}

/// Extension trait for opening stores from paths
pub trait OpenStore: FactStore + Sized {
    /// Initialize a new store at the given path, creating parent directories
    fn create(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Open a store that already exists at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
