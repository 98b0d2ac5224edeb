//! Storage backends for pbg
//!
//! Fact stores implement the `FactStore` trait: single and batched inserts
//! plus the lookups the traversal engine needs. `SqliteFactStore` persists
//! to a file; `MemoryFactStore` lives for the process.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryFactStore;
pub use sqlite::SqliteFactStore;
pub use traits::{EngineKind, FactStore, OpenStore, StorageError, StorageResult};

use std::path::Path;
use std::sync::Arc;

/// Open (or with `create_new`, initialize) a store of the given kind.
pub fn open_store(
    kind: EngineKind,
    path: impl AsRef<Path>,
    create_new: bool,
) -> StorageResult<Arc<dyn FactStore>> {
    let store: Arc<dyn FactStore> = match kind {
        EngineKind::Sqlite if create_new => Arc::new(SqliteFactStore::create(path)?),
        EngineKind::Sqlite => Arc::new(SqliteFactStore::open(path)?),
        EngineKind::Memory => Arc::new(MemoryFactStore::new()),
    };
    Ok(store)
}
