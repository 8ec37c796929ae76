//! Storage module: abstraction over persistent key-value backends.
//!
//! Engines: SQLite (on-disk, shared between processes) and an in-memory map.
//! Use `storage::open(path, Engine)` to create an Arc<dyn KvStore> to pass to the ledgers.

pub mod traits;
pub mod sqlite_store;
pub mod mem_store;

pub use traits::{KvStore, WriteBatch, KvIter, Mutator};
pub use sqlite_store::SqliteKvStore;
pub use mem_store::MemKvStore;

use std::sync::Arc;
use anyhow::Result;
use std::path::Path;

/// Engine selection enum
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageEngine {
    Sqlite,
    Memory,
}

/// Open a KvStore from path using the chosen engine (the path is ignored for `Memory`)
pub fn open(path: impl AsRef<Path>, engine: StorageEngine) -> Result<Arc<dyn KvStore>> {
    match engine {
        StorageEngine::Sqlite => {
            let s = SqliteKvStore::open(path)?;
            Ok(Arc::new(s))
        }
        StorageEngine::Memory => Ok(Arc::new(MemKvStore::new())),
    }
}
