use anyhow::Result;
use std::path::PathBuf;

/// Simple KV listing returned by `scan_prefix`
#[derive(Debug, Default)]
pub struct KvIter {
    // each item: (key, value), ordered by key
    pub items: Vec<(Vec<u8>, Vec<u8>)>,
}

impl IntoIterator for KvIter {
    type Item = (Vec<u8>, Vec<u8>);
    type IntoIter = std::vec::IntoIter<(Vec<u8>, Vec<u8>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Batched put/delete operations applied in one store transaction.
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub(crate) ops: Vec<BatchOp>,
}

#[derive(Debug)]
pub(crate) enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

impl WriteBatch {
    pub fn new() -> Self { Self::default() }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put(key, value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete(key));
    }

    pub fn len(&self) -> usize { self.ops.len() }

    pub fn is_empty(&self) -> bool { self.ops.is_empty() }
}

/// Read-modify-write callback for `KvStore::update`.
///
/// Receives the current value (if any) and returns the value to store;
/// `None` deletes the key. An error aborts the update without writing.
pub type Mutator<'a> = dyn FnMut(Option<&[u8]>) -> Result<Option<Vec<u8>>> + 'a;

/// Core key-value store trait (synchronous).
///
/// Engines must make `update` and `write_batch` atomic with respect to every
/// other handle on the same store, including handles held by other processes.
pub trait KvStore: Send + Sync + 'static {
    fn name(&self) -> String;

    /// Put a key / value
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Get a key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Delete a key
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Check existence
    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Atomic read-modify-write of a single key. Returns the value written.
    fn update(&self, key: &[u8], mutator: &mut Mutator<'_>) -> Result<Option<Vec<u8>>>;

    /// Apply a write batch atomically
    fn write_batch(&self, batch: WriteBatch) -> Result<()>;

    /// All entries whose key starts with `prefix`.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<KvIter>;

    /// Path where the engine stores data (useful for debugging)
    fn path(&self) -> Option<PathBuf>;

    /// Release the underlying handle. Further calls fail; closing twice is a no-op.
    fn close(&self) -> Result<()>;
}
