use crate::storage::traits::{BatchOp, KvIter, KvStore, Mutator, WriteBatch};
use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// In-memory store (good for tests/dev). Atomic within one process only.
pub struct MemKvStore {
    inner: Mutex<Option<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl Default for MemKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemKvStore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Some(BTreeMap::new())) }
    }

    fn with_map<T>(&self, f: impl FnOnce(&mut BTreeMap<Vec<u8>, Vec<u8>>) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.lock();
        let map = guard.as_mut().ok_or_else(|| anyhow!("memory store is closed"))?;
        f(map)
    }
}

impl KvStore for MemKvStore {
    fn name(&self) -> String { "memory".into() }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.with_map(|m| {
            m.insert(key.to_vec(), value.to_vec());
            Ok(())
        })
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_map(|m| Ok(m.get(key).cloned()))
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.with_map(|m| {
            m.remove(key);
            Ok(())
        })
    }

    fn update(&self, key: &[u8], mutator: &mut Mutator<'_>) -> Result<Option<Vec<u8>>> {
        self.with_map(|m| {
            let next = mutator(m.get(key).map(|v| v.as_slice()))?;
            match &next {
                Some(v) => { m.insert(key.to_vec(), v.clone()); }
                None => { m.remove(key); }
            }
            Ok(next)
        })
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        self.with_map(|m| {
            for op in batch.ops {
                match op {
                    BatchOp::Put(k, v) => { m.insert(k, v); }
                    BatchOp::Delete(k) => { m.remove(&k); }
                }
            }
            Ok(())
        })
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<KvIter> {
        self.with_map(|m| {
            let items = m
                .range(prefix.to_vec()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Ok(KvIter { items })
        })
    }

    fn path(&self) -> Option<PathBuf> {
        None
    }

    fn close(&self) -> Result<()> {
        self.inner.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_inserts_and_deletes() {
        let store = MemKvStore::new();
        store.update(b"n", &mut |cur| {
            assert!(cur.is_none());
            Ok(Some(b"1".to_vec()))
        }).unwrap();
        assert_eq!(store.get(b"n").unwrap(), Some(b"1".to_vec()));

        store.update(b"n", &mut |_| Ok(None)).unwrap();
        assert!(store.get(b"n").unwrap().is_none());
    }

    #[test]
    fn test_prefix_scan_stops_at_boundary() {
        let store = MemKvStore::new();
        store.put(b"ten.local/a", b"1").unwrap();
        store.put(b"ten.local/b", b"2").unwrap();
        store.put(b"ten.sim/a", b"3").unwrap();
        assert_eq!(store.scan_prefix(b"ten.local/").unwrap().items.len(), 2);
    }
}
