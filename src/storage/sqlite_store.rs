//! SQLite-backed `KvStore`, the engine used for the on-disk ledgers.
//!
//! Every test process opens its own connection to the same file. Writes run
//! inside `BEGIN IMMEDIATE` transactions so the read-modify-write in `update`
//! holds the database write lock from the read onwards; concurrent writers
//! wait on the busy timeout instead of failing. WAL journaling keeps a crash
//! from leaving a partially written value behind.

use crate::storage::traits::{BatchOp, KvIter, KvStore, Mutator, WriteBatch};
use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a writer waits for another process to release the lock.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SqliteKvStore {
    conn: Mutex<Option<Connection>>,
    path: PathBuf,
}

impl SqliteKvStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating ledger directory {}", parent.display()))?;
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("opening ledger {}", path.display()))?;
        conn.busy_timeout(busy_timeout)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (key BLOB PRIMARY KEY NOT NULL, value BLOB NOT NULL)",
            [],
        )?;
        Ok(Self { conn: Mutex::new(Some(conn)), path })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| anyhow!("ledger {} is closed", self.path.display()))?;
        f(conn)
    }
}

fn read(conn: &Connection, key: &[u8]) -> Result<Option<Vec<u8>>> {
    let value = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

fn write(conn: &Connection, key: &[u8], value: &[u8]) -> Result<()> {
    conn.execute(
        "INSERT INTO kv (key, value) VALUES (?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn remove(conn: &Connection, key: &[u8]) -> Result<()> {
    conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
    Ok(())
}

impl KvStore for SqliteKvStore {
    fn name(&self) -> String { "sqlite".into() }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.with_conn(|conn| write(conn, key, value))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn| read(conn, key))
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.with_conn(|conn| remove(conn, key))
    }

    fn update(&self, key: &[u8], mutator: &mut Mutator<'_>) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current = read(&tx, key)?;
            let next = mutator(current.as_deref())?;
            match &next {
                Some(value) => write(&tx, key, value)?,
                None => remove(&tx, key)?,
            }
            tx.commit()?;
            Ok(next)
        })
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            for op in &batch.ops {
                match op {
                    BatchOp::Put(k, v) => write(&tx, k, v)?,
                    BatchOp::Delete(k) => remove(&tx, k)?,
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<KvIter> {
        self.with_conn(|conn| {
            // BLOB keys sort bytewise, so prefixed keys form one contiguous run.
            let mut stmt = conn.prepare("SELECT key, value FROM kv WHERE key >= ?1 ORDER BY key")?;
            let rows = stmt.query_map(params![prefix], |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?;
            let mut items = Vec::new();
            for row in rows {
                let (k, v) = row?;
                if !k.starts_with(prefix) {
                    break;
                }
                items.push((k, v));
            }
            Ok(KvIter { items })
        })
    }

    fn path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }

    fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().take() {
            conn.close().map_err(|(_, e)| anyhow!(e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");
        {
            let store = SqliteKvStore::open(&path).unwrap();
            store.put(b"alpha", b"1").unwrap();
            store.close().unwrap();
        }
        let store = SqliteKvStore::open(&path).unwrap();
        assert_eq!(store.get(b"alpha").unwrap(), Some(b"1".to_vec()));
        assert!(!store.exists(b"beta").unwrap());
    }

    #[test]
    fn test_update_aborts_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteKvStore::open(dir.path().join("kv.db")).unwrap();
        store.put(b"k", b"old").unwrap();
        let res = store.update(b"k", &mut |_| Err(anyhow!("boom")));
        assert!(res.is_err());
        assert_eq!(store.get(b"k").unwrap(), Some(b"old".to_vec()));
    }

    #[test]
    fn test_closed_store_rejects_calls() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteKvStore::open(dir.path().join("kv.db")).unwrap();
        store.close().unwrap();
        store.close().unwrap();
        assert!(store.get(b"k").is_err());
    }

    #[test]
    fn test_batch_and_prefix_scan() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteKvStore::open(dir.path().join("kv.db")).unwrap();
        let mut batch = WriteBatch::new();
        batch.put(b"a/1".to_vec(), b"x".to_vec());
        batch.put(b"a/2".to_vec(), b"y".to_vec());
        batch.put(b"b/1".to_vec(), b"z".to_vec());
        store.write_batch(batch).unwrap();

        let items = store.scan_prefix(b"a/").unwrap().items;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, b"a/1".to_vec());
    }

    #[test]
    fn test_prefix_scan_stops_at_neighbouring_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteKvStore::open(dir.path().join("kv.db")).unwrap();
        let mut batch = WriteBatch::new();
        for k in ["a", "a.", "a/", "a/1", "a/9/x", "a0", "a0/1", "b/1"] {
            batch.put(k.as_bytes().to_vec(), k.as_bytes().to_vec());
        }
        store.write_batch(batch).unwrap();

        let keys: Vec<Vec<u8>> = store.scan_prefix(b"a/").unwrap().items.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a/".to_vec(), b"a/1".to_vec(), b"a/9/x".to_vec()]);
        assert_eq!(store.scan_prefix(b"").unwrap().items.len(), 8);
        assert!(store.scan_prefix(b"c").unwrap().items.is_empty());
    }
}
