use std::collections::BTreeMap;
use std::sync::Arc;

use crate::persistence::{decode, encode};
use crate::storage::KvStore;
use crate::utils::{HarnessError, Result};

/// Increment-only counters keyed by `(environment, test, counter)`.
pub struct CountsLedger {
    store: Arc<dyn KvStore>,
}

fn key(environment: &str, test: &str, counter: &str) -> String {
    format!("{environment}/{test}/{counter}")
}

impl CountsLedger {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Add one and return the new total.
    pub fn increment(&self, environment: &str, test: &str, counter: &str) -> Result<u64> {
        let mut total = 0;
        self.store
            .update(key(environment, test, counter).as_bytes(), &mut |current: Option<&[u8]>| {
                let before = current.map(decode::<u64>).transpose()?.unwrap_or(0);
                total = before + 1;
                Ok(Some(encode(&total)?))
            })
            .map_err(HarnessError::ledger)?;
        Ok(total)
    }

    pub fn get(&self, environment: &str, test: &str, counter: &str) -> Result<u64> {
        let raw = self.store.get(key(environment, test, counter).as_bytes()).map_err(HarnessError::ledger)?;
        Ok(raw.map(|b| decode::<u64>(&b)).transpose().map_err(HarnessError::ledger)?.unwrap_or(0))
    }

    /// Totals under a key prefix (`""`, `"ten.local/"`, `"ten.local/test_x/"` ...).
    pub fn totals(&self, prefix: &str) -> Result<BTreeMap<String, u64>> {
        let mut out = BTreeMap::new();
        for (k, v) in self.store.scan_prefix(prefix.as_bytes()).map_err(HarnessError::ledger)? {
            let value = decode::<u64>(&v).map_err(HarnessError::ledger)?;
            out.insert(String::from_utf8_lossy(&k).into_owned(), value);
        }
        Ok(out)
    }

    pub fn close(&self) -> Result<()> {
        self.store.close().map_err(HarnessError::ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemKvStore;

    #[test]
    fn test_increment_and_totals() {
        let counts = CountsLedger::new(Arc::new(MemKvStore::new()));
        assert_eq!(counts.get("ten.local", "test_a", "passed").unwrap(), 0);
        assert_eq!(counts.increment("ten.local", "test_a", "passed").unwrap(), 1);
        assert_eq!(counts.increment("ten.local", "test_a", "passed").unwrap(), 2);
        counts.increment("ten.local", "test_b", "failed").unwrap();
        counts.increment("sepolia", "test_a", "passed").unwrap();

        let totals = counts.totals("ten.local/").unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals["ten.local/test_a/passed"], 2);
    }
}
