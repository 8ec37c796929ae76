//! Contract ledger: `(network, fixture name) -> deployed address`.

use alloy::primitives::{Address, TxHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::persistence::{decode, encode};
use crate::storage::KvStore;
use crate::utils::{HarnessError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEntry {
    pub address: Address,
    pub tx_hash: TxHash,
    pub deployed_at: DateTime<Utc>,
}

pub struct ContractLedger {
    store: Arc<dyn KvStore>,
}

fn key(network: &str, name: &str) -> String {
    format!("{network}/{name}")
}

impl ContractLedger {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Record a deployment, replacing any previous entry under the same name.
    pub fn insert(&self, network: &str, name: &str, address: Address, tx_hash: TxHash) -> Result<ContractEntry> {
        let entry = ContractEntry { address, tx_hash, deployed_at: Utc::now() };
        let bytes = encode(&entry).map_err(HarnessError::ledger)?;
        self.store.put(key(network, name).as_bytes(), &bytes).map_err(HarnessError::ledger)?;
        Ok(entry)
    }

    pub fn get(&self, network: &str, name: &str) -> Result<Option<ContractEntry>> {
        let raw = self.store.get(key(network, name).as_bytes()).map_err(HarnessError::ledger)?;
        raw.map(|bytes| decode::<ContractEntry>(&bytes)).transpose().map_err(HarnessError::ledger)
    }

    /// Drop an entry, typically once its address is found to hold no code.
    pub fn delete(&self, network: &str, name: &str) -> Result<bool> {
        let k = key(network, name);
        let existed = self.store.exists(k.as_bytes()).map_err(HarnessError::ledger)?;
        self.store.delete(k.as_bytes()).map_err(HarnessError::ledger)?;
        Ok(existed)
    }

    /// `(name, entry)` pairs for one network.
    pub fn list(&self, network: &str) -> Result<Vec<(String, ContractEntry)>> {
        let prefix = format!("{network}/");
        let mut out = Vec::new();
        for (k, v) in self.store.scan_prefix(prefix.as_bytes()).map_err(HarnessError::ledger)? {
            let name = String::from_utf8_lossy(&k[prefix.len()..]).into_owned();
            out.push((name, decode::<ContractEntry>(&v).map_err(HarnessError::ledger)?));
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
    fn test_insert_get_delete() {
        let ledger = ContractLedger::new(Arc::new(MemKvStore::new()));
        let addr = Address::repeat_byte(0xaa);
        let hash = TxHash::repeat_byte(0x11);

        ledger.insert("ten.sim/ten-local", "Guesser", addr, hash).unwrap();
        let got = ledger.get("ten.sim/ten-local", "Guesser").unwrap().unwrap();
        assert_eq!((got.address, got.tx_hash), (addr, hash));
        assert!(ledger.get("ten.local/ten-local", "Guesser").unwrap().is_none());

        let names: Vec<_> = ledger.list("ten.sim/ten-local").unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Guesser".to_string()]);

        assert!(ledger.delete("ten.sim/ten-local", "Guesser").unwrap());
        assert!(!ledger.delete("ten.sim/ten-local", "Guesser").unwrap());
    }

    #[test]
    fn test_insert_replaces_stale_entry() {
        let ledger = ContractLedger::new(Arc::new(MemKvStore::new()));
        ledger.insert("n", "Token", Address::repeat_byte(1), TxHash::ZERO).unwrap();
        ledger.insert("n", "Token", Address::repeat_byte(2), TxHash::ZERO).unwrap();
        assert_eq!(ledger.get("n", "Token").unwrap().unwrap().address, Address::repeat_byte(2));
        assert_eq!(ledger.list("n").unwrap().len(), 1);
    }
}
