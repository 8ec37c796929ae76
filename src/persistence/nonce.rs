//! Nonce ledger: `(network, address) -> next unused nonce`.
//!
//! The value moves forward through `next_nonce`, a single atomic
//! read-modify-write on the store, and only moves back through `release`
//! when a submission was rejected before any later allocation. Two processes
//! asking for the same key get consecutive nonces no matter how their calls
//! interleave.

use alloy::primitives::Address;
use std::sync::Arc;
use tracing::{debug, info};

use crate::persistence::{decode, encode};
use crate::storage::{KvStore, WriteBatch};
use crate::utils::{HarnessError, Result};

/// One row of the nonce ledger, as listed by `entries`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceEntry {
    pub network: String,
    pub address: Address,
    pub next: u64,
}

pub struct NonceLedger {
    store: Arc<dyn KvStore>,
}

fn key(network: &str, address: Address) -> String {
    format!("{network}/{address:#x}")
}

impl NonceLedger {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Next nonce the ledger would hand out, if it has seen the key.
    pub fn current(&self, network: &str, address: Address) -> Result<Option<u64>> {
        let raw = self.store.get(key(network, address).as_bytes()).map_err(HarnessError::ledger)?;
        raw.map(|bytes| decode::<u64>(&bytes)).transpose().map_err(HarnessError::ledger)
    }

    /// Return the nonce to use and advance the stored value by one.
    ///
    /// `seed` (normally the live transaction count) is used only when the key
    /// has no entry yet.
    pub fn next_nonce(&self, network: &str, address: Address, seed: u64) -> Result<u64> {
        let mut handed_out = seed;
        self.store
            .update(key(network, address).as_bytes(), &mut |current: Option<&[u8]>| {
                let next = match current {
                    Some(bytes) => decode::<u64>(bytes)?,
                    None => seed,
                };
                handed_out = next;
                Ok(Some(encode(&(next + 1))?))
            })
            .map_err(HarnessError::ledger)?;
        debug!(network, %address, nonce = handed_out, "nonce allocated");
        Ok(handed_out)
    }

    /// Hand `nonce` back after its transaction never reached the chain.
    ///
    /// Only rewinds when `nonce` is still the latest allocation for the key;
    /// once another caller has allocated past it the entry is left alone and
    /// `false` is returned.
    pub fn release(&self, network: &str, address: Address, nonce: u64) -> Result<bool> {
        let mut released = false;
        self.store
            .update(key(network, address).as_bytes(), &mut |current: Option<&[u8]>| {
                let Some(bytes) = current else { return Ok(None) };
                let next = decode::<u64>(bytes)?;
                if next == nonce + 1 {
                    released = true;
                    Ok(Some(encode(&nonce)?))
                } else {
                    Ok(Some(bytes.to_vec()))
                }
            })
            .map_err(HarnessError::ledger)?;
        debug!(network, %address, nonce, released, "nonce release");
        Ok(released)
    }

    /// Forget nonces for a network, or one address on it. Used after a chain reset.
    pub fn reset(&self, network: &str, address: Option<Address>) -> Result<usize> {
        let keys: Vec<Vec<u8>> = match address {
            Some(address) => {
                let k = key(network, address).into_bytes();
                if self.store.exists(&k).map_err(HarnessError::ledger)? { vec![k] } else { vec![] }
            }
            None => self
                .store
                .scan_prefix(format!("{network}/").as_bytes())
                .map_err(HarnessError::ledger)?
                .into_iter()
                .map(|(k, _)| k)
                .collect(),
        };

        let mut batch = WriteBatch::new();
        for k in &keys {
            batch.delete(k.clone());
        }
        if !batch.is_empty() {
            self.store.write_batch(batch).map_err(HarnessError::ledger)?;
        }
        info!(network, removed = keys.len(), "nonce ledger reset");
        Ok(keys.len())
    }

    /// Entries whose network key starts with `prefix` (empty for all).
    pub fn entries(&self, prefix: &str) -> Result<Vec<NonceEntry>> {
        let mut out = Vec::new();
        for (k, v) in self.store.scan_prefix(prefix.as_bytes()).map_err(HarnessError::ledger)? {
            let k = String::from_utf8_lossy(&k).into_owned();
            let Some((network, address)) = k.rsplit_once('/') else { continue };
            let Ok(address) = address.parse::<Address>() else { continue };
            let next = decode::<u64>(&v).map_err(HarnessError::ledger)?;
            out.push(NonceEntry { network: network.to_string(), address, next });
        }
        Ok(out)
    }

    pub fn close(&self) -> Result<()> {
        self.store.close().map_err(HarnessError::ledger)
    }
}
