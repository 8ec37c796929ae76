//! Funds ledger: last known balance and adequacy per `(network, address)`.
//!
//! Balances here are bookkeeping, not truth; the chain is always re-read
//! before moving money.

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::persistence::{decode, encode};
use crate::storage::KvStore;
use crate::utils::serde_helpers::{as_decimal, from_decimal};
use crate::utils::{display_eth, HarnessError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsEntry {
    #[serde(serialize_with = "as_decimal", deserialize_with = "from_decimal")]
    pub balance: U256,
    /// Whether the balance met the funding threshold when recorded.
    pub adequate: bool,
    pub updated_at: DateTime<Utc>,
}

pub struct FundsLedger {
    store: Arc<dyn KvStore>,
}

fn key(network: &str, address: Address) -> String {
    format!("{network}/{address:#x}")
}

impl FundsLedger {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Store a fresh observation and return the one it replaced.
    pub fn record(
        &self,
        network: &str,
        address: Address,
        balance: U256,
        adequate: bool,
    ) -> Result<Option<FundsEntry>> {
        let entry = FundsEntry { balance, adequate, updated_at: Utc::now() };
        let encoded = encode(&entry).map_err(HarnessError::ledger)?;
        let mut previous: Option<FundsEntry> = None;
        self.store
            .update(key(network, address).as_bytes(), &mut |current: Option<&[u8]>| {
                previous = current.map(decode::<FundsEntry>).transpose()?;
                Ok(Some(encoded.clone()))
            })
            .map_err(HarnessError::ledger)?;

        if let Some(prev) = &previous {
            if prev.balance > balance {
                let lost = prev.balance - balance;
                info!(
                    network,
                    %address,
                    "balance dropped by {} wei ({} ETH) since {}",
                    lost,
                    display_eth(lost),
                    prev.updated_at
                );
            }
        }
        Ok(previous)
    }

    pub fn get(&self, network: &str, address: Address) -> Result<Option<FundsEntry>> {
        let raw = self.store.get(key(network, address).as_bytes()).map_err(HarnessError::ledger)?;
        raw.map(|bytes| decode::<FundsEntry>(&bytes)).transpose().map_err(HarnessError::ledger)
    }

    /// `(network, address, entry)` for every key starting with `prefix`.
    pub fn entries(&self, prefix: &str) -> Result<Vec<(String, Address, FundsEntry)>> {
        let mut out = Vec::new();
        for (k, v) in self.store.scan_prefix(prefix.as_bytes()).map_err(HarnessError::ledger)? {
            let k = String::from_utf8_lossy(&k).into_owned();
            let Some((network, address)) = k.rsplit_once('/') else { continue };
            let Ok(address) = address.parse::<Address>() else { continue };
            let entry = decode::<FundsEntry>(&v).map_err(HarnessError::ledger)?;
            out.push((network.to_string(), address, entry));
        }
        Ok(out)
    }

    pub fn close(&self) -> Result<()> {
        self.store.close().map_err(HarnessError::ledger)
    }
}
