//! Durable ledgers shared by every test process.
//!
//! Each ledger is a thin typed layer over its own `KvStore` file in the
//! ledger directory (`~/.tentest` by default). Values are bincode encoded;
//! keys are `/` separated strings so a prefix scan lists one network or
//! environment.

pub mod nonce;
pub mod funds;
pub mod contract;
pub mod counts;
pub mod results;

pub use contract::{ContractEntry, ContractLedger};
pub use counts::CountsLedger;
pub use funds::{FundsEntry, FundsLedger};
pub use nonce::{NonceEntry, NonceLedger};
pub use results::{Outcome, ResultSummary, ResultsEntry, ResultsLedger};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::storage::{self, KvStore, StorageEngine};
use crate::utils::{HarnessError, Result};

pub const NONCE_DB: &str = "nonce.db";
pub const FUNDS_DB: &str = "funds.db";
pub const CONTRACT_DB: &str = "contract.db";
pub const COUNTS_DB: &str = "counts.db";
pub const RESULTS_DB: &str = "results.db";

pub(crate) fn encode<T: Serialize>(value: &T) -> anyhow::Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> anyhow::Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// The five ledgers opened together by one process.
///
/// Handles are released by `close` or, failing that, on drop.
pub struct Ledgers {
    pub nonces: Arc<NonceLedger>,
    pub funds: Arc<FundsLedger>,
    pub contracts: Arc<ContractLedger>,
    pub counts: Arc<CountsLedger>,
    pub results: Arc<ResultsLedger>,
    dir: Option<PathBuf>,
}

impl Ledgers {
    /// Open (creating if needed) the ledger files under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let open = |file: &str| -> Result<Arc<dyn KvStore>> {
            storage::open(dir.join(file), StorageEngine::Sqlite).map_err(HarnessError::ledger)
        };
        let ledgers = Self {
            nonces: Arc::new(NonceLedger::new(open(NONCE_DB)?)),
            funds: Arc::new(FundsLedger::new(open(FUNDS_DB)?)),
            contracts: Arc::new(ContractLedger::new(open(CONTRACT_DB)?)),
            counts: Arc::new(CountsLedger::new(open(COUNTS_DB)?)),
            results: Arc::new(ResultsLedger::new(open(RESULTS_DB)?)),
            dir: Some(dir.to_path_buf()),
        };
        debug!(dir = %dir.display(), "opened ledgers");
        Ok(ledgers)
    }

    /// Process-private ledgers, for unit tests and dry runs.
    pub fn in_memory() -> Self {
        let mem = || -> Arc<dyn KvStore> { Arc::new(storage::MemKvStore::new()) };
        Self {
            nonces: Arc::new(NonceLedger::new(mem())),
            funds: Arc::new(FundsLedger::new(mem())),
            contracts: Arc::new(ContractLedger::new(mem())),
            counts: Arc::new(CountsLedger::new(mem())),
            results: Arc::new(ResultsLedger::new(mem())),
            dir: None,
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Close every ledger, attempting all of them even when one fails.
    /// Returns the first failure.
    pub fn close(&self) -> Result<()> {
        let outcomes = [
            self.nonces.close(),
            self.funds.close(),
            self.contracts.close(),
            self.counts.close(),
            self.results.close(),
        ];
        outcomes.into_iter().collect::<Result<Vec<()>>>().map(|_| ())
    }
}

impl Drop for Ledgers {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("closing ledgers on drop failed: {e}");
        }
    }
}
