//! Results ledger: an append-only record of test outcomes.
//!
//! Keys are `env/test/<rfc3339 timestamp>/<pid>-<seq>` so entries from
//! concurrent processes never collide and list in time order.

use alloy::primitives::U256;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::persistence::{decode, encode};
use crate::storage::KvStore;
use crate::utils::serde_helpers::{as_decimal, from_decimal};
use crate::utils::{HarnessError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Passed,
    Failed,
    /// The harness itself failed (ledger, configuration, I/O).
    Errored,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsEntry {
    pub environment: String,
    pub test: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    /// Wei spent by the test's accounts.
    #[serde(serialize_with = "as_decimal", deserialize_with = "from_decimal")]
    pub cost: U256,
    pub recorded_at: DateTime<Utc>,
}

impl ResultsEntry {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSummary {
    pub passed: u64,
    pub failed: u64,
    pub errored: u64,
}

impl ResultSummary {
    pub fn runs(&self) -> u64 {
        self.passed + self.failed + self.errored
    }
}

pub struct ResultsLedger {
    store: Arc<dyn KvStore>,
    seq: AtomicU64,
}

impl ResultsLedger {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store, seq: AtomicU64::new(0) }
    }

    pub fn append(
        &self,
        environment: &str,
        test: &str,
        outcome: Outcome,
        duration: Duration,
        cost: U256,
    ) -> Result<ResultsEntry> {
        let entry = ResultsEntry {
            environment: environment.to_string(),
            test: test.to_string(),
            outcome,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            cost,
            recorded_at: Utc::now(),
        };
        let key = format!(
            "{environment}/{test}/{}/{}-{}",
            entry.recorded_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            std::process::id(),
            self.seq.fetch_add(1, Ordering::Relaxed)
        );
        let bytes = encode(&entry).map_err(HarnessError::ledger)?;
        self.store.put(key.as_bytes(), &bytes).map_err(HarnessError::ledger)?;
        Ok(entry)
    }

    /// All runs of one test, oldest first.
    pub fn history(&self, environment: &str, test: &str) -> Result<Vec<ResultsEntry>> {
        self.scan(&format!("{environment}/{test}/"))
    }

    /// Outcome counts per test for an environment.
    pub fn summary(&self, environment: &str) -> Result<BTreeMap<String, ResultSummary>> {
        let mut out: BTreeMap<String, ResultSummary> = BTreeMap::new();
        for entry in self.scan(&format!("{environment}/"))? {
            let s = out.entry(entry.test).or_default();
            match entry.outcome {
                Outcome::Passed => s.passed += 1,
                Outcome::Failed => s.failed += 1,
                Outcome::Errored => s.errored += 1,
            }
        }
        Ok(out)
    }

    fn scan(&self, prefix: &str) -> Result<Vec<ResultsEntry>> {
        self.store
            .scan_prefix(prefix.as_bytes())
            .map_err(HarnessError::ledger)?
            .into_iter()
            .map(|(_, v)| decode::<ResultsEntry>(&v).map_err(HarnessError::ledger))
            .collect()
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
    fn test_append_history_summary() {
        let results = ResultsLedger::new(Arc::new(MemKvStore::new()));
        results.append("ten.local", "test_a", Outcome::Passed, Duration::from_millis(1500), U256::from(42u64)).unwrap();
        results.append("ten.local", "test_a", Outcome::Failed, Duration::from_secs(2), U256::ZERO).unwrap();
        results.append("ten.local", "test_ab", Outcome::Errored, Duration::ZERO, U256::ZERO).unwrap();
        results.append("sepolia", "test_a", Outcome::Passed, Duration::ZERO, U256::ZERO).unwrap();

        let history = results.history("ten.local", "test_a").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].outcome, Outcome::Passed);
        assert_eq!(history[0].duration(), Duration::from_millis(1500));
        assert_eq!(history[0].cost, U256::from(42u64));

        let summary = results.summary("ten.local").unwrap();
        assert_eq!(summary["test_a"], ResultSummary { passed: 1, failed: 1, errored: 0 });
        assert_eq!(summary["test_ab"].runs(), 1);
        assert!(!summary.contains_key("sepolia"));
    }
}
