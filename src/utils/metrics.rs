use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const TX_SUBMITTED: &str = "tx_submitted";
pub const TX_CONFIRMED: &str = "tx_confirmed";
pub const TX_FAILED: &str = "tx_failed";
pub const FAUCET_REQUESTS: &str = "faucet_requests";
pub const FUNDING_TRANSFERS: &str = "funding_transfers";
pub const DRAINS: &str = "drains";

/// Process-local counters for harness activity, reported at teardown
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    counters: Arc<Mutex<BTreeMap<String, u64>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_counter(&self, name: &str) {
        *self.counters.lock().entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters.lock().clone()
    }
}

lazy_static! {
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let m = MetricsRegistry::new();
        m.inc_counter(TX_SUBMITTED);
        m.inc_counter(TX_SUBMITTED);
        m.inc_counter(DRAINS);
        assert_eq!(m.counter(TX_SUBMITTED), 2);
        assert_eq!(m.counter(TX_FAILED), 0);
        assert_eq!(m.snapshot().len(), 2);
    }
}
