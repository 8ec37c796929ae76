//! Utility module: errors, logging, metrics, units, and serde helpers.

pub mod errors;
pub mod metrics;
pub mod logging;
pub mod serde_helpers;
pub mod units;

pub use errors::{HarnessError, Result};
pub use metrics::{MetricsRegistry, METRICS};
pub use logging::init_logging;
pub use units::{display_eth, eth_to_wei};
