use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::U256;

use crate::utils::{HarnessError, Result};

/// Convert an ether amount as written in configuration into wei.
pub fn eth_to_wei(eth: f64) -> Result<U256> {
    if !eth.is_finite() || eth < 0.0 {
        return Err(HarnessError::Config(format!("invalid ether amount {eth}")));
    }
    parse_ether(&eth.to_string())
        .map_err(|e| HarnessError::Config(format!("invalid ether amount {eth}: {e}")))
}

/// Human readable ether with 9 decimals, as logged in test-cost lines.
pub fn display_eth(wei: U256) -> String {
    let full = format_ether(wei);
    match full.split_once('.') {
        Some((int, frac)) => {
            let mut frac = frac.to_string();
            frac.truncate(9);
            while frac.len() < 9 {
                frac.push('0');
            }
            format!("{int}.{frac}")
        }
        None => format!("{full}.000000000"),
    }
}
