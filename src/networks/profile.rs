use std::time::Duration;

/// How a network prices gas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeeModel {
    /// Single `gasPrice` taken from `eth_gasPrice`.
    Legacy,
    /// `maxFeePerGas` / `maxPriorityFeePerGas` from the fee-history estimate.
    Eip1559,
}

/// Per-network submission parameters resolved from the properties file.
#[derive(Clone, Debug)]
pub struct NetworkProfile {
    pub rpc_url: String,
    pub block_time: Duration,
    pub confirmation_blocks: u32,
    pub fee_model: FeeModel,
    /// Per request HTTP timeout.
    pub request_timeout: Duration,
}

impl NetworkProfile {
    /// Longest wait for a receipt: block time x confirmation blocks.
    pub fn receipt_timeout(&self) -> Duration {
        self.block_time * self.confirmation_blocks.max(1)
    }

    /// Receipt polling happens once per block.
    pub fn poll_interval(&self) -> Duration {
        self.block_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_scales_with_block_time() {
        let profile = NetworkProfile {
            rpc_url: "http://127.0.0.1:8545".into(),
            block_time: Duration::from_millis(500),
            confirmation_blocks: 30,
            fee_model: FeeModel::Legacy,
            request_timeout: Duration::from_secs(30),
        };
        assert_eq!(profile.receipt_timeout(), Duration::from_secs(15));
        assert_eq!(profile.poll_interval(), Duration::from_millis(500));
    }
}
