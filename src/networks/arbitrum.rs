use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Properties;
use crate::networks::adapter::{AdapterCore, NetworkAdapter};
use crate::networks::{Connection, Environment, NetworkIdentity};
use crate::persistence::NonceLedger;
use crate::utils::Result;

/// Arbitrum Sepolia. Fee market transactions, but the sequencer ignores tips
/// and fee history rewards are meaningless, so fees come from `eth_gasPrice`.
pub struct ArbitrumSepolia {
    core: AdapterCore,
}

/// Headroom over the current base price for `maxFeePerGas`.
const MAX_FEE_MULTIPLIER: u128 = 2;

impl ArbitrumSepolia {
    pub fn new(environment: Environment, name: &str, properties: &Properties, nonces: Arc<NonceLedger>) -> Result<Self> {
        let core = AdapterCore::new(NetworkIdentity::ArbitrumSepolia, environment, name, properties, nonces)?;
        Ok(Self { core })
    }
}

#[async_trait]
impl NetworkAdapter for ArbitrumSepolia {
    fn identity(&self) -> NetworkIdentity {
        NetworkIdentity::ArbitrumSepolia
    }

    fn core(&self) -> &AdapterCore {
        &self.core
    }

    async fn fill_fees(&self, conn: &Connection, request: &mut TransactionRequest) -> Result<()> {
        if request.gas_price.is_some() || request.max_fee_per_gas.is_some() {
            return Ok(());
        }
        let price = conn.gas_price().await?;
        request.max_fee_per_gas = Some(price.saturating_mul(MAX_FEE_MULTIPLIER));
        request.max_priority_fee_per_gas = Some(0);
        Ok(())
    }
}
