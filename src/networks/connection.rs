use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::TransactionRequest;

use crate::crypto::Account;
use crate::networks::NetworkIdentity;
use crate::rpc::JsonRpcClient;
use crate::utils::{HarnessError, Result};

/// A client bound to one account on one network.
///
/// Built per test per account by an adapter; the JSON-RPC id counter lives
/// in the embedded `JsonRpcClient`, so nothing here is process-global.
pub struct Connection {
    pub network: NetworkIdentity,
    /// `environment/network` key used by the ledgers.
    pub ledger_key: String,
    pub account: Account,
    pub chain_id: u64,
    pub provider: RootProvider,
    pub rpc: JsonRpcClient,
}

impl Connection {
    pub fn address(&self) -> Address {
        self.account.address()
    }

    pub async fn balance(&self) -> Result<U256> {
        self.balance_of(self.address()).await
    }

    pub async fn balance_of(&self, address: Address) -> Result<U256> {
        self.provider.get_balance(address).await.map_err(|e| HarnessError::transport(self.network, e))
    }

    pub async fn gas_price(&self) -> Result<u128> {
        self.provider.get_gas_price().await.map_err(|e| HarnessError::transport(self.network, e))
    }

    /// Live transaction count of the bound account.
    pub async fn transaction_count(&self) -> Result<u64> {
        self.provider
            .get_transaction_count(self.address())
            .await
            .map_err(|e| HarnessError::transport(self.network, e))
    }

    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        self.provider.estimate_gas(tx.clone()).await.map_err(|e| HarnessError::transport(self.network, e))
    }

    pub async fn code_at(&self, address: Address) -> Result<Bytes> {
        self.provider.get_code_at(address).await.map_err(|e| HarnessError::transport(self.network, e))
    }

    /// `eth_call` from the bound account.
    pub async fn call(&self, mut tx: TransactionRequest) -> Result<Bytes> {
        if tx.from.is_none() {
            tx.from = Some(self.address());
        }
        self.provider.call(tx).await.map_err(|e| HarnessError::transport(self.network, e))
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("network", &self.network)
            .field("ledger_key", &self.ledger_key)
            .field("address", &self.address())
            .field("chain_id", &self.chain_id)
            .field("url", &self.rpc.url())
            .finish()
    }
}
