//! The network adapter contract.
//!
//! Every network variant is a flat struct holding an `AdapterCore`; the
//! submission pipeline (nonce, fees, gas, sign, send, wait) lives in the
//! trait's provided methods and variants override only the hooks where their
//! chain differs.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{Ethereum, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::transports::http::Http;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Properties;
use crate::crypto::Account;
use crate::networks::profile::{FeeModel, NetworkProfile};
use crate::networks::{Connection, Environment, NetworkIdentity};
use crate::persistence::NonceLedger;
use crate::rpc::{http_client, JsonRpcClient};
use crate::utils::metrics::{TX_CONFIRMED, TX_FAILED, TX_SUBMITTED};
use crate::utils::{HarnessError, Result, METRICS};

/// Where a transaction's nonce comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NonceMode {
    /// Allocate through the shared nonce ledger.
    Persisted,
    /// Use the live transaction count and leave the ledger untouched.
    /// For accounts no other process sends from, e.g. when draining.
    Transient,
}

/// A contract method invocation, already ABI encoded.
#[derive(Clone, Debug)]
pub struct ContractCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl ContractCall {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self { to, data: data.into(), value: U256::ZERO }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// State shared by every adapter variant.
#[derive(Clone)]
pub struct AdapterCore {
    /// Label of this connection within a test (`primary`, `primary_l1_connection`, ...).
    pub name: String,
    pub environment: Environment,
    pub profile: NetworkProfile,
    pub nonces: Arc<NonceLedger>,
}

impl AdapterCore {
    pub fn new(
        network: NetworkIdentity,
        environment: Environment,
        name: &str,
        properties: &Properties,
        nonces: Arc<NonceLedger>,
    ) -> Result<Self> {
        let env = properties.env(environment)?;
        let profile = NetworkProfile {
            rpc_url: env.url_for(network)?,
            block_time: env.block_time_for(network),
            confirmation_blocks: properties.funding.confirmation_blocks,
            fee_model: network.fee_model(),
            request_timeout: properties.funding.rpc_timeout(),
        };
        Ok(Self { name: name.to_string(), environment, profile, nonces })
    }
}

#[async_trait]
pub trait NetworkAdapter: Send + Sync {
    fn identity(&self) -> NetworkIdentity;

    fn core(&self) -> &AdapterCore;

    fn name(&self) -> &str {
        &self.core().name
    }

    fn environment(&self) -> Environment {
        self.core().environment
    }

    fn profile(&self) -> &NetworkProfile {
        &self.core().profile
    }

    /// Key under which the ledgers file this network's entries.
    fn ledger_key(&self) -> String {
        format!("{}/{}", self.environment(), self.identity())
    }

    fn connection_url(&self) -> &str {
        &self.core().profile.rpc_url
    }

    /// Bind `account` to this network without looking at its balance.
    async fn connect_unchecked(&self, account: Account) -> Result<Connection> {
        let network = self.identity();
        let url = reqwest::Url::parse(self.connection_url())
            .map_err(|e| HarnessError::Config(format!("bad rpc url {}: {e}", self.connection_url())))?;
        // provider and raw client share one HTTP client, so both carry the request timeout
        let http = http_client(self.profile().request_timeout)?;
        let transport = Http::with_client(http.clone(), url);
        let is_local = transport.guess_local();
        let provider: RootProvider = RootProvider::new(RpcClient::new(transport, is_local));
        let chain_id = provider.get_chain_id().await.map_err(|e| HarnessError::transport(network, e))?;
        debug!(%network, address = %account.address(), chain_id, "connected");
        Ok(Connection {
            network,
            ledger_key: self.ledger_key(),
            account,
            chain_id,
            provider,
            rpc: JsonRpcClient::with_client(self.connection_url(), network, http),
        })
    }

    /// Fill whichever fee fields the caller left empty.
    async fn fill_fees(&self, conn: &Connection, request: &mut TransactionRequest) -> Result<()> {
        if request.gas_price.is_some() || request.max_fee_per_gas.is_some() {
            return Ok(());
        }
        match self.profile().fee_model {
            FeeModel::Legacy => request.gas_price = Some(conn.gas_price().await?),
            FeeModel::Eip1559 => {
                let fees = conn
                    .provider
                    .estimate_eip1559_fees()
                    .await
                    .map_err(|e| HarnessError::transport(conn.network, e))?;
                request.max_fee_per_gas = Some(fees.max_fee_per_gas);
                request.max_priority_fee_per_gas = Some(fees.max_priority_fee_per_gas);
            }
        }
        Ok(())
    }

    /// Nonce for the next transaction from `conn`'s account.
    async fn next_nonce(&self, conn: &Connection, mode: NonceMode) -> Result<u64> {
        match mode {
            NonceMode::Transient => conn.transaction_count().await,
            NonceMode::Persisted => {
                let ledger = &self.core().nonces;
                let key = self.ledger_key();
                // the chain is only asked when the ledger has never seen this account
                let seed = match ledger.current(&key, conn.address())? {
                    Some(next) => next,
                    None => conn.transaction_count().await?,
                };
                ledger.next_nonce(&key, conn.address(), seed)
            }
        }
    }

    /// Sign and submit `request` from `conn`'s account, then wait for inclusion.
    async fn tx(&self, conn: &Connection, mut request: TransactionRequest, mode: NonceMode) -> Result<TransactionReceipt> {
        request.from = Some(conn.address());
        request.chain_id = Some(conn.chain_id);
        self.fill_fees(conn, &mut request).await?;
        if request.gas.is_none() {
            let estimate = conn.estimate_gas(&request).await?;
            debug!(network = %conn.network, estimate, "gas estimated");
            request.gas = Some(estimate);
        }
        let nonce = self.next_nonce(conn, mode).await?;
        request.nonce = Some(nonce);

        let tx_hash = match self.sign_and_send(conn, request).await {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                if mode == NonceMode::Persisted {
                    // nothing reached the chain, so the ledger must not keep the nonce
                    match self.core().nonces.release(&self.ledger_key(), conn.address(), nonce) {
                        Ok(released) => warn!(network = %conn.network, nonce, released, "submission failed: {e}"),
                        Err(le) => warn!(network = %conn.network, nonce, "submission failed: {e}; nonce release failed: {le}"),
                    }
                }
                return Err(e);
            }
        };
        info!(network = %conn.network, from = %conn.address(), nonce, %tx_hash, "transaction sent");
        let receipt = self.wait_for_transaction(conn, tx_hash).await?;
        if !receipt.status() {
            METRICS.inc_counter(TX_FAILED);
            return Err(HarnessError::Reverted { network: conn.network, tx_hash });
        }
        METRICS.inc_counter(TX_CONFIRMED);
        Ok(receipt)
    }

    /// Invoke a contract method; `gas_limit` skips estimation when given.
    async fn transact(
        &self,
        conn: &Connection,
        call: ContractCall,
        gas_limit: Option<u64>,
        mode: NonceMode,
    ) -> Result<TransactionReceipt> {
        let mut request = TransactionRequest::default()
            .with_to(call.to)
            .with_input(call.data)
            .with_value(call.value);
        request.gas = gas_limit;
        self.tx(conn, request, mode).await
    }

    /// Deploy `bytecode` (constructor arguments appended). The receipt carries the address.
    async fn deploy(
        &self,
        conn: &Connection,
        bytecode: Bytes,
        gas_limit: Option<u64>,
        mode: NonceMode,
    ) -> Result<TransactionReceipt> {
        let mut request = TransactionRequest::default().with_deploy_code(bytecode);
        request.gas = gas_limit;
        let receipt = self.tx(conn, request, mode).await?;
        if let Some(address) = receipt.contract_address {
            info!(network = %conn.network, %address, "contract deployed");
        }
        Ok(receipt)
    }

    /// Sign a fully populated request with the connection's key and submit it.
    async fn sign_and_send(&self, conn: &Connection, request: TransactionRequest) -> Result<TxHash> {
        let envelope = <TransactionRequest as TransactionBuilder<Ethereum>>::build(request, &conn.account.wallet())
            .await
            .map_err(|e| HarnessError::Signing(e.to_string()))?;
        self.send_transaction(conn, &envelope.encoded_2718()).await
    }

    /// Submit an already signed, EIP-2718 encoded transaction.
    async fn send_transaction(&self, conn: &Connection, signed_raw: &[u8]) -> Result<TxHash> {
        let pending = conn
            .provider
            .send_raw_transaction(signed_raw)
            .await
            .map_err(|e| HarnessError::transport(conn.network, e))?;
        METRICS.inc_counter(TX_SUBMITTED);
        Ok(*pending.tx_hash())
    }

    /// Poll for the receipt once per block until `block_time x confirmation_blocks` has passed.
    ///
    /// The deadline covers the polls themselves, so a node that stops
    /// answering cannot stretch the wait.
    async fn wait_for_transaction(&self, conn: &Connection, tx_hash: TxHash) -> Result<TransactionReceipt> {
        let timeout = self.profile().receipt_timeout();
        let started = Instant::now();
        let poll = async {
            loop {
                match conn.provider.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(e) => warn!(network = %conn.network, %tx_hash, "receipt poll failed: {e}"),
                }
                tokio::time::sleep(self.profile().poll_interval()).await;
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(receipt) => {
                debug!(network = %conn.network, %tx_hash, block = ?receipt.block_number, "receipt received");
                Ok(receipt)
            }
            Err(_) => {
                METRICS.inc_counter(TX_FAILED);
                Err(HarnessError::Timeout { network: conn.network, tx_hash, waited: started.elapsed() })
            }
        }
    }
}
