//! Funding orchestrator.
//!
//! Moves native currency and ERC-20 tokens between the suite's funded
//! account and per-test accounts:
//! - faucet HTTP request on managed Ten environments
//! - direct transfer from the funded account everywhere else
//! - drain back to the funded account at teardown
//!
//! Every transfer waits for inclusion before returning. Nothing here is
//! retried; a failed transfer is the caller's failure.

pub mod faucet;
pub mod token;

pub use faucet::FaucetClient;
pub use token::{Erc20, ERC20_ABI};

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, U256};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{FundingPolicy, Properties};
use crate::crypto::Account;
use crate::networks::{Connection, Environment, NetworkAdapter, NetworkIdentity, NonceMode};
use crate::persistence::{FundsEntry, FundsLedger};
use crate::utils::metrics::{DRAINS, FUNDING_TRANSFERS};
use crate::utils::{display_eth, HarnessError, Result, METRICS};

/// Gas used by a plain value transfer.
pub const TRANSFER_GAS: u64 = 21_000;

pub struct Funder {
    environment: Environment,
    /// Network the suite's funded account lives on.
    network: Arc<dyn NetworkAdapter>,
    funded_key: String,
    l1_funded_key: Option<String>,
    policy: FundingPolicy,
    faucet: Option<FaucetClient>,
    funds: Arc<FundsLedger>,
    /// Observed fee of each distribution, used to size the drain reserve.
    transfer_costs: Mutex<Vec<U256>>,
}

impl Funder {
    pub fn new(
        environment: Environment,
        network: Arc<dyn NetworkAdapter>,
        properties: &Properties,
        funds: Arc<FundsLedger>,
    ) -> Result<Self> {
        let env = properties.env(environment)?;
        let policy = properties.funding.clone();
        let faucet = match (&env.faucet_url, environment.is_managed_ten()) {
            (Some(url), true) => Some(FaucetClient::new(url.clone(), policy.faucet_timeout())),
            _ => None,
        };
        Ok(Self {
            environment,
            network,
            funded_key: env.funded_account_pk()?.to_string(),
            l1_funded_key: env.l1_funded_account_pk.clone(),
            policy,
            faucet,
            funds,
            transfer_costs: Mutex::new(Vec::new()),
        })
    }

    pub fn policy(&self) -> &FundingPolicy {
        &self.policy
    }

    pub fn has_faucet(&self) -> bool {
        self.faucet.is_some()
    }

    /// Key of the funded account on `network`; L1 views have their own.
    pub fn source_key_for(&self, network: NetworkIdentity) -> Result<&str> {
        if network.is_l1_view() {
            self.l1_funded_key
                .as_deref()
                .ok_or_else(|| HarnessError::Config(format!("l1_funded_account_pk is not set for {}", self.environment)))
        } else {
            Ok(&self.funded_key)
        }
    }

    pub fn funded_account_for(&self, network: NetworkIdentity) -> Result<Account> {
        Account::from_private_key(self.source_key_for(network)?)
    }

    /// Top `account` up to `amount` from the account behind `source_key`.
    ///
    /// Sends nothing when the balance already covers `amount`; otherwise
    /// sends the shortfall and waits for it to land.
    pub async fn fund_native(
        &self,
        network: &dyn NetworkAdapter,
        account: Address,
        amount: U256,
        source_key: &str,
        mode: NonceMode,
        gas_limit: Option<u64>,
    ) -> Result<Option<TransactionReceipt>> {
        let source = network.connect_unchecked(Account::from_private_key(source_key)?).await?;
        let balance = source.balance_of(account).await?;
        if balance >= amount {
            debug!(%account, %balance, "already funded, nothing to send");
            self.record(network, account, balance)?;
            return Ok(None);
        }

        let shortfall = amount - balance;
        info!(network = %network.identity(), %account, "funding shortfall of {} ETH", display_eth(shortfall));
        let receipt = self.native_transfer(network, &source, account, shortfall, gas_limit, mode).await?;
        let after = source.balance_of(account).await?;
        self.record(network, account, after)?;
        Ok(Some(receipt))
    }

    /// Send `amount` from the funded account on the funding network and note what it cost.
    pub async fn distribute_native(&self, account: Address, amount: U256) -> Result<TransactionReceipt> {
        let network = self.network.as_ref();
        let source = network.connect_unchecked(self.funded_account_for(network.identity())?).await?;
        let before = source.balance().await?;

        info!(%account, "sending {} ETH", display_eth(amount));
        let receipt = self.native_transfer(network, &source, account, amount, None, NonceMode::Persisted).await?;

        let after = source.balance().await?;
        let cost = before.saturating_sub(amount).saturating_sub(after);
        debug!(%cost, "distribution cost");
        self.transfer_costs.lock().push(cost);

        let recipient = source.balance_of(account).await?;
        self.record(network, account, recipient)?;
        Ok(receipt)
    }

    /// Mean recorded distribution cost, or a plain transfer at the current gas price
    /// when nothing has been distributed yet.
    pub async fn average_transfer_cost(&self, conn: &Connection) -> Result<U256> {
        let recorded = {
            let costs = self.transfer_costs.lock();
            if costs.is_empty() {
                None
            } else {
                let total = costs.iter().fold(U256::ZERO, |acc, c| acc.saturating_add(*c));
                Some(total / U256::from(costs.len()))
            }
        };
        match recorded {
            Some(avg) => Ok(avg),
            None => Ok(U256::from(conn.gas_price().await?) * U256::from(TRANSFER_GAS)),
        }
    }

    /// Return what `conn`'s account holds, less a reserve of
    /// `drain_margin x average transfer cost`, to the funded account.
    ///
    /// Uses a transient nonce and does nothing when the amount would not be positive.
    pub async fn drain_native(&self, conn: &Connection, network: &dyn NetworkAdapter) -> Result<Option<TransactionReceipt>> {
        let average = self.average_transfer_cost(conn).await?;
        let reserve = average.saturating_mul(U256::from(self.policy.drain_margin));
        let balance = conn.balance().await?;
        if balance <= reserve {
            info!(account = %conn.address(), %balance, %reserve, "nothing to drain");
            return Ok(None);
        }
        let amount = balance - reserve;
        let to = self.funded_account_for(network.identity())?.address();

        let gas_price = conn.gas_price().await?;
        let mut request = TransactionRequest::default().with_to(to).with_value(amount);
        request.from = Some(conn.address());
        request.gas_price = Some(gas_price);
        let gas = conn.estimate_gas(&request).await?;
        request.gas = Some(gas);
        let fee = U256::from(gas) * U256::from(gas_price);
        if fee > reserve {
            warn!(account = %conn.address(), %fee, %reserve, "drain skipped, reserve does not cover gas");
            return Ok(None);
        }

        info!(account = %conn.address(), %to, %balance, "draining {} wei", amount);
        let receipt = network.tx(conn, request, NonceMode::Transient).await?;
        METRICS.inc_counter(DRAINS);
        let after = conn.balance().await?;
        self.record(network, conn.address(), after)?;
        Ok(Some(receipt))
    }

    /// Ask the environment's faucet to credit `address`.
    pub async fn fund_native_from_faucet(&self, address: Address) -> Result<()> {
        let faucet = self
            .faucet
            .as_ref()
            .ok_or_else(|| HarnessError::Config(format!("no faucet configured for {}", self.environment)))?;
        faucet.request(address).await
    }

    /// Older name for [`Funder::fund_native_from_faucet`], from when the L2 token was OBX.
    pub async fn fund_obx_for_address(&self, address: Address) -> Result<()> {
        self.fund_native_from_faucet(address).await
    }

    /// Fund `conn`'s account if it is below the minimum balance.
    ///
    /// An entry in the funds ledger recorded as adequate within the recheck
    /// window short-circuits the whole check. On the funding network this uses the faucet when there is one and a
    /// distribution from the funded account otherwise; on any other network
    /// (an L1 view) the shortfall is sent from that network's funded account.
    pub async fn ensure_funded(&self, network: &dyn NetworkAdapter, conn: &Connection) -> Result<()> {
        if let Some(entry) = self.funds.get(&network.ledger_key(), conn.address())? {
            if entry.adequate && self.is_recent(&entry) {
                debug!(account = %conn.address(), since = %entry.updated_at, "recorded as funded, balance not re-read");
                return Ok(());
            }
        }

        let min = self.policy.min_balance()?;
        let balance = conn.balance().await?;
        if balance >= min {
            self.record(network, conn.address(), balance)?;
            return Ok(());
        }
        info!(network = %network.identity(), account = %conn.address(), %balance, "account below minimum balance");

        let amount = self.policy.fund_amount()?;
        if network.ledger_key() == self.network.ledger_key() {
            if self.faucet.is_some() {
                self.fund_native_from_faucet(conn.address()).await?;
            } else {
                self.distribute_native(conn.address(), amount).await?;
            }
        } else {
            let key = self.source_key_for(network.identity())?;
            self.fund_native(network, conn.address(), amount, key, NonceMode::Persisted, self.policy.transfer_gas_limit)
                .await?;
        }

        let after = conn.balance().await?;
        self.record(network, conn.address(), after)?;
        Ok(())
    }

    /// ERC-20 `transfer` from `from`'s account with the fixed token gas limit.
    pub async fn transfer_token(
        &self,
        network: &dyn NetworkAdapter,
        token: &Erc20,
        from: &Connection,
        to: Address,
        amount: U256,
        mode: NonceMode,
    ) -> Result<TransactionReceipt> {
        info!(token = %token.name, "transferring {amount} to {to}");
        let before = token.balance_of(from, from.address()).await?;
        info!(token = %token.name, "sender balance = {before}");

        let call = token.transfer_call(to, amount)?;
        let receipt = network.transact(from, call, Some(self.policy.token_transfer_gas_limit), mode).await?;

        let after = token.balance_of(from, from.address()).await?;
        info!(token = %token.name, "sender balance = {after}");
        Ok(receipt)
    }

    pub async fn token_balance(&self, token: &Erc20, conn: &Connection, holder: Address) -> Result<U256> {
        token.balance_of(conn, holder).await
    }

    async fn native_transfer(
        &self,
        network: &dyn NetworkAdapter,
        source: &Connection,
        to: Address,
        value: U256,
        gas_limit: Option<u64>,
        mode: NonceMode,
    ) -> Result<TransactionReceipt> {
        let gas_price = source.gas_price().await?;
        let mut request = TransactionRequest::default().with_to(to).with_value(value);
        request.from = Some(source.address());
        request.gas_price = Some(gas_price);
        let gas = match gas_limit.or(self.policy.transfer_gas_limit) {
            Some(limit) => limit,
            None => source.estimate_gas(&request).await?,
        };
        request.gas = Some(gas);
        debug!(gas, gas_price, "transfer gas");

        let available = source.balance().await?;
        let needed = value.saturating_add(U256::from(gas) * U256::from(gas_price));
        if available < needed {
            error!(
                funder = %source.address(),
                "cannot fund: need {} ETH, have {} ETH",
                display_eth(needed),
                display_eth(available)
            );
            return Err(HarnessError::FundingShortfall { funder: source.address(), needed, available });
        }

        let receipt = network.tx(source, request, mode).await?;
        METRICS.inc_counter(FUNDING_TRANSFERS);
        Ok(receipt)
    }

    fn is_recent(&self, entry: &FundsEntry) -> bool {
        Utc::now()
            .signed_duration_since(entry.updated_at)
            .to_std()
            .is_ok_and(|age| age < self.policy.funds_recheck())
    }

    fn record(&self, network: &dyn NetworkAdapter, address: Address, balance: U256) -> Result<()> {
        let adequate = balance >= self.policy.min_balance()?;
        self.funds.record(&network.ledger_key(), address, balance, adequate)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::{for_environment, PRIMARY};
    use crate::persistence::NonceLedger;
    use crate::storage::MemKvStore;

    const PROPS: &str = r#"
        [env."ten.dev"]
        l1_port_http = 8025
        faucet_url = "http://127.0.0.1:9/fund/eth"
        funded_account_pk = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

        [env."ten.local"]
        l1_port_http = 8025
        faucet_url = "http://127.0.0.1:9/fund/eth"
        funded_account_pk = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
        l1_funded_account_pk = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"

        [env.sepolia]
        rpc_url = "http://127.0.0.1:9"
    "#;

    fn funder(env: Environment) -> Result<Funder> {
        let props = Properties::from_toml_str(PROPS).unwrap();
        let nonces = Arc::new(NonceLedger::new(Arc::new(MemKvStore::new())));
        let funds = Arc::new(FundsLedger::new(Arc::new(MemKvStore::new())));
        let network = for_environment(env, PRIMARY, &props, nonces).unwrap();
        Funder::new(env, network, &props, funds)
    }

    #[test]
    fn test_faucet_only_for_managed_ten() {
        assert!(funder(Environment::TenDev).unwrap().has_faucet());
        assert!(!funder(Environment::TenLocal).unwrap().has_faucet());
    }

    #[test]
    fn test_missing_funded_key_is_config_error() {
        assert!(matches!(funder(Environment::Sepolia), Err(HarnessError::Config(_))));
    }

    #[test]
    fn test_source_keys_per_layer() {
        let local = funder(Environment::TenLocal).unwrap();
        let l2 = local.funded_account_for(NetworkIdentity::TenLocal).unwrap();
        let l1 = local.funded_account_for(NetworkIdentity::TenL1Geth).unwrap();
        assert_ne!(l2.address(), l1.address());

        let dev = funder(Environment::TenDev).unwrap();
        assert!(dev.source_key_for(NetworkIdentity::TenL1Geth).is_err());
    }

    #[tokio::test]
    async fn test_faucet_missing_is_config_error() {
        let local = funder(Environment::TenLocal).unwrap();
        let err = local.fund_native_from_faucet(Address::ZERO).await.unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }
}
