//! Per-test runtime context.
//!
//! A `TestContext` is opened at the start of every test: it opens the
//! ledgers, builds the funding network adapter, and snapshots the balance of
//! the configured accounts. `teardown` always logs the test cost, records the
//! result and counts, and closes the ledgers, whatever happened in the test,
//! including a panic inside `execute`.

use alloy::primitives::{Address, Bytes, U256};
use futures::future::try_join_all;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::Properties;
use crate::crypto::Account;
use crate::funding::Funder;
use crate::networks::{self, Connection, Environment, NetworkAdapter, NonceMode, PRIMARY, PRIMARY_L1};
use crate::persistence::{Ledgers, Outcome};
use crate::utils::{display_eth, HarnessError, Result, METRICS};

/// Balance change of the configured accounts over a test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestCost {
    pub before: U256,
    pub after: U256,
}

impl TestCost {
    /// Absolute change in wei.
    pub fn delta(&self) -> U256 {
        if self.before >= self.after { self.before - self.after } else { self.after - self.before }
    }

    /// True when the accounts ended with more than they started with.
    pub fn gained(&self) -> bool {
        self.after > self.before
    }
}

impl fmt::Display for TestCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.gained() { "-" } else { "" };
        write!(f, "{sign}{} Wei ({sign}{} ETH)", self.delta(), display_eth(self.delta()))
    }
}

pub struct TestContext {
    environment: Environment,
    properties: Properties,
    ledgers: Ledgers,
    network: Arc<dyn NetworkAdapter>,
    funder: Funder,
    /// Unchecked connections for every configured account, used for the cost snapshot.
    accounts: Vec<Connection>,
    start_balance: U256,
    started: Instant,
}

impl TestContext {
    /// Open the ledgers in the configured directory and build the context.
    pub async fn open(environment: Environment, properties: Properties) -> Result<Self> {
        let ledgers = Ledgers::open(properties.ledger_dir()?)?;
        Self::with_ledgers(environment, properties, ledgers).await
    }

    pub async fn with_ledgers(environment: Environment, properties: Properties, ledgers: Ledgers) -> Result<Self> {
        let network = networks::for_environment(environment, PRIMARY, &properties, ledgers.nonces.clone())?;
        let funder = Funder::new(environment, network.clone(), &properties, ledgers.funds.clone())?;

        let mut accounts = Vec::new();
        for key in &properties.env(environment)?.accounts {
            accounts.push(network.connect_unchecked(Account::from_private_key(key)?).await?);
        }
        let start_balance = total_balance(&accounts).await?;
        info!(%environment, accounts = accounts.len(), "test context opened");

        Ok(Self {
            environment,
            properties,
            ledgers,
            network,
            funder,
            accounts,
            start_balance,
            started: Instant::now(),
        })
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn ledgers(&self) -> &Ledgers {
        &self.ledgers
    }

    pub fn funder(&self) -> &Funder {
        &self.funder
    }

    /// The adapter funding and distribution go through.
    pub fn network(&self) -> &Arc<dyn NetworkAdapter> {
        &self.network
    }

    pub fn is_ten(&self) -> bool {
        self.environment.is_ten()
    }

    pub fn is_local_ten(&self) -> bool {
        self.environment.is_local_ten()
    }

    pub fn is_sepolia_ten(&self) -> bool {
        self.environment.is_sepolia_ten()
    }

    /// A fresh adapter for the environment's network, labelled `name`.
    pub fn get_network_connection(&self, name: Option<&str>) -> Result<Arc<dyn NetworkAdapter>> {
        networks::for_environment(
            self.environment,
            name.unwrap_or(PRIMARY),
            &self.properties,
            self.ledgers.nonces.clone(),
        )
    }

    /// A fresh adapter for the layer 1 underneath the environment.
    pub fn get_l1_network_connection(&self, name: Option<&str>) -> Result<Arc<dyn NetworkAdapter>> {
        networks::l1_for_environment(
            self.environment,
            name.unwrap_or(PRIMARY_L1),
            &self.properties,
            self.ledgers.nonces.clone(),
        )
    }

    /// Connect and make sure the account holds at least the minimum balance.
    pub async fn connect(&self, network: &dyn NetworkAdapter, account: Account) -> Result<Connection> {
        let conn = network.connect_unchecked(account).await?;
        self.funder.ensure_funded(network, &conn).await?;
        Ok(conn)
    }

    /// Checked connection for the configured test account at `index`.
    pub async fn connect_account(&self, network: &dyn NetworkAdapter, index: usize) -> Result<Connection> {
        let key = self.properties.env(self.environment)?.account_pk(index)?;
        self.connect(network, Account::from_private_key(key)?).await
    }

    /// Address of the fixture `name`, deploying it when the ledger has none
    /// or the recorded address no longer holds code (chain reset).
    pub async fn deploy_or_reuse(
        &self,
        network: &dyn NetworkAdapter,
        conn: &Connection,
        name: &str,
        bytecode: Bytes,
        gas_limit: Option<u64>,
    ) -> Result<Address> {
        let key = network.ledger_key();
        let contracts = &self.ledgers.contracts;
        if let Some(entry) = contracts.get(&key, name)? {
            if !conn.code_at(entry.address).await?.is_empty() {
                info!(name, address = %entry.address, "reusing deployed contract");
                return Ok(entry.address);
            }
            warn!(name, address = %entry.address, "recorded contract has no code, redeploying");
            contracts.delete(&key, name)?;
        }

        let receipt = network.deploy(conn, bytecode, gas_limit, NonceMode::Persisted).await?;
        let address = receipt.contract_address.ok_or(HarnessError::Reverted {
            network: conn.network,
            tx_hash: receipt.transaction_hash,
        })?;
        contracts.insert(&key, name, address, receipt.transaction_hash)?;
        Ok(address)
    }

    /// Current balance of the configured accounts against the opening snapshot.
    pub async fn test_cost(&self) -> Result<TestCost> {
        let after = total_balance(&self.accounts).await?;
        Ok(TestCost { before: self.start_balance, after })
    }

    /// Record the outcome of `test` and release the ledgers.
    ///
    /// Every step is attempted; the first failure is returned.
    pub async fn teardown(&self, test: &str, outcome: Outcome) -> Result<()> {
        let mut first_err: Option<HarnessError> = None;
        let mut keep = |r: Result<()>| {
            if let Err(e) = r {
                error!(test, "teardown step failed: {e}");
                first_err.get_or_insert(e);
            }
        };

        let cost = match self.test_cost().await {
            Ok(cost) => {
                info!(test, "Test cost: {cost}");
                cost.delta()
            }
            Err(e) => {
                keep(Err(e));
                U256::ZERO
            }
        };

        let env = self.environment.as_str();
        keep(self.ledgers.results.append(env, test, outcome, self.started.elapsed(), cost).map(|_| ()));
        keep(self.ledgers.counts.increment(env, test, outcome.as_str()).map(|_| ()));

        for (name, value) in METRICS.snapshot() {
            info!(test, metric = %name, value, "harness metric");
        }

        keep(self.ledgers.close());
        first_err.map_or(Ok(()), Err)
    }

    /// Run `body` as test `test` and tear down whatever it returns.
    ///
    /// The body's error wins over a teardown error. A panicking body (a
    /// failed `assert!`) is recorded as failed and torn down before the
    /// panic is resumed.
    pub async fn execute<F, Fut>(self: Arc<Self>, test: &str, body: F) -> Result<()>
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let result = match AssertUnwindSafe(body(self.clone())).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                error!(test, "test {}: panicked: {}", Outcome::Failed, panic_message(payload.as_ref()));
                if let Err(e) = self.teardown(test, Outcome::Failed).await {
                    error!(test, "teardown after panic failed: {e}");
                }
                panic::resume_unwind(payload);
            }
        };
        let outcome = match &result {
            Ok(()) => Outcome::Passed,
            Err(e) if e.is_harness_failure() => Outcome::Errored,
            Err(_) => Outcome::Failed,
        };
        if let Err(e) = &result {
            error!(test, "test {outcome}: {e}");
        }
        let teardown = self.teardown(test, outcome).await;
        result.and(teardown)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

async fn total_balance(accounts: &[Connection]) -> Result<U256> {
    let balances = try_join_all(accounts.iter().map(|conn| conn.balance())).await?;
    Ok(balances.into_iter().fold(U256::ZERO, U256::saturating_add))
}
