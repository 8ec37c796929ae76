//! Harness properties: per-environment endpoints, keys and funding policy.
//!
//! Loaded from a TOML file, e.g.
//!
//! ```toml
//! [funding]
//! min_balance_eth = 0.5
//!
//! [env."ten.local"]
//! node_host = "127.0.0.1"
//! node_port_http = 13010
//! l1_port_http = 8025
//! funded_account_pk = "0x..."
//! accounts = ["0x...", "0x..."]
//! ```

use alloy::primitives::U256;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::networks::{Environment, NetworkIdentity};
use crate::utils::{eth_to_wei, HarnessError, Result};

/// Environment variable naming the properties file.
pub const PROPERTIES_ENV: &str = "TEN_TEST_PROPERTIES";
/// Environment variable overriding the ledger directory.
pub const LEDGER_DIR_ENV: &str = "TEN_TEST_LEDGER_DIR";
/// Properties file looked up in the working directory when nothing else is given.
pub const DEFAULT_PROPERTIES_FILE: &str = "ten-harness.toml";
/// Ledger folder under the user's home directory.
pub const DEFAULT_LEDGER_FOLDER: &str = ".tentest";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Properties {
    /// Overrides `~/.tentest`.
    #[serde(default)]
    pub ledger_dir: Option<PathBuf>,
    #[serde(default)]
    pub funding: FundingPolicy,
    #[serde(default)]
    pub env: BTreeMap<String, EnvProperties>,
}

/// Connection details and keys for one environment.
#[derive(Debug, Deserialize, Clone)]
pub struct EnvProperties {
    #[serde(default = "default_host")]
    pub node_host: String,
    #[serde(default = "default_port")]
    pub node_port_http: u16,
    /// Full URL, wins over host/port when set (public testnets with API keys).
    pub rpc_url: Option<String>,
    pub l1_host: Option<String>,
    pub l1_port_http: Option<u16>,
    pub l1_rpc_url: Option<String>,
    pub block_time_secs: Option<f64>,
    pub l1_block_time_secs: Option<f64>,
    pub faucet_url: Option<String>,
    pub funded_account_pk: Option<String>,
    pub l1_funded_account_pk: Option<String>,
    #[serde(default)]
    pub accounts: Vec<String>,
}

const DEFAULT_RPC_TIMEOUT_SECS: f64 = 30.0;

/// Thresholds and gas constants for funding. Tuned per environment, not invariants.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FundingPolicy {
    /// Below this balance a checked connect funds the account.
    pub min_balance_eth: f64,
    /// Amount distributed by a checked connect.
    pub fund_amount_eth: f64,
    /// Drain leaves `drain_margin x average transfer cost` behind.
    pub drain_margin: u64,
    /// Gas limit for native transfers; estimated when absent.
    pub transfer_gas_limit: Option<u64>,
    pub token_transfer_gas_limit: u64,
    pub faucet_timeout_secs: u64,
    /// Bound on every single JSON-RPC request to a node.
    pub rpc_timeout_secs: f64,
    /// An adequate funds entry younger than this skips the balance read. 0 always re-reads.
    pub funds_recheck_secs: u64,
    /// Receipt timeout is `block time x confirmation_blocks`.
    pub confirmation_blocks: u32,
}

impl Default for FundingPolicy {
    fn default() -> Self {
        Self {
            min_balance_eth: 0.5,
            fund_amount_eth: 1.0,
            drain_margin: 10,
            transfer_gas_limit: None,
            token_transfer_gas_limit: 7_200_000,
            faucet_timeout_secs: 30,
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
            funds_recheck_secs: 30,
            confirmation_blocks: 30,
        }
    }
}

impl FundingPolicy {
    pub fn min_balance(&self) -> Result<U256> {
        eth_to_wei(self.min_balance_eth)
    }

    pub fn fund_amount(&self) -> Result<U256> {
        eth_to_wei(self.fund_amount_eth)
    }

    pub fn faucet_timeout(&self) -> Duration {
        Duration::from_secs(self.faucet_timeout_secs)
    }

    pub fn funds_recheck(&self) -> Duration {
        Duration::from_secs(self.funds_recheck_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        let secs = Some(self.rpc_timeout_secs)
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .unwrap_or(DEFAULT_RPC_TIMEOUT_SECS);
        Duration::from_secs_f64(secs)
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8545
}

impl Properties {
    /// Load properties from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        toml::from_str(data).map_err(|e| HarnessError::Config(e.to_string()))
    }

    /// Resolve the file from `TEN_TEST_PROPERTIES`, falling back to `./ten-harness.toml`.
    pub fn load_default() -> Result<Self> {
        let path = std::env::var_os(PROPERTIES_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROPERTIES_FILE));
        Self::load(path)
    }

    pub fn env(&self, environment: Environment) -> Result<&EnvProperties> {
        self.env.get(environment.as_str()).ok_or_else(|| {
            HarnessError::Config(format!("no properties for environment {environment}"))
        })
    }

    /// Ledger directory: explicit setting, then `TEN_TEST_LEDGER_DIR`, then `~/.tentest`.
    pub fn ledger_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.ledger_dir {
            return Ok(dir.clone());
        }
        if let Some(dir) = std::env::var_os(LEDGER_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_LEDGER_FOLDER))
            .ok_or_else(|| HarnessError::Config("cannot resolve the home directory".into()))
    }
}

impl EnvProperties {
    pub fn node_url(&self) -> String {
        self.rpc_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.node_host, self.node_port_http))
    }

    pub fn l1_url(&self) -> Result<String> {
        if let Some(url) = &self.l1_rpc_url {
            return Ok(url.clone());
        }
        let port = self
            .l1_port_http
            .ok_or_else(|| HarnessError::Config("l1_port_http or l1_rpc_url is required".into()))?;
        let host = self.l1_host.as_deref().unwrap_or(&self.node_host);
        Ok(format!("http://{host}:{port}"))
    }

    /// Endpoint for a network; L1 views use the L1 settings.
    pub fn url_for(&self, network: NetworkIdentity) -> Result<String> {
        if network.is_l1_view() { self.l1_url() } else { Ok(self.node_url()) }
    }

    pub fn block_time_for(&self, network: NetworkIdentity) -> Duration {
        let configured = if network.is_l1_view() { self.l1_block_time_secs } else { self.block_time_secs };
        configured
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or_else(|| network.default_block_time())
    }

    pub fn funded_account_pk(&self) -> Result<&str> {
        self.funded_account_pk
            .as_deref()
            .ok_or_else(|| HarnessError::Config("funded_account_pk is not set".into()))
    }

    pub fn l1_funded_account_pk(&self) -> Result<&str> {
        self.l1_funded_account_pk
            .as_deref()
            .ok_or_else(|| HarnessError::Config("l1_funded_account_pk is not set".into()))
    }

    pub fn account_pk(&self, index: usize) -> Result<&str> {
        self.accounts
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| HarnessError::Config(format!("no account configured at index {index}")))
    }
}
