//! Adapters for the Ten L2 and the L1 chains underneath it.

use std::sync::Arc;

use crate::config::Properties;
use crate::networks::adapter::{AdapterCore, NetworkAdapter};
use crate::networks::{Environment, NetworkIdentity};
use crate::persistence::NonceLedger;
use crate::utils::Result;

/// The Ten L2, managed (sepolia, uat, dev) or local (local, sim).
///
/// Ten nodes price gas with a legacy `gasPrice`. Managed deployments also run
/// a faucet, which is the preferred way to fund accounts there.
pub struct Ten {
    core: AdapterCore,
    identity: NetworkIdentity,
    faucet_url: Option<String>,
}

impl Ten {
    pub fn new(environment: Environment, name: &str, properties: &Properties, nonces: Arc<NonceLedger>) -> Result<Self> {
        let identity = if environment.is_managed_ten() {
            NetworkIdentity::TenManaged
        } else {
            NetworkIdentity::TenLocal
        };
        let core = AdapterCore::new(identity, environment, name, properties, nonces)?;
        let faucet_url = properties.env(environment)?.faucet_url.clone();
        Ok(Self { core, identity, faucet_url })
    }

    pub fn is_managed(&self) -> bool {
        self.identity == NetworkIdentity::TenManaged
    }

    pub fn faucet_url(&self) -> Option<&str> {
        self.faucet_url.as_deref()
    }
}

impl NetworkAdapter for Ten {
    fn identity(&self) -> NetworkIdentity {
        self.identity
    }

    fn core(&self) -> &AdapterCore {
        &self.core
    }
}

/// The geth L1 a managed or local Ten deployment settles to.
pub struct TenL1Geth {
    core: AdapterCore,
}

impl TenL1Geth {
    pub fn new(environment: Environment, name: &str, properties: &Properties, nonces: Arc<NonceLedger>) -> Result<Self> {
        let core = AdapterCore::new(NetworkIdentity::TenL1Geth, environment, name, properties, nonces)?;
        Ok(Self { core })
    }
}

impl NetworkAdapter for TenL1Geth {
    fn identity(&self) -> NetworkIdentity {
        NetworkIdentity::TenL1Geth
    }

    fn core(&self) -> &AdapterCore {
        &self.core
    }
}

/// Sepolia seen as the L1 of the Ten testnet. Keeps its own ledger key, apart
/// from a plain `sepolia` run against the same chain.
pub struct TenL1Sepolia {
    core: AdapterCore,
}

impl TenL1Sepolia {
    pub fn new(environment: Environment, name: &str, properties: &Properties, nonces: Arc<NonceLedger>) -> Result<Self> {
        let core = AdapterCore::new(NetworkIdentity::TenL1Sepolia, environment, name, properties, nonces)?;
        Ok(Self { core })
    }
}

impl NetworkAdapter for TenL1Sepolia {
    fn identity(&self) -> NetworkIdentity {
        NetworkIdentity::TenL1Sepolia
    }

    fn core(&self) -> &AdapterCore {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROPS: &str = r#"
        [env."ten.dev"]
        node_host = "dev.ten.example"
        node_port_http = 80
        l1_port_http = 8025
        faucet_url = "http://dev-faucet.ten.example/fund/eth"

        [env."ten.local"]
        node_port_http = 13010
        l1_port_http = 8025
    "#;

    fn nonces() -> Arc<NonceLedger> {
        Arc::new(NonceLedger::new(Arc::new(crate::storage::MemKvStore::new())))
    }

    #[test]
    fn test_managed_vs_local() {
        let props = Properties::from_toml_str(PROPS).unwrap();
        let dev = Ten::new(Environment::TenDev, "primary", &props, nonces()).unwrap();
        assert!(dev.is_managed());
        assert_eq!(dev.identity(), NetworkIdentity::TenManaged);
        assert_eq!(dev.faucet_url(), Some("http://dev-faucet.ten.example/fund/eth"));
        assert_eq!(dev.ledger_key(), "ten.dev/ten");

        let local = Ten::new(Environment::TenLocal, "primary", &props, nonces()).unwrap();
        assert!(!local.is_managed());
        assert_eq!(local.connection_url(), "http://127.0.0.1:13010");
    }

    #[test]
    fn test_l1_geth_uses_l1_endpoint() {
        let props = Properties::from_toml_str(PROPS).unwrap();
        let l1 = TenL1Geth::new(Environment::TenDev, "primary_l1_connection", &props, nonces()).unwrap();
        assert_eq!(l1.connection_url(), "http://dev.ten.example:8025");
        assert_eq!(l1.ledger_key(), "ten.dev/ten-l1-geth");
        assert_eq!(l1.name(), "primary_l1_connection");
    }
}
