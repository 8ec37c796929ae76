use std::sync::Arc;

use crate::config::Properties;
use crate::networks::adapter::{AdapterCore, NetworkAdapter};
use crate::networks::{Environment, NetworkIdentity};
use crate::persistence::NonceLedger;
use crate::utils::Result;

/// The Sepolia public testnet.
pub struct Sepolia {
    core: AdapterCore,
}

impl Sepolia {
    pub fn new(environment: Environment, name: &str, properties: &Properties, nonces: Arc<NonceLedger>) -> Result<Self> {
        let core = AdapterCore::new(NetworkIdentity::Sepolia, environment, name, properties, nonces)?;
        Ok(Self { core })
    }
}

impl NetworkAdapter for Sepolia {
    fn identity(&self) -> NetworkIdentity {
        NetworkIdentity::Sepolia
    }

    fn core(&self) -> &AdapterCore {
        &self.core
    }
}
