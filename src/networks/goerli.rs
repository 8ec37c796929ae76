use std::sync::Arc;

use crate::config::Properties;
use crate::networks::adapter::{AdapterCore, NetworkAdapter};
use crate::networks::{Environment, NetworkIdentity};
use crate::persistence::NonceLedger;
use crate::utils::Result;

/// The Goerli public testnet.
pub struct Goerli {
    core: AdapterCore,
}

impl Goerli {
    pub fn new(environment: Environment, name: &str, properties: &Properties, nonces: Arc<NonceLedger>) -> Result<Self> {
        let core = AdapterCore::new(NetworkIdentity::Goerli, environment, name, properties, nonces)?;
        Ok(Self { core })
    }
}

impl NetworkAdapter for Goerli {
    fn identity(&self) -> NetworkIdentity {
        NetworkIdentity::Goerli
    }

    fn core(&self) -> &AdapterCore {
        &self.core
    }
}
