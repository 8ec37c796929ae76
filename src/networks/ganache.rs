use std::sync::Arc;

use crate::config::Properties;
use crate::networks::adapter::{AdapterCore, NetworkAdapter};
use crate::networks::{Environment, NetworkIdentity};
use crate::persistence::NonceLedger;
use crate::utils::Result;

/// Local ganache chain. Mines on demand and prices gas with a single legacy `gasPrice`.
pub struct Ganache {
    core: AdapterCore,
}

impl Ganache {
    pub fn new(environment: Environment, name: &str, properties: &Properties, nonces: Arc<NonceLedger>) -> Result<Self> {
        let core = AdapterCore::new(NetworkIdentity::Ganache, environment, name, properties, nonces)?;
        Ok(Self { core })
    }
}

impl NetworkAdapter for Ganache {
    fn identity(&self) -> NetworkIdentity {
        NetworkIdentity::Ganache
    }

    fn core(&self) -> &AdapterCore {
        &self.core
    }
}
