use std::sync::Arc;

use crate::config::Properties;
use crate::networks::adapter::{AdapterCore, NetworkAdapter};
use crate::networks::{Environment, NetworkIdentity};
use crate::persistence::NonceLedger;
use crate::utils::Result;

/// Any EVM chain past the London fork: fee-market pricing, no special handling.
pub struct DefaultPostLondon {
    core: AdapterCore,
}

impl DefaultPostLondon {
    pub fn new(environment: Environment, name: &str, properties: &Properties, nonces: Arc<NonceLedger>) -> Result<Self> {
        let core = AdapterCore::new(NetworkIdentity::DefaultPostLondon, environment, name, properties, nonces)?;
        Ok(Self { core })
    }
}

impl NetworkAdapter for DefaultPostLondon {
    fn identity(&self) -> NetworkIdentity {
        NetworkIdentity::DefaultPostLondon
    }

    fn core(&self) -> &AdapterCore {
        &self.core
    }
}
