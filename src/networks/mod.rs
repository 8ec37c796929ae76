//! Network adapters.
//!
//! - `identity`: which network and which suite environment
//! - `profile`: endpoint, block time and fee model resolved from properties
//! - `adapter`: the `NetworkAdapter` trait and the shared submission pipeline
//! - one flat struct per network variant
//!
//! `for_environment` / `l1_for_environment` pick the variant for a run.

pub mod identity;
pub mod profile;
pub mod connection;
pub mod adapter;
pub mod default;
pub mod ganache;
pub mod goerli;
pub mod sepolia;
pub mod arbitrum;
pub mod ten;

pub use adapter::{AdapterCore, ContractCall, NetworkAdapter, NonceMode};
pub use arbitrum::ArbitrumSepolia;
pub use connection::Connection;
pub use default::DefaultPostLondon;
pub use ganache::Ganache;
pub use goerli::Goerli;
pub use identity::{Environment, NetworkIdentity};
pub use profile::{FeeModel, NetworkProfile};
pub use sepolia::Sepolia;
pub use ten::{Ten, TenL1Geth, TenL1Sepolia};

use std::sync::Arc;

use crate::config::Properties;
use crate::persistence::NonceLedger;
use crate::utils::Result;

/// Label of the adapter a test transacts through.
pub const PRIMARY: &str = "primary";
/// Label of the adapter reaching a layer 2's layer 1.
pub const PRIMARY_L1: &str = "primary_l1_connection";

/// Adapter for the network `environment` runs its tests against.
pub fn for_environment(
    environment: Environment,
    name: &str,
    properties: &Properties,
    nonces: Arc<NonceLedger>,
) -> Result<Arc<dyn NetworkAdapter>> {
    let adapter: Arc<dyn NetworkAdapter> = match environment.network() {
        NetworkIdentity::TenManaged | NetworkIdentity::TenLocal => {
            Arc::new(Ten::new(environment, name, properties, nonces)?)
        }
        NetworkIdentity::Goerli => Arc::new(Goerli::new(environment, name, properties, nonces)?),
        NetworkIdentity::Ganache => Arc::new(Ganache::new(environment, name, properties, nonces)?),
        NetworkIdentity::ArbitrumSepolia => {
            Arc::new(ArbitrumSepolia::new(environment, name, properties, nonces)?)
        }
        NetworkIdentity::Sepolia => Arc::new(Sepolia::new(environment, name, properties, nonces)?),
        _ => Arc::new(DefaultPostLondon::new(environment, name, properties, nonces)?),
    };
    Ok(adapter)
}

/// Adapter for the layer 1 underneath `environment`; a plain post-London
/// connection when the environment is not a layer 2.
pub fn l1_for_environment(
    environment: Environment,
    name: &str,
    properties: &Properties,
    nonces: Arc<NonceLedger>,
) -> Result<Arc<dyn NetworkAdapter>> {
    let adapter: Arc<dyn NetworkAdapter> = match environment.l1_network() {
        NetworkIdentity::TenL1Sepolia => Arc::new(TenL1Sepolia::new(environment, name, properties, nonces)?),
        NetworkIdentity::TenL1Geth => Arc::new(TenL1Geth::new(environment, name, properties, nonces)?),
        _ => Arc::new(DefaultPostLondon::new(environment, name, properties, nonces)?),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemKvStore;

    fn props() -> Properties {
        let mut toml = String::new();
        for env in Environment::ALL {
            toml.push_str(&format!("[env.\"{}\"]\nl1_port_http = 9000\n", env.as_str()));
        }
        Properties::from_toml_str(&toml).unwrap()
    }

    #[test]
    fn test_factory_matches_environment() {
        let props = props();
        let nonces = Arc::new(NonceLedger::new(Arc::new(MemKvStore::new())));
        for env in Environment::ALL {
            let primary = for_environment(env, PRIMARY, &props, nonces.clone()).unwrap();
            assert_eq!(primary.identity(), env.network(), "{env}");
            let l1 = l1_for_environment(env, PRIMARY_L1, &props, nonces.clone()).unwrap();
            assert_eq!(l1.identity(), env.l1_network(), "{env}");
        }
    }

    #[test]
    fn test_ledger_keys_separate_environments() {
        let props = props();
        let nonces = Arc::new(NonceLedger::new(Arc::new(MemKvStore::new())));
        let local = for_environment(Environment::TenLocal, PRIMARY, &props, nonces.clone()).unwrap();
        let sim = for_environment(Environment::TenSim, PRIMARY, &props, nonces).unwrap();
        assert_eq!(local.identity(), sim.identity());
        assert_ne!(local.ledger_key(), sim.ledger_key());
    }
}
