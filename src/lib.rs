//! Shared runtime for the Ten end-to-end test suite.
//!
//! Gives every test a funded account, a network adapter for the chain under
//! test, and durable ledgers (nonces, funds, contracts, counts, results)
//! shared by every test process on the machine.

pub mod utils;
pub mod storage;
pub mod config;
pub mod crypto;
pub mod rpc;
pub mod networks;
pub mod persistence;
pub mod funding;
pub mod harness;
pub mod cli;

pub use config::Properties;
pub use crypto::Account;
pub use funding::{Erc20, Funder};
pub use harness::{TestContext, TestCost};
pub use networks::{Connection, ContractCall, Environment, NetworkAdapter, NetworkIdentity, NonceMode};
pub use persistence::Ledgers;
pub use utils::{HarnessError, Result};
