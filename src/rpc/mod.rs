//! RPC module
//!
//! - JSON-RPC 2.0 envelope client for the node's `scan_*`/`obscuro_*` methods
//! - Application errors are logged and surface as `None`
//!
//! Standard `eth_*` traffic goes through the alloy provider on each connection.

pub mod client;

pub use client::{http_client, JsonRpcClient};
