//! ERC-20 access through the bundled JSON ABI.

use alloy::dyn_abi::{DynSolType, DynSolValue, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi};
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, U256};
use alloy::rpc::types::TransactionRequest;
use std::path::Path;
use std::sync::Arc;

use crate::networks::{Connection, ContractCall};
use crate::utils::{HarnessError, Result};

/// Standard ERC-20 interface, shipped with the crate.
pub const ERC20_ABI: &str = include_str!("../../fixtures/erc20.json");

/// A deployed ERC-20 token.
#[derive(Clone, Debug)]
pub struct Erc20 {
    pub name: String,
    pub address: Address,
    abi: Arc<JsonAbi>,
}

impl Erc20 {
    pub fn new(name: impl Into<String>, address: Address) -> Result<Self> {
        Self::with_abi(name, address, ERC20_ABI)
    }

    /// Use an ABI file from the test project instead of the bundled one.
    pub fn from_file(name: impl Into<String>, address: Address, abi_path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(abi_path)?;
        Self::with_abi(name, address, &json)
    }

    fn with_abi(name: impl Into<String>, address: Address, json: &str) -> Result<Self> {
        let abi: JsonAbi = serde_json::from_str(json).map_err(|e| HarnessError::Abi(e.to_string()))?;
        Ok(Self { name: name.into(), address, abi: Arc::new(abi) })
    }

    fn function(&self, name: &str) -> Result<&Function> {
        self.abi
            .function(name)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| HarnessError::Abi(format!("{} has no function {name}", self.name)))
    }

    /// `transfer(to, amount)` as a call ready for `NetworkAdapter::transact`.
    pub fn transfer_call(&self, to: Address, amount: U256) -> Result<ContractCall> {
        let data = self
            .function("transfer")?
            .abi_encode_input(&[DynSolValue::Address(to), DynSolValue::Uint(amount, 256)])
            .map_err(|e| HarnessError::Abi(e.to_string()))?;
        Ok(ContractCall::new(self.address, data))
    }

    pub fn balance_of_request(&self, holder: Address) -> Result<TransactionRequest> {
        let data = self
            .function("balanceOf")?
            .abi_encode_input(&[DynSolValue::Address(holder)])
            .map_err(|e| HarnessError::Abi(e.to_string()))?;
        Ok(TransactionRequest::default().with_to(self.address).with_input(data))
    }

    /// Token balance of `holder`, read through `conn`.
    pub async fn balance_of(&self, conn: &Connection, holder: Address) -> Result<U256> {
        let output = conn.call(self.balance_of_request(holder)?).await?;
        decode_uint(&output)
    }
}

fn decode_uint(output: &[u8]) -> Result<U256> {
    let value = DynSolType::Uint(256).abi_decode(output).map_err(|e| HarnessError::Abi(e.to_string()))?;
    value
        .as_uint()
        .map(|(v, _)| v)
        .ok_or_else(|| HarnessError::Abi("expected a uint256 return value".into()))
}
