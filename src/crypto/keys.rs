use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::fmt;

use crate::utils::{HarnessError, Result};

/// A signing account: the address plus the key material behind it.
/// Never mutated once built; cloning shares nothing mutable.
#[derive(Clone)]
pub struct Account {
    signer: PrivateKeySigner,
    address: Address,
}

impl Account {
    /// Parse a hex private key, with or without `0x`.
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|e| HarnessError::InvalidKey(format!("{e}")))?;
        let address = signer.address();
        Ok(Self { signer, address })
    }

    /// Generate a new random account (ephemeral per-test accounts)
    pub fn random() -> Self {
        let signer = PrivateKeySigner::random();
        let address = signer.address();
        Self { signer, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }

    /// Export secret as 0x-prefixed hex
    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.signer.to_bytes()))
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account").field("address", &self.address).finish_non_exhaustive()
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Account {}

#[cfg(test)]
mod tests {
    use super::*;

    // well known dev key (hardhat/anvil account 0)
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_address_derivation() {
        let account = Account::from_private_key(DEV_KEY).unwrap();
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(account.address(), expected);

        let no_prefix = Account::from_private_key(DEV_KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(no_prefix, account);
        assert_eq!(account.private_key_hex(), DEV_KEY);
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(matches!(Account::from_private_key("0xzz"), Err(HarnessError::InvalidKey(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let account = Account::random();
        let shown = format!("{account:?}");
        assert!(!shown.contains(&account.private_key_hex()[2..]));
    }
}
