//! Crypto module: test account keys.
//!
//! Keys are pre-distributed through the properties file or generated per test;
//! signing itself goes through the alloy wallet built from the account.

pub mod keys;

pub use keys::Account;
