use alloy::primitives::Address;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::utils::metrics::FAUCET_REQUESTS;
use crate::utils::{HarnessError, Result, METRICS};

/// Client for the faucet service of a managed Ten deployment.
///
/// The faucet decides how much to credit; a request only names the address.
#[derive(Clone, Debug)]
pub struct FaucetClient {
    url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl FaucetClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self { url: url.into(), timeout, http: reqwest::Client::new() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `POST {"address": ...}`; anything but a 2xx is an error.
    pub async fn request(&self, address: Address) -> Result<()> {
        METRICS.inc_counter(FAUCET_REQUESTS);
        let response = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .json(&json!({ "address": address.to_checksum(None) }))
            .send()
            .await
            .map_err(|e| HarnessError::Faucet { url: self.url.clone(), message: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarnessError::Faucet { url: self.url.clone(), message: format!("{status}: {body}") });
        }
        info!(%address, url = %self.url, "faucet funded account");
        Ok(())
    }
}
