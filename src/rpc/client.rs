use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error};

use crate::networks::NetworkIdentity;
use crate::utils::{HarnessError, Result};

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    params: Value,
    id: u64,
}

/// JSON-RPC 2.0 response envelope
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    #[serde(default)]
    code: i64,
    message: String,
}

/// Raw JSON-RPC client for node methods alloy has no binding for.
///
/// Each client owns its message-id counter; ids are unique per client only.
pub struct JsonRpcClient {
    url: String,
    network: NetworkIdentity,
    http: reqwest::Client,
    next_id: AtomicU64,
}

/// HTTP client whose every request fails once `timeout` has passed.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| HarnessError::Config(format!("http client: {e}")))
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, network: NetworkIdentity, timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(url, network, http_client(timeout)?))
    }

    /// Share an existing HTTP client, e.g. the one behind a connection's provider.
    pub fn with_client(url: impl Into<String>, network: NetworkIdentity, http: reqwest::Client) -> Self {
        Self { url: url.into(), network, http, next_id: AtomicU64::new(1) }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Post `method` with `params` and unwrap the envelope.
    ///
    /// An `error` object is logged and yields `Ok(None)`; only transport
    /// failures are errors.
    pub async fn request(&self, method: &str, params: Value) -> Result<Option<Value>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest { jsonrpc: "2.0", method, params, id };
        debug!(method, id, url = %self.url, "json-rpc request");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| HarnessError::transport(self.network, e))?;
        let envelope: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| HarnessError::transport(self.network, e))?;

        if let Some(err) = envelope.error {
            error!(method, code = err.code, "{}", err.message);
            return Ok(None);
        }
        Ok(envelope.result)
    }

    pub async fn obscuro_health(&self) -> Result<Option<Value>> {
        self.request("obscuro_health", Value::Null).await
    }

    pub async fn obscuro_config(&self) -> Result<Option<Value>> {
        self.request("obscuro_config", Value::Null).await
    }

    pub async fn scan_total_transaction_count(&self) -> Result<Option<Value>> {
        self.request("scan_getTotalTransactionCount", json!([])).await
    }

    pub async fn scan_batch_listing(&self, offset: u64, size: u64) -> Result<Option<Value>> {
        self.request("scan_getBatchListing", json!([{ "offset": offset, "size": size }])).await
    }

    /// Relevancy of the logs matching one event signature emitted by `address`.
    pub async fn debug_event_log_relevancy(
        &self,
        address: &str,
        signature: &str,
        from_block: &str,
        to_block: &str,
    ) -> Result<Option<Value>> {
        let filter = json!([{
            "fromBlock": from_block,
            "toBlock": to_block,
            "address": address,
            "topics": [signature],
        }]);
        self.request("debug_eventLogRelevancy", filter).await
    }
}
