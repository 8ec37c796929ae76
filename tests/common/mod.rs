//! In-process mock of an EVM JSON-RPC node plus a faucet, served with axum.
//!
//! Keeps just enough chain state (balances, nonces, code, one ERC-20 token)
//! for the harness to sign, submit and confirm real transactions against it.

#![allow(dead_code)]

use alloy::consensus::{Transaction as _, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use ten_harness::Account;

pub const CHAIN_ID: u64 = 1337;
pub const GAS_PRICE: u128 = 1_000_000_000;
pub const BASE_FEE: u128 = 1_000_000_000;
pub const TRANSFER_GAS: u64 = 21_000;
pub const CALL_GAS: u64 = 50_000;
pub const CREATE_GAS: u64 = 100_000;
pub const FAUCET_DRIP: u128 = 2_000_000_000_000_000_000;

/// ERC-20 token the mock implements natively.
pub const TOKEN: Address = Address::repeat_byte(0x70);
/// Any call to this address is mined with a failed status.
pub const REVERTER: Address = Address::repeat_byte(0xee);

// anvil / hardhat dev keys
pub const FUNDED_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const L1_FUNDED_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const ACCOUNT_KEYS: [&str; 2] = [
    "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
    "0x7c852118294e51e653712a81e05800f419141751be58f605c371e15141b007a6",
];

pub fn eth(n: u64) -> U256 {
    U256::from(n) * U256::from(1_000_000_000_000_000_000u128)
}

pub fn address_of(key: &str) -> Address {
    Account::from_private_key(key).unwrap().address()
}

#[derive(Debug, Clone)]
pub struct SentTx {
    pub hash: TxHash,
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: u64,
    pub value: U256,
    pub gas_limit: u64,
}

#[derive(Default)]
pub struct ChainState {
    pub block: u64,
    pub balances: HashMap<Address, U256>,
    pub nonces: HashMap<Address, u64>,
    pub code: HashMap<Address, Bytes>,
    pub tokens: HashMap<Address, U256>,
    pub receipts: HashMap<TxHash, Value>,
    pub sent: Vec<SentTx>,
    pub faucet_requests: Vec<String>,
    pub request_ids: Vec<Value>,
    pub methods: Vec<String>,
    /// Receipt lookups hang without ever answering.
    pub stall_receipts: bool,
}

#[derive(Clone)]
pub struct MockNode {
    pub state: Arc<Mutex<ChainState>>,
    pub addr: SocketAddr,
}

impl MockNode {
    pub async fn start(genesis: &[(Address, U256)]) -> Self {
        let mut chain = ChainState { block: 1, ..Default::default() };
        for (address, balance) in genesis {
            chain.balances.insert(*address, *balance);
        }
        let state = Arc::new(Mutex::new(chain));

        let app = Router::new()
            .route("/", post(rpc))
            .route("/faucet", post(faucet))
            .route("/faucet-down", post(faucet_down))
            .with_state(state.clone());
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { state, addr }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn faucet_url(&self) -> String {
        format!("http://{}/faucet", self.addr)
    }

    pub fn balance(&self, address: Address) -> U256 {
        self.state.lock().balances.get(&address).copied().unwrap_or_default()
    }

    pub fn nonce(&self, address: Address) -> u64 {
        self.state.lock().nonces.get(&address).copied().unwrap_or_default()
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.state.lock().balances.insert(address, balance);
    }

    pub fn set_token_balance(&self, address: Address, balance: U256) {
        self.state.lock().tokens.insert(address, balance);
    }

    pub fn token_balance(&self, address: Address) -> U256 {
        self.state.lock().tokens.get(&address).copied().unwrap_or_default()
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().sent.clone()
    }

    pub fn sent_from(&self, from: Address) -> Vec<SentTx> {
        self.sent().into_iter().filter(|tx| tx.from == from).collect()
    }

    /// Forget all deployed code, as after a chain reset.
    pub fn wipe_code(&self) {
        self.state.lock().code.clear();
    }
}

fn quantity(v: impl std::fmt::LowerHex) -> Value {
    Value::String(format!("{v:#x}"))
}

fn param_address(params: &Value, index: usize) -> Address {
    params[index].as_str().and_then(|s| s.parse().ok()).unwrap_or_default()
}

fn call_input(call: &Value) -> Vec<u8> {
    let hex_str = call
        .get("input")
        .or_else(|| call.get("data"))
        .and_then(Value::as_str)
        .unwrap_or("0x");
    alloy::hex::decode(hex_str).unwrap_or_default()
}

fn word_address(word: &[u8]) -> Address {
    Address::from_slice(&word[12..32])
}

fn estimate(call: &Value) -> u64 {
    if call.get("to").map_or(true, Value::is_null) {
        CREATE_GAS
    } else if call_input(call).is_empty() {
        TRANSFER_GAS
    } else {
        CALL_GAS
    }
}

async fn rpc(State(state): State<Arc<Mutex<ChainState>>>, Json(req): Json<Value>) -> Json<Value> {
    let id = req["id"].clone();
    let method = req["method"].as_str().unwrap_or_default().to_string();
    let params = req.get("params").cloned().unwrap_or(Value::Null);

    let stalled = method == "eth_getTransactionReceipt" && state.lock().stall_receipts;
    if stalled {
        std::future::pending::<()>().await;
    }

    let mut chain = state.lock();
    chain.request_ids.push(id.clone());
    chain.methods.push(method.clone());

    let result: std::result::Result<Value, String> = match method.as_str() {
        "eth_chainId" => Ok(quantity(CHAIN_ID)),
        "eth_blockNumber" => Ok(quantity(chain.block)),
        "eth_gasPrice" => Ok(quantity(GAS_PRICE)),
        "eth_maxPriorityFeePerGas" => Ok(quantity(GAS_PRICE)),
        "eth_feeHistory" => Ok(json!({
            "oldestBlock": quantity(chain.block.saturating_sub(1).max(1)),
            "baseFeePerGas": [quantity(BASE_FEE), quantity(BASE_FEE), quantity(BASE_FEE)],
            "gasUsedRatio": [0.5, 0.5],
            "reward": [[quantity(GAS_PRICE)], [quantity(GAS_PRICE)]],
        })),
        "eth_getBalance" => {
            let a = param_address(&params, 0);
            Ok(quantity(chain.balances.get(&a).copied().unwrap_or_default()))
        }
        "eth_getTransactionCount" => {
            let a = param_address(&params, 0);
            Ok(quantity(chain.nonces.get(&a).copied().unwrap_or_default()))
        }
        "eth_estimateGas" => Ok(quantity(estimate(&params[0]))),
        "eth_getCode" => {
            let a = param_address(&params, 0);
            let code = chain.code.get(&a).cloned().unwrap_or_default();
            Ok(Value::String(format!("0x{}", alloy::hex::encode(code))))
        }
        "eth_call" => {
            let input = call_input(&params[0]);
            let to = params[0]["to"].as_str().and_then(|s| s.parse::<Address>().ok());
            if to == Some(TOKEN) && input.len() >= 36 && input[..4] == [0x70, 0xa0, 0x82, 0x31] {
                let holder = word_address(&input[4..36]);
                let balance = chain.tokens.get(&holder).copied().unwrap_or_default();
                Ok(Value::String(format!("0x{}", alloy::hex::encode(balance.to_be_bytes::<32>()))))
            } else {
                Ok(Value::String("0x".into()))
            }
        }
        "eth_sendRawTransaction" => {
            let raw = alloy::hex::decode(params[0].as_str().unwrap_or("0x")).unwrap_or_default();
            apply_transaction(&mut chain, &raw).map(|hash| Value::String(format!("{hash:#x}")))
        }
        "eth_getTransactionReceipt" => {
            let hash: TxHash = params[0].as_str().and_then(|s| s.parse().ok()).unwrap_or_default();
            Ok(chain.receipts.get(&hash).cloned().unwrap_or(Value::Null))
        }
        "obscuro_health" => Ok(json!({ "OverallHealth": true, "Errors": [] })),
        "scan_getTotalTransactionCount" => Ok(quantity(chain.sent.len() as u64)),
        other => Err(format!("the method {other} does not exist/is not available")),
    };

    Json(match result {
        Ok(value) => json!({ "jsonrpc": "2.0", "id": id, "result": value }),
        Err(message) => json!({ "jsonrpc": "2.0", "id": id, "error": { "code": -32601, "message": message } }),
    })
}

fn apply_transaction(chain: &mut ChainState, raw: &[u8]) -> std::result::Result<TxHash, String> {
    let envelope = TxEnvelope::decode_2718(&mut &raw[..]).map_err(|e| format!("undecodable tx: {e}"))?;
    let from = match &envelope {
        TxEnvelope::Legacy(s) => s.signature().recover_address_from_prehash(&s.signature_hash()),
        TxEnvelope::Eip1559(s) => s.signature().recover_address_from_prehash(&s.signature_hash()),
        _ => return Err("unsupported tx type".into()),
    }
    .map_err(|e| format!("bad signature: {e}"))?;
    let hash = *envelope.tx_hash();

    let expected = chain.nonces.get(&from).copied().unwrap_or_default();
    if envelope.nonce() != expected {
        return Err(format!("invalid nonce: got {}, expected {expected}", envelope.nonce()));
    }

    let to = envelope.to();
    let input = envelope.input().clone();
    let value = envelope.value();
    let price = envelope.gas_price().unwrap_or(BASE_FEE + envelope.max_priority_fee_per_gas().unwrap_or(0));
    let gas_used = match to {
        None => CREATE_GAS,
        Some(_) if input.is_empty() => TRANSFER_GAS,
        Some(_) => CALL_GAS,
    }
    .min(envelope.gas_limit());
    let fee = U256::from(gas_used) * U256::from(price);

    let balance = chain.balances.get(&from).copied().unwrap_or_default();
    if balance < value + fee {
        return Err("insufficient funds for gas * price + value".into());
    }

    chain.nonces.insert(from, expected + 1);
    chain.block += 1;
    let mut success = to != Some(REVERTER);
    let mut contract_address = None;

    if success && to == Some(TOKEN) && input.len() >= 68 && input[..4] == [0xa9, 0x05, 0x9c, 0xbb] {
        let recipient = word_address(&input[4..36]);
        let amount = U256::from_be_slice(&input[36..68]);
        let held = chain.tokens.get(&from).copied().unwrap_or_default();
        if held >= amount {
            chain.tokens.insert(from, held - amount);
            *chain.tokens.entry(recipient).or_default() += amount;
        } else {
            success = false;
        }
    }
    if success && to.is_none() {
        let created = from.create(expected);
        chain.code.insert(created, input.clone());
        contract_address = Some(created);
    }

    let charged = if success { value + fee } else { fee };
    chain.balances.insert(from, balance - charged);
    if success {
        if let Some(to) = to {
            *chain.balances.entry(to).or_default() += value;
        }
    }

    let tx_type: u8 = envelope.tx_type().into();
    let receipt = json!({
        "type": quantity(tx_type),
        "status": if success { "0x1" } else { "0x0" },
        "cumulativeGasUsed": quantity(gas_used),
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "transactionHash": format!("{hash:#x}"),
        "transactionIndex": "0x0",
        "blockHash": format!("{:#x}", B256::with_last_byte((chain.block % 256) as u8)),
        "blockNumber": quantity(chain.block),
        "gasUsed": quantity(gas_used),
        "effectiveGasPrice": quantity(price),
        "from": format!("{from:#x}"),
        "to": to.map(|a| format!("{a:#x}")),
        "contractAddress": contract_address.map(|a| format!("{a:#x}")),
    });
    chain.receipts.insert(hash, receipt);
    chain.sent.push(SentTx { hash, from, to, nonce: expected, value, gas_limit: envelope.gas_limit() });
    Ok(hash)
}

async fn faucet(State(state): State<Arc<Mutex<ChainState>>>, Json(body): Json<Value>) -> StatusCode {
    let Some(address) = body["address"].as_str() else { return StatusCode::BAD_REQUEST };
    let Ok(parsed) = address.parse::<Address>() else { return StatusCode::BAD_REQUEST };
    let mut chain = state.lock();
    chain.faucet_requests.push(address.to_string());
    *chain.balances.entry(parsed).or_default() += U256::from(FAUCET_DRIP);
    StatusCode::OK
}

async fn faucet_down() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

/// Properties TOML for `env` pointing at `node` (and `l1` for the layer 1).
/// An endpoint that accepts connections and never writes a byte back.
pub async fn silent_endpoint() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

pub fn properties(env: &str, ledger_dir: &std::path::Path, node: &MockNode, l1: Option<&MockNode>, faucet: Option<String>) -> String {
    let mut toml = format!(
        r#"
ledger_dir = "{ledger}"

[funding]
min_balance_eth = 0.5
fund_amount_eth = 1.0

[env."{env}"]
rpc_url = "{url}"
block_time_secs = 0.05
funded_account_pk = "{funded}"
l1_funded_account_pk = "{l1_funded}"
accounts = ["{a0}", "{a1}"]
"#,
        ledger = ledger_dir.display(),
        url = node.url(),
        funded = FUNDED_KEY,
        l1_funded = L1_FUNDED_KEY,
        a0 = ACCOUNT_KEYS[0],
        a1 = ACCOUNT_KEYS[1],
    );
    if let Some(l1) = l1 {
        toml.push_str(&format!("l1_rpc_url = \"{}\"\nl1_block_time_secs = 0.05\n", l1.url()));
    }
    if let Some(url) = faucet {
        toml.push_str(&format!("faucet_url = \"{url}\"\n"));
    }
    toml
}
