// rpc.rs
// EIP-1193 request surface and a JSON-RPC over HTTP implementation of it.

use crate::error::{ProviderError, CODE_METHOD_NOT_FOUND};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// The one method every wallet provider exposes: `request({ method, params })`.
#[async_trait]
pub trait Eip1193: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

/// Talks to a node over HTTP. Stands in for an injected browser wallet when
/// the node manages unlocked accounts (e.g. a local dev chain).
pub struct JsonRpcProvider {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcProvider {
    pub fn new(url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self { url: url.into(), client, next_id: AtomicU64::new(1) })
    }

    async fn call(&self, method: &str, params: &Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let payload: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        if let Some(err) = payload.get("error") {
            let code = err.get("code").and_then(Value::as_i64).unwrap_or(-32603);
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(ProviderError::Rpc { code, message, data: err.get("data").cloned() });
        }
        payload
            .get("result")
            .cloned()
            .ok_or_else(|| ProviderError::Malformed(format!("{method}: missing result")))
    }
}

#[async_trait]
impl Eip1193 for JsonRpcProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        match self.call(method, &params).await {
            // Plain nodes don't prompt; fall back to the accounts they already manage.
            Err(ProviderError::Rpc { code, .. })
                if code == CODE_METHOD_NOT_FOUND && method == "eth_requestAccounts" =>
            {
                self.call("eth_accounts", &params).await
            }
            other => other,
        }
    }
}

// ---------------------------------------------------------------------
// Hex quantity helpers
// ---------------------------------------------------------------------

pub fn to_quantity(v: u64) -> String {
    format!("0x{v:x}")
}

pub fn parse_quantity(v: &Value) -> Result<u64, ProviderError> {
    match v {
        Value::String(s) => {
            let digits = s.strip_prefix("0x").unwrap_or(s);
            u64::from_str_radix(digits, 16)
                .map_err(|e| ProviderError::Malformed(format!("bad quantity {s}: {e}")))
        }
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ProviderError::Malformed(format!("bad quantity {n}"))),
        other => Err(ProviderError::Malformed(format!("expected quantity, got {other}"))),
    }
}

/// Deserializes a request result into an alloy type (`Bytes`, `B256`, `Vec<Address>`, receipts).
pub fn from_result<T: DeserializeOwned>(v: Value) -> Result<T, ProviderError> {
    serde_json::from_value(v).map_err(|e| ProviderError::Malformed(e.to_string()))
}
