use alloy_primitives::Address;
use serde_json::Value;
use thiserror::Error;

/// EIP-1193 code for a request the user dismissed in the wallet prompt.
pub const CODE_USER_REJECTED: i64 = 4001;
/// EIP-1193 code returned by `wallet_switchEthereumChain` for an unknown chain.
pub const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;
/// JSON-RPC "method not found".
pub const CODE_METHOD_NOT_FOUND: i64 = -32601;
/// Geth-style execution revert carried by `eth_call` / `eth_estimateGas`.
pub const CODE_EXECUTION_REVERTED: i64 = 3;

/// Raw failure coming back from a wallet provider, before classification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("provider transport failed: {0}")]
    Transport(String),
    #[error("provider returned error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        ProviderError::Rpc { code, message: message.into(), data: None }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            ProviderError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    fn is_user_rejection(&self) -> bool {
        match self {
            ProviderError::Rpc { code, message, .. } => {
                *code == CODE_USER_REJECTED
                    || message.contains("ACTION_REJECTED")
                    || message.to_ascii_lowercase().contains("user rejected")
                    || message.to_ascii_lowercase().contains("user denied")
            }
            _ => false,
        }
    }
}

/// Every failure a user-triggered flow can end in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("no wallet provider detected")]
    ProviderAbsent,
    #[error("request cancelled in the wallet")]
    UserRejected,
    #[error("wrong network: expected chain {expected}, wallet is on {actual}")]
    WrongNetwork { expected: u64, actual: u64 },
    #[error("chain {0} is not available in the wallet")]
    UnsupportedChain(u64),
    #[error("{0}")]
    ContractCallReverted(String),
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("wallet not connected")]
    NotConnected,
    #[error("wallet account changed from {from} to {to}")]
    AccountChanged { from: Address, to: Address },
    #[error("another action is already in progress")]
    Busy,
}

impl From<ProviderError> for WalletError {
    fn from(e: ProviderError) -> Self {
        if e.is_user_rejection() {
            return WalletError::UserRejected;
        }
        match e {
            ProviderError::Rpc { code, message, data } => {
                let lower = message.to_ascii_lowercase();
                if code == CODE_EXECUTION_REVERTED || lower.contains("revert") {
                    WalletError::ContractCallReverted(revert_reason(&message, data.as_ref()))
                } else {
                    WalletError::NetworkUnreachable(message)
                }
            }
            ProviderError::Transport(msg) | ProviderError::Malformed(msg) => {
                WalletError::NetworkUnreachable(msg)
            }
        }
    }
}

/// Extracts the human-readable part of a revert message ("execution reverted: X" -> "X").
fn revert_reason(message: &str, data: Option<&Value>) -> String {
    if let Some((_, reason)) = message.split_once("reverted:") {
        let reason = reason.trim();
        if !reason.is_empty() {
            return reason.to_string();
        }
    }
    if let Some(Value::Object(obj)) = data {
        if let Some(Value::String(reason)) = obj.get("reason") {
            return reason.clone();
        }
    }
    message.trim().to_string()
}
