// Scripted in-process wallet used by the integration tests.
// Decodes calldata by selector, keeps balances/allowances/stakes in memory and
// records every request so tests can assert on ordering.

#![allow(dead_code)]

use alloy_primitives::{keccak256, Address, Bloom, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolInterface};
use async_trait::async_trait;
use bonzi_stack::abi::IStakeRouter::IStakeRouterCalls;
use bonzi_stack::abi::IStaking::{self, IStakingCalls};
use bonzi_stack::abi::IERC20::{self, IERC20Calls};
use bonzi_stack::abi::IStakeRouter;
use bonzi_stack::config::Contracts;
use bonzi_stack::error::{ProviderError, CODE_UNRECOGNIZED_CHAIN, CODE_USER_REJECTED};
use bonzi_stack::rpc::{self, Eip1193};
use bonzi_stack::{ContractFacade, ProviderBridge};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ONE: u64 = 1_000_000_000_000_000_000;

pub fn tokens(n: u64) -> U256 {
    U256::from(n) * U256::from(ONE)
}

pub fn owner() -> Address {
    Address::repeat_byte(0xA1)
}

pub fn contracts() -> Contracts {
    Contracts {
        token: Address::repeat_byte(0x70),
        router: Address::repeat_byte(0x7E),
        staking: Address::repeat_byte(0x57),
    }
}

#[derive(Default)]
pub struct MockState {
    pub accounts: Vec<Address>,
    pub chain_id: u64,
    pub decimals: HashMap<Address, u8>,
    pub balances: HashMap<(Address, Address), U256>,
    pub allowances: HashMap<(Address, Address, Address), U256>,
    pub stakes: HashMap<(Address, Address), U256>,
    pub pending_rewards: HashMap<(Address, Address), U256>,
    pub receipts: HashMap<B256, bool>,
    /// Every request in arrival order, e.g. `eth_call:allowance`, `send:approve`, `receipt:approve`.
    pub log: Vec<String>,
    pub tx_names: HashMap<B256, String>,
    /// `(from, to)` of every submitted transaction.
    pub tx_parties: HashMap<B256, (Address, Address)>,
    pub reject_connect: bool,
    pub reject_tx: bool,
    pub fail_calls: bool,
    pub unknown_chain_on_switch: bool,
    pub reject_switch: bool,
    /// Receipts stay `null` for this many polls.
    pub receipt_delay: u32,
    nonce: u64,
}

pub struct MockWallet {
    pub state: Mutex<MockState>,
}

impl MockWallet {
    pub fn new() -> Arc<Self> {
        let c = contracts();
        let mut s = MockState { accounts: vec![owner()], chain_id: 1, ..Default::default() };
        s.decimals.insert(c.token, 18);
        Arc::new(Self { state: Mutex::new(s) })
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut s = self.state.lock().unwrap();
        f(&mut s)
    }

    pub fn log(&self) -> Vec<String> {
        self.with(|s| s.log.clone())
    }

    pub fn count(&self, entry: &str) -> usize {
        self.with(|s| s.log.iter().filter(|e| e.as_str() == entry).count())
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.with(|s| s.log.iter().position(|e| e == entry))
    }
}

/// Short function name for the request log, e.g. `balanceOf`.
fn call_name(data: &[u8]) -> &'static str {
    let known: [([u8; 4], &'static str); 10] = [
        (IERC20::balanceOfCall::SELECTOR, IERC20::balanceOfCall::SIGNATURE),
        (IERC20::decimalsCall::SELECTOR, IERC20::decimalsCall::SIGNATURE),
        (IERC20::allowanceCall::SELECTOR, IERC20::allowanceCall::SIGNATURE),
        (IERC20::approveCall::SELECTOR, IERC20::approveCall::SIGNATURE),
        (IStakeRouter::hardstakeCall::SELECTOR, IStakeRouter::hardstakeCall::SIGNATURE),
        (IStakeRouter::unstakeCall::SELECTOR, IStakeRouter::unstakeCall::SIGNATURE),
        (IStaking::stakesCall::SELECTOR, IStaking::stakesCall::SIGNATURE),
        (IStaking::pendingRewardsCall::SELECTOR, IStaking::pendingRewardsCall::SIGNATURE),
        (IStaking::claimCall::SELECTOR, IStaking::claimCall::SIGNATURE),
        (IStaking::totalStakedCall::SELECTOR, IStaking::totalStakedCall::SIGNATURE),
    ];
    if data.len() < 4 {
        return "unknown";
    }
    known
        .iter()
        .find(|(sel, _)| sel[..] == data[..4])
        .map(|&(_, sig)| sig)
        .and_then(|sig| sig.split('(').next())
        .unwrap_or("unknown")
}

/// Target and calldata of a request object; calldata may sit in `input` or `data`.
fn split_call(tx: &Value) -> (Address, Bytes) {
    let to: Address = serde_json::from_value(tx["to"].clone()).unwrap();
    let data = tx.get("input").or_else(|| tx.get("data")).cloned().unwrap();
    (to, serde_json::from_value(data).unwrap())
}

fn reverted() -> ProviderError {
    ProviderError::rpc(3, "execution reverted")
}

impl MockState {
    fn eth_call(&mut self, tx: &Value) -> Result<Value, ProviderError> {
        let (to, data) = split_call(tx);
        self.log.push(format!("eth_call:{}", call_name(&data)));
        if self.fail_calls {
            return Err(ProviderError::Transport("connection refused".into()));
        }
        let zero = U256::ZERO;
        let out = if let Ok(call) = IERC20Calls::abi_decode(&data, true) {
            match call {
                IERC20Calls::balanceOf(c) => {
                    let balance = *self.balances.get(&(to, c.account)).unwrap_or(&zero);
                    IERC20::balanceOfCall::abi_encode_returns(&(balance,))
                }
                IERC20Calls::decimals(_) => {
                    IERC20::decimalsCall::abi_encode_returns(&(*self.decimals.get(&to).unwrap_or(&18),))
                }
                IERC20Calls::allowance(c) => {
                    let remaining = *self.allowances.get(&(to, c.owner, c.spender)).unwrap_or(&zero);
                    IERC20::allowanceCall::abi_encode_returns(&(remaining,))
                }
                IERC20Calls::approve(_) => return Err(reverted()),
            }
        } else if let Ok(call) = IStakingCalls::abi_decode(&data, true) {
            match call {
                IStakingCalls::stakes(c) => {
                    let staked = *self.stakes.get(&(c.user, c.token)).unwrap_or(&zero);
                    IStaking::stakesCall::abi_encode_returns(&(staked, U256::from(7u64)))
                }
                IStakingCalls::pendingRewards(c) => {
                    let pending = *self.pending_rewards.get(&(c.user, c.token)).unwrap_or(&zero);
                    IStaking::pendingRewardsCall::abi_encode_returns(&(pending,))
                }
                IStakingCalls::totalStaked(c) => {
                    let total = self
                        .stakes
                        .iter()
                        .filter(|((_, t), _)| *t == c.token)
                        .fold(U256::ZERO, |acc, (_, v)| acc + *v);
                    IStaking::totalStakedCall::abi_encode_returns(&(total,))
                }
                IStakingCalls::claim(_) => return Err(reverted()),
            }
        } else {
            return Err(reverted());
        };
        Ok(json!(Bytes::from(out)))
    }

    fn send(&mut self, tx: &Value) -> Result<Value, ProviderError> {
        let from: Address = serde_json::from_value(tx["from"].clone()).unwrap();
        let (to, data) = split_call(tx);
        let name = call_name(&data);
        if self.reject_tx {
            self.log.push(format!("rejected:{name}"));
            return Err(ProviderError::rpc(CODE_USER_REJECTED, "User denied transaction signature."));
        }
        self.log.push(format!("send:{name}"));
        let c = contracts();
        let ok = if let Ok(IERC20Calls::approve(call)) = IERC20Calls::abi_decode(&data, true) {
            self.allowances.insert((to, from, call.spender), call.amount);
            true
        } else if let Ok(call) = IStakeRouterCalls::abi_decode(&data, true) {
            match call {
                IStakeRouterCalls::hardstake(call) => {
                    let (token, amount) = (call.token, call.amount);
                    let allowance = *self.allowances.get(&(token, from, c.router)).unwrap_or(&U256::ZERO);
                    let balance = *self.balances.get(&(token, from)).unwrap_or(&U256::ZERO);
                    // Mirrors transferFrom: reverts when under-approved or underfunded.
                    if allowance < amount || balance < amount {
                        false
                    } else {
                        self.balances.insert((token, from), balance - amount);
                        if allowance != U256::MAX {
                            self.allowances.insert((token, from, c.router), allowance - amount);
                        }
                        *self.stakes.entry((from, token)).or_default() += amount;
                        true
                    }
                }
                IStakeRouterCalls::unstake(call) => {
                    let (token, amount) = (call.token, call.amount);
                    let staked = *self.stakes.get(&(from, token)).unwrap_or(&U256::ZERO);
                    if staked < amount {
                        false
                    } else {
                        self.stakes.insert((from, token), staked - amount);
                        *self.balances.entry((token, from)).or_default() += amount;
                        true
                    }
                }
            }
        } else if let Ok(IStakingCalls::claim(call)) = IStakingCalls::abi_decode(&data, true) {
            self.pending_rewards.insert((from, call.token), U256::ZERO);
            true
        } else {
            false
        };
        self.nonce += 1;
        let hash = keccak256(self.nonce.to_be_bytes());
        self.receipts.insert(hash, ok);
        self.tx_names.insert(hash, name.to_string());
        self.tx_parties.insert(hash, (from, to));
        Ok(json!(hash))
    }

    fn receipt(&mut self, hash: &Value) -> Result<Value, ProviderError> {
        let hash: B256 = serde_json::from_value(hash.clone()).unwrap();
        let name = self.tx_names.get(&hash).cloned().unwrap_or_default();
        if self.receipt_delay > 0 {
            self.receipt_delay -= 1;
            self.log.push(format!("receipt-pending:{name}"));
            return Ok(Value::Null);
        }
        self.log.push(format!("receipt:{name}"));
        let (Some(ok), Some((from, to))) = (self.receipts.get(&hash), self.tx_parties.get(&hash)) else {
            return Ok(Value::Null);
        };
        Ok(json!({
            "type": "0x2",
            "status": if *ok { "0x1" } else { "0x0" },
            "cumulativeGasUsed": "0xb4e8",
            "logs": [],
            "logsBloom": Bloom::default(),
            "transactionHash": hash,
            "transactionIndex": "0x0",
            "blockHash": keccak256(hash),
            "blockNumber": "0x10",
            "gasUsed": "0xb4e8",
            "effectiveGasPrice": "0x3b9aca00",
            "from": from,
            "to": to,
            "contractAddress": null,
        }))
    }
}

#[async_trait]
impl Eip1193 for MockWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        // Let concurrently issued reads interleave like real I/O.
        tokio::task::yield_now().await;
        let mut s = self.state.lock().unwrap();
        match method {
            "eth_requestAccounts" => {
                s.log.push("eth_requestAccounts".into());
                if s.reject_connect {
                    return Err(ProviderError::rpc(CODE_USER_REJECTED, "User rejected the request."));
                }
                Ok(json!(s.accounts))
            }
            "eth_accounts" => Ok(json!(s.accounts)),
            "eth_chainId" => Ok(json!(rpc::to_quantity(s.chain_id))),
            "wallet_switchEthereumChain" => {
                s.log.push("wallet_switchEthereumChain".into());
                if s.reject_switch {
                    return Err(ProviderError::rpc(CODE_USER_REJECTED, "User rejected the request."));
                }
                if s.unknown_chain_on_switch {
                    return Err(ProviderError::rpc(CODE_UNRECOGNIZED_CHAIN, "Unrecognized chain ID"));
                }
                let target = rpc::parse_quantity(&params[0]["chainId"])?;
                s.chain_id = target;
                Ok(Value::Null)
            }
            "eth_call" => s.eth_call(&params[0]),
            "eth_sendTransaction" => s.send(&params[0]),
            "eth_getTransactionReceipt" => s.receipt(&params[0]),
            other => Err(ProviderError::rpc(-32601, format!("method {other} not found"))),
        }
    }
}

pub struct Harness {
    pub wallet: Arc<MockWallet>,
    pub bridge: Arc<ProviderBridge>,
    pub facade: Arc<ContractFacade>,
}

pub fn harness() -> Harness {
    let wallet = MockWallet::new();
    let provider: Arc<dyn Eip1193> = wallet.clone();
    let bridge = Arc::new(ProviderBridge::new(Some(provider)));
    let facade = Arc::new(
        ContractFacade::new(bridge.clone()).with_confirmation(Duration::from_millis(5), Duration::from_secs(5)),
    );
    Harness { wallet, bridge, facade }
}

/// Bridge with no injected provider at all.
pub fn harness_without_provider() -> (Arc<ProviderBridge>, Arc<ContractFacade>) {
    let bridge = Arc::new(ProviderBridge::new(None));
    let facade = Arc::new(ContractFacade::new(bridge.clone()));
    (bridge, facade)
}
