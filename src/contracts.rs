// contracts.rs
// Contract facade: typed reads and writes against the token, router and staking contracts.
// Amounts are raw base units (U256) on both sides of this boundary.

use crate::abi::{self, IStakeRouter, IStaking, IERC20};
use crate::config::Contracts;
use crate::error::WalletError;
use crate::rpc;
use crate::units;
use crate::wallet::ProviderBridge;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rpc_types_eth::{TransactionInput, TransactionReceipt, TransactionRequest};
use alloy_sol_types::SolCall;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    Approve,
    Stake,
    Unstake,
    Claim,
}

impl TxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TxKind::Approve => "approve",
            TxKind::Stake => "stake",
            TxKind::Unstake => "unstake",
            TxKind::Claim => "claim",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitted transaction. State is unchanged until [`ContractFacade::wait`] confirms it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    pub hash: B256,
    pub kind: TxKind,
}

/// `stakes(user, token)` return value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StakeInfo {
    pub amount: U256,
    pub reward_debt: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalanceSnapshot {
    pub token: Address,
    pub raw_balance: U256,
    pub decimals: u8,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakePosition {
    pub owner: Address,
    pub token: Address,
    pub staked_amount: U256,
    pub pending_reward_wei: U256,
}

/// Everything the stake/earn panels display, read in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSnapshot {
    pub balance: TokenBalanceSnapshot,
    pub position: StakePosition,
    pub total_staked: U256,
}

pub struct ContractFacade {
    bridge: Arc<ProviderBridge>,
    decimals: Mutex<HashMap<Address, u8>>,
    poll_interval: Duration,
    confirm_timeout: Duration,
}

impl ContractFacade {
    pub fn new(bridge: Arc<ProviderBridge>) -> Self {
        Self {
            bridge,
            decimals: Mutex::new(HashMap::new()),
            poll_interval: Duration::from_millis(1_500),
            confirm_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_confirmation(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.confirm_timeout = timeout;
        self
    }

    pub fn from_config(bridge: Arc<ProviderBridge>, chain: &crate::config::Chain) -> Self {
        Self::new(bridge).with_confirmation(
            Duration::from_millis(chain.confirmation_poll_ms),
            Duration::from_secs(chain.confirmation_timeout_secs),
        )
    }

    pub fn bridge(&self) -> &Arc<ProviderBridge> {
        &self.bridge
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Bytes, WalletError> {
        crate::metrics::CONTRACT_READS.inc();
        let params = json!([tx_request(None, to, data), "latest"]);
        let res = self
            .bridge
            .request("eth_call", params)
            .await
            .and_then(|v| rpc::from_result::<Bytes>(v).map_err(WalletError::from));
        if res.is_err() {
            crate::metrics::CONTRACT_READ_FAILURES.inc();
        }
        res
    }

    async fn read<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return, WalletError> {
        let out = self.call(to, call.abi_encode()).await?;
        abi::decode_returns::<C>(&out)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, WalletError> {
        Ok(self.read(token, IERC20::balanceOfCall { account: owner }).await?.balance)
    }

    /// Cached per token address for the life of the facade. Tokens reporting
    /// more decimals than a 256-bit amount can scale are refused.
    pub async fn token_decimals(&self, token: Address) -> Result<u8, WalletError> {
        if let Some(d) = self.decimals.lock().ok().and_then(|m| m.get(&token).copied()) {
            return Ok(d);
        }
        let d = self.read(token, IERC20::decimalsCall {}).await?.decimals;
        if d > units::MAX_DECIMALS {
            return Err(WalletError::ContractCallReverted(format!(
                "token {token} reports {d} decimals, more than {} are not supported",
                units::MAX_DECIMALS
            )));
        }
        if let Ok(mut m) = self.decimals.lock() {
            m.insert(token, d);
        }
        Ok(d)
    }

    pub async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256, WalletError> {
        Ok(self.read(token, IERC20::allowanceCall { owner, spender }).await?.remaining)
    }

    pub async fn stake_info(&self, staking: Address, owner: Address, token: Address) -> Result<StakeInfo, WalletError> {
        let r = self.read(staking, IStaking::stakesCall { user: owner, token }).await?;
        Ok(StakeInfo { amount: r.amount, reward_debt: r.rewardDebt })
    }

    pub async fn pending_rewards(&self, staking: Address, owner: Address, token: Address) -> Result<U256, WalletError> {
        Ok(self.read(staking, IStaking::pendingRewardsCall { user: owner, token }).await?.pending)
    }

    pub async fn total_staked(&self, staking: Address, token: Address) -> Result<U256, WalletError> {
        Ok(self.read(staking, IStaking::totalStakedCall { token }).await?.total)
    }

    /// The full read set behind the stake/earn panels. Reads are independent and run concurrently.
    pub async fn read_position(
        &self,
        contracts: &Contracts,
        owner: Address,
        symbol: &str,
    ) -> Result<PositionSnapshot, WalletError> {
        let (decimals, balance, info, pending, total) = tokio::try_join!(
            self.token_decimals(contracts.token),
            self.token_balance(contracts.token, owner),
            self.stake_info(contracts.staking, owner, contracts.token),
            self.pending_rewards(contracts.staking, owner, contracts.token),
            self.total_staked(contracts.staking, contracts.token),
        )?;
        Ok(PositionSnapshot {
            balance: TokenBalanceSnapshot {
                token: contracts.token,
                raw_balance: balance,
                decimals,
                symbol: symbol.to_string(),
            },
            position: StakePosition {
                owner,
                token: contracts.token,
                staked_amount: info.amount,
                pending_reward_wei: pending,
            },
            total_staked: total,
        })
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Every write names its sender; the wallet signs from `from` or refuses.
    async fn send(&self, kind: TxKind, from: Address, to: Address, data: Vec<u8>) -> Result<PendingTx, WalletError> {
        let params = json!([tx_request(Some(from), to, data)]);
        let hash = match self.bridge.request("eth_sendTransaction", params).await {
            Ok(v) => rpc::from_result::<B256>(v).map_err(WalletError::from)?,
            Err(e) => {
                crate::metrics::TX_FAILED.inc();
                return Err(e);
            }
        };
        crate::metrics::TX_SUBMITTED.with_label_values(&[kind.as_str()]).inc();
        crate::stack_log!("📤 {} submitted from {}: {}", kind, units::short_address(&from), hash);
        Ok(PendingTx { hash, kind })
    }

    pub async fn approve(&self, from: Address, token: Address, spender: Address, amount: U256) -> Result<PendingTx, WalletError> {
        let data = IERC20::approveCall { spender, amount }.abi_encode();
        self.send(TxKind::Approve, from, token, data).await
    }

    /// Router `hardstake(token, amount)`.
    pub async fn stake(&self, from: Address, router: Address, token: Address, amount: U256) -> Result<PendingTx, WalletError> {
        let data = IStakeRouter::hardstakeCall { token, amount }.abi_encode();
        self.send(TxKind::Stake, from, router, data).await
    }

    pub async fn unstake(&self, from: Address, router: Address, token: Address, amount: U256) -> Result<PendingTx, WalletError> {
        let data = IStakeRouter::unstakeCall { token, amount }.abi_encode();
        self.send(TxKind::Unstake, from, router, data).await
    }

    pub async fn claim(&self, from: Address, staking: Address, token: Address) -> Result<PendingTx, WalletError> {
        let data = IStaking::claimCall { token }.abi_encode();
        self.send(TxKind::Claim, from, staking, data).await
    }

    /// Polls for the receipt until it lands, reverts, or the confirmation timeout passes.
    pub async fn wait(&self, tx: &PendingTx) -> Result<TransactionReceipt, WalletError> {
        let started = Instant::now();
        loop {
            let v = self
                .bridge
                .request("eth_getTransactionReceipt", json!([tx.hash]))
                .await
                .inspect_err(|_| crate::metrics::TX_FAILED.inc())?;
            let receipt = rpc::from_result::<Option<TransactionReceipt>>(v).map_err(WalletError::from)?;
            if let Some(receipt) = receipt {
                return self.settle(tx, receipt);
            }
            if started.elapsed() >= self.confirm_timeout {
                crate::metrics::TX_FAILED.inc();
                return Err(WalletError::NetworkUnreachable(format!(
                    "{} {} not confirmed after {}s",
                    tx.kind,
                    tx.hash,
                    self.confirm_timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn settle(&self, tx: &PendingTx, receipt: TransactionReceipt) -> Result<TransactionReceipt, WalletError> {
        if !receipt.status() {
            crate::metrics::TX_FAILED.inc();
            eprintln!("❌ {} reverted: {}", tx.kind, tx.hash);
            return Err(WalletError::ContractCallReverted(format!("{} transaction reverted", tx.kind)));
        }
        crate::metrics::TX_CONFIRMED.inc();
        crate::stack_log!("✅ {} confirmed: {}", tx.kind, tx.hash);
        Ok(receipt)
    }
}

/// `data` and `input` both carry the calldata; wallets differ in which one they read.
fn tx_request(from: Option<Address>, to: Address, data: Vec<u8>) -> TransactionRequest {
    TransactionRequest {
        from,
        to: Some(to.into()),
        input: TransactionInput::both(Bytes::from(data)),
        ..Default::default()
    }
}
