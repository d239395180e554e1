// staking.rs
//! Stake / unstake / claim sequencing.
//!
//! One action at a time per workflow instance. A stake reads the router's
//! allowance first and, when it falls short, approves the maximum amount and
//! waits for that approval to confirm before the stake is submitted. Every
//! transaction is sent from the account that started the action; if the
//! wallet switches accounts mid-way the action stops before its next write.
//! Every action ends with a fresh read of the position so the panels never
//! show amounts from before the transaction.

use crate::config::Contracts;
use crate::contracts::{ContractFacade, PendingTx, PositionSnapshot, TxKind};
use crate::error::WalletError;
use crate::units;
use alloy_primitives::{Address, U256};
use alloy_rpc_types_eth::TransactionReceipt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Stake,
    Unstake,
    Claim,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Stake => "stake",
            Action::Unstake => "unstake",
            Action::Claim => "claim",
        }
    }

    pub fn needs_amount(self) -> bool {
        !matches!(self, Action::Claim)
    }

    fn tx_kind(self) -> TxKind {
        match self {
            Action::Stake => TxKind::Stake,
            Action::Unstake => TxKind::Unstake,
            Action::Claim => TxKind::Claim,
        }
    }
}

/// Loading-overlay steps reported while an action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Preparing(Action),
    Approving,
    Submitting(Action),
    Refreshing,
}

impl Progress {
    pub fn message(self) -> &'static str {
        match self {
            Progress::Preparing(Action::Stake) => "Preparing stake...",
            Progress::Preparing(Action::Unstake) => "Preparing unstake...",
            Progress::Preparing(Action::Claim) => "Preparing claim...",
            Progress::Approving => "Approving tokens...",
            Progress::Submitting(Action::Stake) => "Staking tokens...",
            Progress::Submitting(Action::Unstake) => "Unstaking tokens...",
            Progress::Submitting(Action::Claim) => "Claiming rewards...",
            Progress::Refreshing => "Refreshing balances...",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionReport {
    pub action: Action,
    pub owner: Address,
    pub amount: Option<U256>,
    pub approval: Option<TransactionReceipt>,
    pub receipt: TransactionReceipt,
    /// `None` when the post-confirmation read failed or the wallet moved to
    /// another account; the action itself still succeeded.
    pub snapshot: Option<PositionSnapshot>,
}

/// Clears the in-flight flag on every exit path.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct StakeWorkflow {
    facade: Arc<ContractFacade>,
    contracts: Contracts,
    chain_id: u64,
    symbol: String,
    in_flight: AtomicBool,
    writes: AtomicU64,
}

impl StakeWorkflow {
    pub fn new(facade: Arc<ContractFacade>, contracts: Contracts, chain_id: u64, symbol: impl Into<String>) -> Self {
        Self { facade, contracts, chain_id, symbol: symbol.into(), in_flight: AtomicBool::new(false), writes: AtomicU64::new(0) }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Bumped whenever an action starts. Reads stamped with an older value
    /// may have overlapped a write and must not be displayed.
    pub fn write_epoch(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }

    pub fn contracts(&self) -> &Contracts {
        &self.contracts
    }

    fn begin(&self) -> Result<InFlight<'_>, WalletError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| {
                self.writes.fetch_add(1, Ordering::AcqRel);
                InFlight(&self.in_flight)
            })
            .map_err(|_| WalletError::Busy)
    }

    /// The wallet must still expose the account the action started with.
    fn ensure_owner(&self, owner: Address) -> Result<(), WalletError> {
        let current = self.facade.bridge().session().owner()?;
        if current != owner {
            eprintln!("⚠️  Account changed mid-action: {} -> {}", units::short_address(&owner), units::short_address(&current));
            return Err(WalletError::AccountChanged { from: owner, to: current });
        }
        Ok(())
    }

    /// Runs `action` to confirmation. `amount` is the raw input text (ignored for claims).
    pub async fn run(
        &self,
        action: Action,
        amount: Option<&str>,
        on_progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Result<ActionReport, WalletError> {
        let _guard = self.begin()?;

        // Everything that can be rejected locally is rejected before the first chain call.
        let input = if action.needs_amount() {
            let s = amount.map(str::trim).unwrap_or("");
            units::precheck_amount(s)?;
            Some(s)
        } else {
            None
        };
        let session = self.facade.bridge().session();
        let owner = session.owner()?;
        match session.chain_id {
            Some(id) if id == self.chain_id => {}
            Some(actual) => return Err(WalletError::WrongNetwork { expected: self.chain_id, actual }),
            None => return Err(WalletError::NotConnected),
        }

        on_progress(Progress::Preparing(action));
        let value = match input {
            Some(s) => {
                let decimals = self.facade.token_decimals(self.contracts.token).await?;
                Some(units::parse_amount(s, decimals)?)
            }
            None => None,
        };

        let approval = match (action, value) {
            (Action::Stake, Some(v)) => self.ensure_allowance(owner, v, on_progress).await?,
            _ => None,
        };

        self.ensure_owner(owner)?;
        on_progress(Progress::Submitting(action));
        let tx = self.submit(owner, action, value).await?;
        let receipt = self.facade.wait(&tx).await?;

        on_progress(Progress::Refreshing);
        let on_chain = self.facade.bridge().session().chain_id == Some(self.chain_id);
        let snapshot = if !on_chain || self.ensure_owner(owner).is_err() {
            None
        } else {
            match self.facade.read_position(&self.contracts, owner, &self.symbol).await {
                Ok(s) => Some(s),
                Err(e) => {
                    eprintln!("⚠️  Refresh after {} failed: {}", action.as_str(), e);
                    None
                }
            }
        };

        Ok(ActionReport { action, owner, amount: value, approval, receipt, snapshot })
    }

    /// Approves `U256::MAX` when the router's allowance is below `needed`, and waits for it.
    async fn ensure_allowance(
        &self,
        owner: Address,
        needed: U256,
        on_progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Result<Option<TransactionReceipt>, WalletError> {
        self.ensure_owner(owner)?;
        let allowance = self.facade.allowance(self.contracts.token, owner, self.contracts.router).await?;
        if allowance >= needed {
            return Ok(None);
        }
        self.ensure_owner(owner)?;
        on_progress(Progress::Approving);
        let tx = self.facade.approve(owner, self.contracts.token, self.contracts.router, U256::MAX).await?;
        let receipt = self.facade.wait(&tx).await?;
        Ok(Some(receipt))
    }

    async fn submit(&self, owner: Address, action: Action, value: Option<U256>) -> Result<PendingTx, WalletError> {
        let c = &self.contracts;
        let tx = match (action, value) {
            (Action::Stake, Some(v)) => self.facade.stake(owner, c.router, c.token, v).await?,
            (Action::Unstake, Some(v)) => self.facade.unstake(owner, c.router, c.token, v).await?,
            (Action::Claim, _) => self.facade.claim(owner, c.staking, c.token).await?,
            (_, None) => return Err(WalletError::InvalidAmount("amount is empty".into())),
        };
        debug_assert_eq!(tx.kind, action.tx_kind());
        Ok(tx)
    }
}
