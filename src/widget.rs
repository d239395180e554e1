// widget.rs
// Widget shell: owns the buy/stake/earn view state and routes user actions
// through the bridge, the facade and the staking workflow.

use crate::config::{Config, Contracts};
use crate::contracts::{ContractFacade, PositionSnapshot};
use crate::embed::EmbedConfig;
use crate::error::WalletError;
use crate::gate::network_name;
use crate::staking::{Action, Progress, StakeWorkflow};
use crate::units;
use crate::wallet::{ProviderBridge, SessionEvent};
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

pub const CONNECT_LABEL: &str = "Connect Wallet";
pub const EMPTY_STAT: &str = "--";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Buy,
    Stake,
    Earn,
}

impl Tab {
    pub fn parse(s: &str) -> Option<Tab> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(Tab::Buy),
            "stake" => Some(Tab::Stake),
            "earn" => Some(Tab::Earn),
            _ => None,
        }
    }

    fn reads_chain(self) -> bool {
        matches!(self, Tab::Stake | Tab::Earn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

/// Everything the widget renders. Cloned out for display; mutated only by the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetView {
    pub tab: Tab,
    pub loading: Option<String>,
    pub connect_label: String,
    pub actions_enabled: bool,
    pub amount_input: String,
    pub balance_label: String,
    pub staked_label: String,
    pub total_staked_label: String,
    pub rewards_label: String,
    pub snapshot: Option<PositionSnapshot>,
    pub alerts: Vec<Alert>,
}

impl Default for WidgetView {
    fn default() -> Self {
        Self {
            tab: Tab::Buy,
            loading: None,
            connect_label: CONNECT_LABEL.to_string(),
            actions_enabled: false,
            amount_input: String::new(),
            balance_label: EMPTY_STAT.to_string(),
            staked_label: EMPTY_STAT.to_string(),
            total_staked_label: EMPTY_STAT.to_string(),
            rewards_label: EMPTY_STAT.to_string(),
            snapshot: None,
            alerts: Vec::new(),
        }
    }
}

impl WidgetView {
    pub fn last_alert(&self) -> Option<&Alert> {
        self.alerts.last()
    }

    fn clear_stats(&mut self) {
        self.snapshot = None;
        self.balance_label = EMPTY_STAT.to_string();
        self.staked_label = EMPTY_STAT.to_string();
        self.total_staked_label = EMPTY_STAT.to_string();
        self.rewards_label = EMPTY_STAT.to_string();
    }

    fn apply(&mut self, snap: PositionSnapshot) {
        let d = snap.balance.decimals;
        let sym = &snap.balance.symbol;
        self.balance_label = format!("{} {}", units::format_compact(snap.balance.raw_balance, d), sym);
        self.staked_label = format!("{} {}", units::format_compact(snap.position.staked_amount, d), sym);
        self.total_staked_label = format!("{} {}", units::format_compact(snap.total_staked, d), sym);
        self.rewards_label = units::format_ether(snap.position.pending_reward_wei);
        self.snapshot = Some(snap);
    }
}

pub struct WidgetShell {
    bridge: Arc<ProviderBridge>,
    facade: Arc<ContractFacade>,
    workflow: StakeWorkflow,
    contracts: Contracts,
    chain_id: u64,
    symbol: String,
    buy_url: String,
    view: Mutex<WidgetView>,
}

impl WidgetShell {
    pub fn new(
        bridge: Arc<ProviderBridge>,
        facade: Arc<ContractFacade>,
        contracts: Contracts,
        chain_id: u64,
        symbol: impl Into<String>,
        buy_url: impl Into<String>,
    ) -> Self {
        let symbol = symbol.into();
        let workflow = StakeWorkflow::new(facade.clone(), contracts.clone(), chain_id, symbol.clone());
        Self {
            bridge,
            facade,
            workflow,
            contracts,
            chain_id,
            symbol,
            buy_url: buy_url.into(),
            view: Mutex::new(WidgetView::default()),
        }
    }

    pub fn from_config(cfg: &Config, bridge: Arc<ProviderBridge>, facade: Arc<ContractFacade>) -> Self {
        Self::new(
            bridge,
            facade,
            cfg.contracts.clone(),
            cfg.chain.chain_id,
            cfg.widget.symbol.clone(),
            cfg.widget.buy_url.clone(),
        )
    }

    /// Shell for an embedded widget: its `data-*` contract and symbol overrides win.
    pub fn from_embed(
        cfg: &Config,
        embed: &EmbedConfig,
        bridge: Arc<ProviderBridge>,
        facade: Arc<ContractFacade>,
    ) -> Self {
        Self::new(
            bridge,
            facade,
            embed.contracts(&cfg.contracts),
            cfg.chain.chain_id,
            embed.symbol.clone(),
            cfg.widget.buy_url.clone(),
        )
    }

    pub fn contracts(&self) -> &Contracts {
        &self.contracts
    }

    fn lock(&self) -> MutexGuard<'_, WidgetView> {
        match self.view.lock() {
            Ok(v) => v,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn view(&self) -> WidgetView {
        self.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.workflow.is_busy()
    }

    fn set_loading(&self, message: Option<&str>) {
        self.lock().loading = message.map(str::to_string);
    }

    fn alert(&self, kind: AlertKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            AlertKind::Error => eprintln!("⚠️  {}", message),
            _ => crate::stack_log!("💬 {}", message),
        }
        self.lock().alerts.push(Alert { kind, message });
    }

    fn connected(&self) -> bool {
        self.bridge.session().owner().is_ok()
    }

    fn on_chain(&self) -> bool {
        let session = self.bridge.session();
        session.owner().is_ok() && session.chain_id == Some(self.chain_id)
    }

    /// Identifies the session and write history a read was started under.
    fn read_stamp(&self) -> (u64, u64) {
        (self.bridge.generation(), self.workflow.write_epoch())
    }

    /// A read may be shown only if no action started and the session did not
    /// change while it was in flight.
    fn still_current(&self, stamp: (u64, u64)) -> bool {
        !self.workflow.is_busy() && self.read_stamp() == stamp
    }

    pub fn set_amount(&self, input: &str) {
        self.lock().amount_input = input.to_string();
    }

    /// Iframe source for the buy tab.
    pub fn buy_url(&self) -> Result<String> {
        let mut url = url::Url::parse(&self.buy_url).with_context(|| format!("bad buy url '{}'", self.buy_url))?;
        url.query_pairs_mut()
            .append_pair("token", &format!("0x{}", hex::encode(self.contracts.token.as_slice())))
            .append_pair("symbol", &self.symbol)
            .append_pair("embed", "true");
        Ok(url.to_string())
    }

    /// Connect button. Returns whether the widget ended up connected on the right chain.
    pub async fn connect(&self) -> bool {
        self.set_loading(Some("Connecting wallet..."));
        let ok = match self.connect_inner().await {
            Ok(()) => true,
            Err(Some(alert)) => {
                self.alert(AlertKind::Error, alert);
                false
            }
            Err(None) => false,
        };
        self.set_loading(None);
        ok
    }

    async fn connect_inner(&self) -> Result<(), Option<String>> {
        let session = match self.bridge.connect().await {
            Ok(s) => s,
            Err(WalletError::ProviderAbsent) => {
                return Err(Some("Please install MetaMask or another Web3 wallet to continue.".into()))
            }
            // A dismissed prompt just returns to the previous state.
            Err(WalletError::UserRejected) => return Err(None),
            Err(e) => {
                eprintln!("❌ Connect failed: {}", e);
                return Err(Some("Failed to connect wallet. Please try again.".into()));
            }
        };
        if let Err(e) = self.bridge.ensure_chain(self.chain_id).await {
            eprintln!("❌ Network switch failed: {}", e);
            return Err(Some(format!("Please switch to {}.", network_name(self.chain_id))));
        }
        let address = session.owner().map_err(|_| None)?;
        {
            let mut v = self.lock();
            v.connect_label = units::short_address(&address);
            v.actions_enabled = true;
        }
        self.refresh().await;
        Ok(())
    }

    /// Re-reads the full position. Skipped while an action is in flight, and
    /// the result is dropped if an action or a session change overtook it.
    pub async fn refresh(&self) -> bool {
        let Ok(owner) = self.bridge.session().owner() else {
            return false;
        };
        if self.workflow.is_busy() {
            return false;
        }
        let stamp = self.read_stamp();
        match self.facade.read_position(&self.contracts, owner, &self.symbol).await {
            Ok(snap) => {
                let mut v = self.lock();
                if !self.still_current(stamp) {
                    crate::stack_log!("⏭️  Dropping balances read before the latest change");
                    return false;
                }
                v.apply(snap);
                true
            }
            Err(e) => {
                eprintln!("⚠️  Failed to refresh data: {}", e);
                false
            }
        }
    }

    /// Stake and earn tabs re-read on focus.
    pub async fn switch_tab(&self, tab: Tab) {
        self.lock().tab = tab;
        if tab.reads_chain() && self.connected() {
            self.refresh().await;
        }
    }

    /// MAX button: the whole wallet balance at full precision.
    pub async fn set_max(&self) -> bool {
        let Ok(owner) = self.bridge.session().owner() else {
            self.alert(AlertKind::Error, "Please connect your wallet first.");
            return false;
        };
        if self.workflow.is_busy() {
            return false;
        }
        let stamp = self.read_stamp();
        let token = self.contracts.token;
        let read = async {
            let (balance, decimals) = tokio::try_join!(
                self.facade.token_balance(token, owner),
                self.facade.token_decimals(token),
            )?;
            Ok::<_, WalletError>(units::format_units(balance, decimals))
        };
        match read.await {
            Ok(formatted) => {
                let mut v = self.lock();
                if !self.still_current(stamp) {
                    return false;
                }
                v.amount_input = formatted;
                true
            }
            Err(e) => {
                eprintln!("⚠️  Failed to get max amount: {}", e);
                false
            }
        }
    }

    pub async fn stake(&self) -> bool {
        self.run_action(Action::Stake).await
    }

    pub async fn unstake(&self) -> bool {
        self.run_action(Action::Unstake).await
    }

    pub async fn claim(&self) -> bool {
        self.run_action(Action::Claim).await
    }

    async fn run_action(&self, action: Action) -> bool {
        if !self.connected() {
            self.connect().await;
            return false;
        }
        let input = self.lock().amount_input.clone();
        if action.needs_amount() && is_blank_or_nonpositive(&input) {
            self.alert(AlertKind::Error, format!("Please enter an amount to {}.", action.as_str()));
            return false;
        }

        self.lock().actions_enabled = false;
        let started_by = self.bridge.session().owner().ok();
        let mut on_progress = |p: Progress| self.set_loading(Some(p.message()));
        let amount = action.needs_amount().then_some(input.as_str());
        let result = self.workflow.run(action, amount, &mut on_progress).await;
        let on_chain = self.on_chain();
        let now = self.bridge.session().owner().ok();
        let moved = now != started_by;
        {
            let mut v = self.lock();
            v.loading = None;
            v.actions_enabled = on_chain;
            if moved || !on_chain {
                v.clear_stats();
            }
            if moved {
                v.connect_label = now.map_or_else(|| CONNECT_LABEL.to_string(), |a| units::short_address(&a));
            }
        }

        let ok = match result {
            Ok(report) => {
                {
                    let mut v = self.lock();
                    if action.needs_amount() {
                        v.amount_input.clear();
                    }
                    if let Some(snap) = report.snapshot.filter(|_| on_chain && !moved) {
                        v.apply(snap);
                    }
                }
                self.alert(AlertKind::Success, success_message(action));
                true
            }
            // Re-entry while a transaction is pending is a no-op.
            Err(WalletError::Busy) => false,
            Err(WalletError::UserRejected) => {
                self.alert(AlertKind::Info, "Transaction cancelled.");
                false
            }
            Err(WalletError::NotConnected) => {
                self.alert(AlertKind::Error, "Please connect your wallet first.");
                false
            }
            Err(WalletError::AccountChanged { .. }) => {
                self.alert(AlertKind::Error, "Wallet account changed. Please try again.");
                false
            }
            Err(WalletError::WrongNetwork { expected, .. }) => {
                self.alert(AlertKind::Error, format!("Please switch to {}.", network_name(expected)));
                false
            }
            Err(e) => {
                self.alert(AlertKind::Error, format!("{} failed: {}", failure_prefix(action), e));
                false
            }
        };

        // Session events that arrived mid-action skipped their refresh; show the account the wallet is on now.
        if moved && on_chain {
            self.refresh().await;
        }
        ok
    }

    /// Provider notifications. Every amount read on a previous account or chain is dropped.
    pub async fn handle_session_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Connected { .. } => {}
            SessionEvent::Disconnected => {
                let mut v = self.lock();
                v.clear_stats();
                v.connect_label = CONNECT_LABEL.to_string();
                v.actions_enabled = false;
            }
            SessionEvent::AccountChanged(address) => {
                {
                    let mut v = self.lock();
                    v.clear_stats();
                    v.connect_label = units::short_address(address);
                }
                self.refresh().await;
            }
            SessionEvent::ChainChanged(chain_id) => {
                let on_chain = *chain_id == self.chain_id;
                {
                    let mut v = self.lock();
                    v.clear_stats();
                    v.actions_enabled = on_chain && self.bridge.session().owner().is_ok();
                }
                if on_chain {
                    self.refresh().await;
                } else {
                    self.alert(AlertKind::Error, format!("Please switch to {}.", network_name(self.chain_id)));
                }
            }
        }
    }
}

/// Feeds bridge notifications into the shell until the bridge goes away.
pub fn spawn_event_loop(shell: Arc<WidgetShell>) -> JoinHandle<()> {
    let mut rx = shell.bridge.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => shell.handle_session_event(&ev).await,
                Err(RecvError::Lagged(n)) => eprintln!("⚠️  Widget skipped {} session events", n),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn success_message(action: Action) -> &'static str {
    match action {
        Action::Stake => "Tokens staked successfully!",
        Action::Unstake => "Tokens unstaked successfully!",
        Action::Claim => "Rewards claimed successfully!",
    }
}

fn failure_prefix(action: Action) -> &'static str {
    match action {
        Action::Stake => "Staking",
        Action::Unstake => "Unstaking",
        Action::Claim => "Claim",
    }
}

/// The "enter an amount" prompt covers empty, zero and negative input.
fn is_blank_or_nonpositive(input: &str) -> bool {
    let s = input.trim();
    s.is_empty() || s.starts_with('-') || s.chars().all(|c| c == '0' || c == '.')
}
