// gate.rs
// Access gate: shows gated content to holders of a qualifying token balance.
// A grant is persisted in local storage and honored lazily until it expires.

use crate::config::Config;
use crate::contracts::ContractFacade;
use crate::error::WalletError;
use crate::prefs::{GATE_ACCESS_GRANTED, GATE_ACCESS_KEY, GATE_TIMESTAMP_KEY, GATE_WALLET_KEY};
use crate::storage::LocalStorage;
use crate::units;
use crate::wallet::{ProviderBridge, SessionEvent};
use alloy_primitives::{Address, U256};
use anyhow::Result;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Locked,
    Connecting,
    Checking,
    Granted,
    Denied,
}

impl GateState {
    pub fn overlay_visible(self) -> bool {
        self != GateState::Granted
    }
}

/// Persisted proof that `wallet` held a qualifying balance at `granted_at_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub wallet: Address,
    pub granted: bool,
    pub granted_at_ms: u64,
}

impl AccessGrant {
    pub fn is_valid(&self, now_ms: u64, ttl: Duration) -> bool {
        self.granted && now_ms.saturating_sub(self.granted_at_ms) < ttl.as_millis() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifyingToken {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
    /// Base units. Zero means any positive balance.
    pub min_balance: U256,
}

impl QualifyingToken {
    pub fn qualifies(&self, balance: U256) -> bool {
        if self.min_balance.is_zero() {
            balance > U256::ZERO
        } else {
            balance >= self.min_balance
        }
    }

    fn requirement(&self) -> String {
        if self.min_balance.is_zero() {
            format!("any {}", self.symbol)
        } else {
            let amount = units::format_compact(self.min_balance, self.decimals).replace(".00", "");
            format!("{}+ {}", amount, self.symbol)
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatePolicy {
    pub tokens: Vec<QualifyingToken>,
    pub chain_id: u64,
    pub ttl: Duration,
    pub wallet_scoped: bool,
    pub honor_legacy_grant: bool,
    pub install_url: String,
}

impl GatePolicy {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let mut tokens = Vec::with_capacity(cfg.gate.tokens.len());
        for t in &cfg.gate.tokens {
            let min_balance = units::parse_units(&t.min_balance, t.decimals)
                .map_err(|e| anyhow::anyhow!("gate token {}: bad min_balance: {}", t.symbol, e))?;
            tokens.push(QualifyingToken {
                symbol: t.symbol.clone(),
                address: t.address,
                decimals: t.decimals,
                min_balance,
            });
        }
        if tokens.is_empty() {
            anyhow::bail!("gate needs at least one [[gate.tokens]] entry");
        }
        Ok(Self {
            tokens,
            chain_id: cfg.chain.chain_id,
            ttl: Duration::from_secs(cfg.gate.ttl_hours * 3_600),
            wallet_scoped: cfg.gate.wallet_scoped,
            honor_legacy_grant: cfg.gate.honor_legacy_grant,
            install_url: cfg.gate.install_url.clone(),
        })
    }

    /// "1M+ BONZI or any VISTA"
    pub fn describe_requirement(&self) -> String {
        self.tokens.iter().map(QualifyingToken::requirement).collect::<Vec<_>>().join(" or ")
    }
}

/// First token (in policy order) whose balance qualifies.
pub fn qualifying_token<'a>(tokens: &'a [QualifyingToken], balances: &[U256]) -> Option<&'a QualifyingToken> {
    tokens.iter().zip(balances).find(|(t, b)| t.qualifies(**b)).map(|(t, _)| t)
}

/// User-facing status line under the connect button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateNotice {
    InstallWallet { url: String },
    Cancelled,
    WrongNetwork { expected: u64 },
    ConnectionFailed,
    Insufficient { requirement: String },
    CheckFailed,
    Granted,
}

impl GateNotice {
    pub fn message(&self) -> String {
        match self {
            GateNotice::InstallWallet { url } => format!("⚠️ MetaMask not detected. Install MetaMask: {url}"),
            GateNotice::Cancelled => "Connection request cancelled.".to_string(),
            GateNotice::WrongNetwork { expected } => format!("⚠️ Switch to {}", network_name(*expected)),
            GateNotice::ConnectionFailed => "❌ Connection failed. Try again.".to_string(),
            GateNotice::Insufficient { requirement } => format!("❌ Insufficient balance. Need {requirement}."),
            GateNotice::CheckFailed => "❌ Error checking balance. Try refreshing the page.".to_string(),
            GateNotice::Granted => "✓ Access granted - Welcome, holder!".to_string(),
        }
    }
}

pub fn network_name(chain_id: u64) -> String {
    match chain_id {
        1 => "Ethereum Mainnet".to_string(),
        11_155_111 => "Sepolia".to_string(),
        other => format!("chain {other}"),
    }
}

/// Anonymized access record handed to an optional analytics sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogEntry {
    pub wallet_label: String,
    pub token: String,
    pub timestamp_ms: u64,
}

pub trait AccessLog: Send + Sync {
    fn record(&self, entry: &AccessLogEntry);
}

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
    }
}

struct GateInner {
    state: GateState,
    grant: Option<AccessGrant>,
    notice: Option<GateNotice>,
}

pub struct AccessGate {
    bridge: Arc<ProviderBridge>,
    facade: Arc<ContractFacade>,
    storage: Arc<dyn LocalStorage>,
    policy: GatePolicy,
    clock: Arc<dyn Clock>,
    access_log: Option<Arc<dyn AccessLog>>,
    inner: Mutex<GateInner>,
}

impl AccessGate {
    pub fn new(
        bridge: Arc<ProviderBridge>,
        facade: Arc<ContractFacade>,
        storage: Arc<dyn LocalStorage>,
        policy: GatePolicy,
    ) -> Self {
        Self {
            bridge,
            facade,
            storage,
            policy,
            clock: Arc::new(SystemClock),
            access_log: None,
            inner: Mutex::new(GateInner { state: GateState::Locked, grant: None, notice: None }),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_access_log(mut self, log: Arc<dyn AccessLog>) -> Self {
        self.access_log = Some(log);
        self
    }

    fn lock(&self) -> MutexGuard<'_, GateInner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn state(&self) -> GateState {
        self.lock().state
    }

    pub fn notice(&self) -> Option<GateNotice> {
        self.lock().notice.clone()
    }

    pub fn grant(&self) -> Option<AccessGrant> {
        self.lock().grant.clone()
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    fn set(&self, state: GateState, notice: Option<GateNotice>) -> GateState {
        let mut g = self.lock();
        g.state = state;
        g.notice = notice;
        state
    }

    /// Page-load evaluation: a non-expired stored grant opens the gate, anything else locks it.
    pub fn init(&self) -> Result<GateState> {
        let now = self.clock.now_ms();
        let grant = self.load_grant(now)?;
        let mut g = self.lock();
        match grant {
            Some(grant) if grant.is_valid(now, self.policy.ttl) => {
                crate::stack_log!("🔓 Stored access grant for {} is still valid", units::short_address(&grant.wallet));
                g.grant = Some(grant);
                g.state = GateState::Granted;
            }
            _ => {
                g.grant = None;
                g.state = GateState::Locked;
            }
        }
        g.notice = None;
        Ok(g.state)
    }

    fn load_grant(&self, now_ms: u64) -> Result<Option<AccessGrant>> {
        let Some(wallet_raw) = self.storage.get_item(GATE_WALLET_KEY)? else {
            return Ok(None);
        };
        let Ok(wallet) = Address::from_str(wallet_raw.trim()) else {
            eprintln!("⚠️  Ignoring stored access grant with unreadable wallet '{}'", wallet_raw);
            return Ok(None);
        };
        let access = self.storage.get_item(GATE_ACCESS_KEY)?;
        let timestamp = self.storage.get_item(GATE_TIMESTAMP_KEY)?;

        if access.is_none() && timestamp.is_none() {
            // Older pages stored only the wallet, with no expiry.
            if !self.policy.honor_legacy_grant {
                return Ok(None);
            }
            let grant = AccessGrant { wallet, granted: true, granted_at_ms: now_ms };
            self.persist(&grant)?;
            crate::stack_log!("🔁 Migrated legacy access grant for {}", units::short_address(&wallet));
            return Ok(Some(grant));
        }

        let granted = access.as_deref() == Some(GATE_ACCESS_GRANTED);
        let Some(granted_at_ms) = timestamp.and_then(|t| t.trim().parse::<u64>().ok()) else {
            return Ok(None);
        };
        Ok(Some(AccessGrant { wallet, granted, granted_at_ms }))
    }

    fn persist(&self, grant: &AccessGrant) -> Result<()> {
        self.storage.set_item(GATE_WALLET_KEY, &grant.wallet.to_string())?;
        self.storage.set_item(GATE_ACCESS_KEY, GATE_ACCESS_GRANTED)?;
        self.storage.set_item(GATE_TIMESTAMP_KEY, &grant.granted_at_ms.to_string())
    }

    /// Removes the stored grant and locks the gate.
    pub fn revoke(&self) -> Result<()> {
        self.storage.remove_item(GATE_WALLET_KEY)?;
        self.storage.remove_item(GATE_ACCESS_KEY)?;
        self.storage.remove_item(GATE_TIMESTAMP_KEY)?;
        let mut g = self.lock();
        g.grant = None;
        g.state = GateState::Locked;
        g.notice = None;
        Ok(())
    }

    /// Connect button. Ignored while a connect/check is already running.
    pub async fn connect(&self) -> GateState {
        {
            let mut g = self.lock();
            if matches!(g.state, GateState::Connecting | GateState::Checking) {
                return g.state;
            }
            g.state = GateState::Connecting;
            g.notice = None;
        }

        let session = match self.bridge.connect().await {
            Ok(s) => s,
            Err(WalletError::ProviderAbsent) => {
                return self.set(GateState::Locked, Some(GateNotice::InstallWallet { url: self.policy.install_url.clone() }));
            }
            Err(WalletError::UserRejected) => return self.set(GateState::Locked, Some(GateNotice::Cancelled)),
            Err(e) => {
                eprintln!("❌ Wallet connection error: {}", e);
                return self.set(GateState::Locked, Some(GateNotice::ConnectionFailed));
            }
        };
        let (Ok(owner), Some(chain_id)) = (session.owner(), session.chain_id) else {
            return self.set(GateState::Locked, Some(GateNotice::ConnectionFailed));
        };
        if chain_id != self.policy.chain_id {
            return self.set(GateState::Locked, Some(GateNotice::WrongNetwork { expected: self.policy.chain_id }));
        }

        self.set(GateState::Checking, None);
        self.check(owner).await
    }

    async fn check(&self, owner: Address) -> GateState {
        let reads = self.policy.tokens.iter().map(|t| self.facade.token_balance(t.address, owner));
        let balances = match futures::future::try_join_all(reads).await {
            Ok(b) => b,
            Err(e) => {
                eprintln!("❌ Balance check error: {}", e);
                crate::metrics::GATE_DECISIONS.with_label_values(&["error"]).inc();
                return self.set(GateState::Denied, Some(GateNotice::CheckFailed));
            }
        };

        let Some(token) = qualifying_token(&self.policy.tokens, &balances) else {
            crate::metrics::GATE_DECISIONS.with_label_values(&["denied"]).inc();
            crate::stack_log!("🚫 {} holds no qualifying balance", units::short_address(&owner));
            let requirement = self.policy.describe_requirement();
            return self.set(GateState::Denied, Some(GateNotice::Insufficient { requirement }));
        };

        let now = self.clock.now_ms();
        let grant = AccessGrant { wallet: owner, granted: true, granted_at_ms: now };
        if let Err(e) = self.persist(&grant) {
            // Content still opens for this page view.
            eprintln!("⚠️  Could not persist access grant: {}", e);
        }
        crate::metrics::GATE_DECISIONS.with_label_values(&["granted"]).inc();
        crate::stack_log!("🔓 Access granted to {} via {}", units::short_address(&owner), token.symbol);
        if let Some(log) = &self.access_log {
            log.record(&AccessLogEntry {
                wallet_label: units::short_address(&owner),
                token: token.symbol.clone(),
                timestamp_ms: now,
            });
        }

        let mut g = self.lock();
        g.grant = Some(grant);
        g.state = GateState::Granted;
        g.notice = Some(GateNotice::Granted);
        g.state
    }

    /// Wallet-scoped grants are dropped as soon as a different account shows up.
    pub fn on_session_event(&self, event: &SessionEvent) -> Result<GateState> {
        let address = match event {
            SessionEvent::Connected { address, .. } | SessionEvent::AccountChanged(address) => *address,
            SessionEvent::ChainChanged(_) | SessionEvent::Disconnected => return Ok(self.state()),
        };
        if !self.policy.wallet_scoped {
            return Ok(self.state());
        }
        let mismatch = {
            let g = self.lock();
            g.state == GateState::Granted && g.grant.as_ref().map(|gr| gr.wallet != address).unwrap_or(false)
        };
        if mismatch {
            crate::stack_log!("🔒 Account changed to {}; stored grant no longer applies", units::short_address(&address));
            self.revoke()?;
        }
        Ok(self.state())
    }
}

/// Applies bridge notifications to the gate until the bridge goes away.
pub fn spawn_event_loop(gate: Arc<AccessGate>) -> JoinHandle<()> {
    let mut rx = gate.bridge.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    if let Err(e) = gate.on_session_event(&ev) {
                        eprintln!("⚠️  Gate could not apply {:?}: {}", ev, e);
                    }
                }
                Err(RecvError::Lagged(n)) => eprintln!("⚠️  Gate skipped {} session events", n),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
