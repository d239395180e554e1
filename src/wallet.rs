// wallet.rs
// Provider bridge: owns the wallet session and turns provider notifications into session events.

use crate::error::{ProviderError, WalletError, CODE_UNRECOGNIZED_CHAIN};
use crate::rpc::{self, Eip1193};
use alloy_primitives::Address;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Snapshot of what the wallet currently exposes to the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletSession {
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
    pub connected: bool,
}

impl WalletSession {
    pub fn owner(&self) -> Result<Address, WalletError> {
        match (self.connected, self.address) {
            (true, Some(a)) => Ok(a),
            _ => Err(WalletError::NotConnected),
        }
    }
}

/// Notifications fanned out to the gate and the widget shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected { address: Address, chain_id: u64 },
    AccountChanged(Address),
    ChainChanged(u64),
    Disconnected,
}

/// Wraps the optional injected provider. A missing provider is a normal state
/// and surfaces as `WalletError::ProviderAbsent`.
pub struct ProviderBridge {
    provider: Option<Arc<dyn Eip1193>>,
    session: RwLock<WalletSession>,
    generation: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
}

impl ProviderBridge {
    pub fn new(provider: Option<Arc<dyn Eip1193>>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self { provider, session: RwLock::new(WalletSession::default()), generation: AtomicU64::new(0), events }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    pub fn session(&self) -> WalletSession {
        self.session.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Changes whenever the account, chain or connection changes. Amounts read
    /// under an older generation belong to a session that no longer exists.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Raw provider request with failures classified into the error taxonomy.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let provider = self.provider.as_ref().ok_or(WalletError::ProviderAbsent)?;
        provider.request(method, params).await.map_err(WalletError::from)
    }

    /// Prompts for account access and records the session.
    pub async fn connect(&self) -> Result<WalletSession, WalletError> {
        let accounts = self.request("eth_requestAccounts", json!([])).await?;
        let accounts: Vec<Address> = rpc::from_result(accounts).map_err(WalletError::from)?;
        // An empty grant behaves like a dismissed prompt.
        let address = *accounts.first().ok_or(WalletError::UserRejected)?;
        let chain_id = self.current_chain_id().await?;

        let session = WalletSession { address: Some(address), chain_id: Some(chain_id), connected: true };
        self.replace_session(session.clone());
        crate::stack_log!("🔗 Wallet connected: {} (chain {})", crate::units::short_address(&address), chain_id);
        let _ = self.events.send(SessionEvent::Connected { address, chain_id });
        Ok(session)
    }

    pub async fn current_chain_id(&self) -> Result<u64, WalletError> {
        let v = self.request("eth_chainId", json!([])).await?;
        rpc::parse_quantity(&v).map_err(WalletError::from)
    }

    /// Makes sure the wallet is on `target`, asking it to switch when it isn't.
    pub async fn ensure_chain(&self, target: u64) -> Result<(), WalletError> {
        let current = self.current_chain_id().await?;
        if current == target {
            return Ok(());
        }
        let params = json!([{ "chainId": rpc::to_quantity(target) }]);
        match self.provider.as_ref() {
            None => Err(WalletError::ProviderAbsent),
            Some(p) => match p.request("wallet_switchEthereumChain", params).await {
                Ok(_) => {
                    self.handle_chain_changed(target);
                    Ok(())
                }
                Err(ProviderError::Rpc { code, .. }) if code == CODE_UNRECOGNIZED_CHAIN => {
                    Err(WalletError::UnsupportedChain(target))
                }
                Err(e) => match WalletError::from(e) {
                    WalletError::UserRejected => Err(WalletError::UserRejected),
                    _ => Err(WalletError::WrongNetwork { expected: target, actual: current }),
                },
            },
        }
    }

    pub fn disconnect(&self) {
        let was_connected = self.session().connected;
        self.replace_session(WalletSession::default());
        if was_connected {
            crate::stack_log!("🔌 Wallet disconnected");
            let _ = self.events.send(SessionEvent::Disconnected);
        }
    }

    /// `accountsChanged` handler. An empty list means the wallet revoked access.
    pub fn handle_accounts_changed(&self, accounts: &[Address]) {
        match accounts.first() {
            None => self.disconnect(),
            Some(&address) => {
                let changed = {
                    let mut s = match self.session.write() {
                        Ok(s) => s,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    let changed = s.address != Some(address);
                    s.address = Some(address);
                    s.connected = true;
                    changed
                };
                if changed {
                    self.bump();
                    crate::stack_log!("👛 Account changed to {}", crate::units::short_address(&address));
                    let _ = self.events.send(SessionEvent::AccountChanged(address));
                }
            }
        }
    }

    /// `chainChanged` handler. Dependents must drop every amount read on the old chain.
    pub fn handle_chain_changed(&self, chain_id: u64) {
        let changed = {
            let mut s = match self.session.write() {
                Ok(s) => s,
                Err(poisoned) => poisoned.into_inner(),
            };
            let changed = s.chain_id != Some(chain_id);
            s.chain_id = Some(chain_id);
            changed
        };
        if changed {
            self.bump();
            crate::stack_log!("⛓️  Chain changed to {}", chain_id);
            let _ = self.events.send(SessionEvent::ChainChanged(chain_id));
        }
    }

    /// Asks the provider for its current account and chain and raises the
    /// same notifications a browser wallet would push. Does nothing until connected.
    pub async fn poll_session(&self) -> Result<(), WalletError> {
        if !self.session().connected {
            return Ok(());
        }
        let accounts = self.request("eth_accounts", json!([])).await?;
        let accounts: Vec<Address> = rpc::from_result(accounts).map_err(WalletError::from)?;
        self.handle_accounts_changed(&accounts);
        if accounts.is_empty() {
            return Ok(());
        }
        let chain_id = self.current_chain_id().await?;
        self.handle_chain_changed(chain_id);
        Ok(())
    }

    fn replace_session(&self, session: WalletSession) {
        match self.session.write() {
            Ok(mut s) => *s = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
        self.bump();
    }
}

/// `accountsChanged` / `chainChanged` for providers that cannot push them.
/// Polls every `interval` until the task is aborted.
pub fn spawn_session_watcher(bridge: Arc<ProviderBridge>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = bridge.poll_session().await {
                eprintln!("⚠️  Wallet poll failed: {}", e);
            }
        }
    })
}
