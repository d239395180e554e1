// devmode.rs
// Developer-mode unlock. A stored key enables dev mode right away and is
// re-verified against the cockpit ping endpoint; a rejected key is removed.

use crate::prefs::DEV_KEY;
use crate::storage::LocalStorage;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const KEY_HEADER: &str = "X-Cockpit-Key";
pub const PING_PATH: &str = "/dev/cockpit/ping";

#[async_trait]
pub trait KeyVerifier: Send + Sync {
    /// `true` only when the backend accepts the key. Transport failures count as rejection.
    async fn verify(&self, key: &str) -> bool;
}

pub struct HttpKeyVerifier {
    api_base: String,
    client: reqwest::Client,
}

impl HttpKeyVerifier {
    pub fn new(api_base: &str) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { api_base: api_base.trim_end_matches('/').to_string(), client })
    }
}

#[async_trait]
impl KeyVerifier for HttpKeyVerifier {
    async fn verify(&self, key: &str) -> bool {
        let url = format!("{}{}", self.api_base, PING_PATH);
        match self.client.get(&url).header(KEY_HEADER, key).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                eprintln!("⚠️  Cockpit ping failed: {}", e);
                false
            }
        }
    }
}

/// `?cockpit` (with or without a value) opens the unlock prompt.
pub fn wants_prompt(query: &str) -> bool {
    let q = query.trim_start_matches('?');
    url::form_urlencoded::parse(q.as_bytes()).any(|(k, _)| k == "cockpit")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    Unlocked,
    InvalidKey,
    /// Blank input; nothing was sent.
    Ignored,
}

pub struct DevMode {
    storage: Arc<dyn LocalStorage>,
    verifier: Arc<dyn KeyVerifier>,
    enabled: AtomicBool,
}

impl DevMode {
    pub fn new(storage: Arc<dyn LocalStorage>, verifier: Arc<dyn KeyVerifier>) -> Self {
        Self { storage, verifier, enabled: AtomicBool::new(false) }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Enables dev mode when a key is stored, without waiting for verification.
    pub fn restore(&self) -> Result<bool> {
        let stored = self.storage.get_item(DEV_KEY)?.filter(|k| !k.trim().is_empty());
        self.enabled.store(stored.is_some(), Ordering::Relaxed);
        Ok(stored.is_some())
    }

    /// Checks the stored key; a rejected key is removed and dev mode switched off.
    pub async fn reverify(&self) -> Result<bool> {
        let Some(key) = self.storage.get_item(DEV_KEY)? else {
            self.enabled.store(false, Ordering::Relaxed);
            return Ok(false);
        };
        if self.verifier.verify(&key).await {
            self.enabled.store(true, Ordering::Relaxed);
            return Ok(true);
        }
        eprintln!("🔒 Stored cockpit key was rejected; dev mode disabled");
        self.lock()?;
        Ok(false)
    }

    pub async fn unlock(&self, key: &str) -> Result<UnlockOutcome> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(UnlockOutcome::Ignored);
        }
        if !self.verifier.verify(key).await {
            return Ok(UnlockOutcome::InvalidKey);
        }
        self.storage.set_item(DEV_KEY, key)?;
        self.enabled.store(true, Ordering::Relaxed);
        crate::stack_log!("🛠️  Dev mode unlocked");
        Ok(UnlockOutcome::Unlocked)
    }

    pub fn lock(&self) -> Result<()> {
        self.storage.remove_item(DEV_KEY)?;
        self.enabled.store(false, Ordering::Relaxed);
        Ok(())
    }

    /// Links that replace the "coming soon" nav labels while dev mode is on.
    pub fn revealed_links(&self, labels: &[&str]) -> Vec<(String, String)> {
        if !self.is_enabled() {
            return Vec::new();
        }
        labels.iter().map(|l| (l.trim().to_string(), crate::site::coming_soon_link(l))).collect()
    }
}
