use alloy_primitives::Address;
use serde::Deserialize;
use std::{fs, path::Path};
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub chain: Chain,
    pub contracts: Contracts,
    #[serde(default)]
    pub gate: Gate,
    #[serde(default)]
    pub widget: Widget,
    #[serde(default)]
    pub site: Site,
    pub storage: Storage,
    #[serde(default)]
    pub dev_mode: DevMode,
    #[serde(default)]
    pub metrics: Metrics,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Chain {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_poll_ms")]
    pub confirmation_poll_ms: u64,
    #[serde(default = "default_confirm_timeout")]
    pub confirmation_timeout_secs: u64,
    /// How often `watch` asks the wallet for its account and chain.
    #[serde(default = "default_session_poll_ms")]
    pub session_poll_ms: u64,
}

impl Default for Chain {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            rpc_url: default_rpc_url(),
            confirmation_poll_ms: default_poll_ms(),
            confirmation_timeout_secs: default_confirm_timeout(),
            session_poll_ms: default_session_poll_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Contracts {
    pub token: Address,
    pub router: Address,
    pub staking: Address,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GateToken {
    pub symbol: String,
    pub address: Address,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Display units; "0" means any positive balance qualifies.
    #[serde(default = "default_min_balance")]
    pub min_balance: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Gate {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
    #[serde(default = "default_true")]
    pub wallet_scoped: bool,
    #[serde(default = "default_true")]
    pub honor_legacy_grant: bool,
    #[serde(default = "default_install_url")]
    pub install_url: String,
    #[serde(default)]
    pub tokens: Vec<GateToken>,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            wallet_scoped: true,
            honor_legacy_grant: true,
            install_url: default_install_url(),
            tokens: Vec::new(),
        }
    }
}

/// Host-page defaults for the embeddable widget; individual attributes override these.
#[derive(Debug, Deserialize, Clone)]
pub struct Widget {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default = "default_width")]
    pub width: String,
    #[serde(default = "default_height")]
    pub height: String,
    #[serde(default)]
    pub testnet: bool,
    #[serde(default = "default_buy_url")]
    pub buy_url: String,
    #[serde(default = "default_widget_host")]
    pub widget_host: String,
    #[serde(default)]
    pub button_text: Option<String>,
    #[serde(default = "default_button_color")]
    pub button_color: String,
}

impl Default for Widget {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            theme: default_theme(),
            mode: default_mode(),
            container: None,
            width: default_width(),
            height: default_height(),
            testnet: false,
            buy_url: default_buy_url(),
            widget_host: default_widget_host(),
            button_text: None,
            button_color: default_button_color(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Site {
    /// Directory on disk or an http(s) base URL.
    #[serde(default = "default_assets")]
    pub assets: String,
    #[serde(default = "default_subdirs")]
    pub subdirs: Vec<String>,
    #[serde(default = "default_theme_setting")]
    pub default_theme: String,
}

impl Default for Site {
    fn default() -> Self {
        Self { assets: default_assets(), subdirs: default_subdirs(), default_theme: default_theme_setting() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Storage {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DevMode {
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for DevMode {
    fn default() -> Self {
        Self { api_base: default_api_base() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Metrics {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for Metrics {
    fn default() -> Self {
        Self { enabled: false, bind: default_bind() }
    }
}

fn default_chain_id() -> u64 { 1 }
fn default_rpc_url() -> String { "https://eth.llamarpc.com".into() }
fn default_poll_ms() -> u64 { 1_500 }
fn default_confirm_timeout() -> u64 { 600 }
fn default_session_poll_ms() -> u64 { 4_000 }
fn default_decimals() -> u8 { 18 }
fn default_min_balance() -> String { "0".into() }
fn default_ttl_hours() -> u64 { 24 }
fn default_true() -> bool { true }
fn default_install_url() -> String { "https://metamask.io".into() }
fn default_symbol() -> String { "$TOKEN".into() }
fn default_theme() -> String { "light".into() }
fn default_mode() -> String { "inline".into() }
fn default_width() -> String { "400px".into() }
fn default_height() -> String { "600px".into() }
fn default_buy_url() -> String { "https://bonzi.bot/widget/brand-widget.html".into() }
fn default_widget_host() -> String { "https://bonzi.bot/widget".into() }
fn default_button_color() -> String { "#7B2D8E".into() }
fn default_assets() -> String { "site".into() }
fn default_theme_setting() -> String { "light".into() }
fn default_api_base() -> String { "https://bonzi-v5.onrender.com".into() }
fn default_bind() -> String { "127.0.0.1:9100".into() }

fn default_subdirs() -> Vec<String> {
    ["manual", "economics", "research", "vetter", "dao", "metrics"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Read the TOML file at `p` and deserialize into `Config`.
/// *Adds context* so user errors print a friendlier message.
///
/// # Errors
/// * Returns an anyhow::Error if the file cannot be read or parsed.
pub fn load<P: AsRef<Path>>(p: P) -> Result<Config> {
    let text = fs::read_to_string(&p)
        .with_context(|| format!("🗂️  couldn’t read config file {}", p.as_ref().display()))?;
    load_from_str(&text)
}

/// Parse configuration text (used for the copy embedded in the binary).
pub fn load_from_str(text: &str) -> Result<Config> {
    toml::from_str(text)
        .with_context(|| "📝  invalid TOML in config file".to_string())
}
