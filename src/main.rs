use bonzi_stack::{
    assets, config, devmode, embed, gate, i18n, metrics, prefs, site, storage, units, wallet,
    ContractFacade, Eip1193, JsonRpcProvider, ProviderBridge, WidgetShell,
};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[derive(Parser)]
#[command(author, version, about = "bonzi site stack: wallet gate, staking widget and page tooling")]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Suppress routine progress logs
    #[arg(long, default_value_t = false)]
    quiet: bool,

    /// Embed data attributes (key=value); contract and symbol overrides apply to every command
    #[arg(long = "attr", global = true)]
    attrs: Vec<String>,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Show configuration, stored preferences and the wallet position
    Status,
    /// Connect the wallet and load the stake/earn panels
    Connect,
    Stake {
        #[arg(long)]
        amount: String,
    },
    Unstake {
        #[arg(long)]
        amount: String,
    },
    Claim,
    /// Print the full token balance as the MAX button would fill it
    Max,
    /// Evaluate the access gate, connecting and checking balances when locked
    Gate,
    /// Forget the stored access grant
    GateRevoke,
    /// Look up translation keys for a language
    Translate {
        #[arg(long)]
        lang: String,
        /// Page path the catalogs are resolved from
        #[arg(long, default_value = "/")]
        path: String,
        keys: Vec<String>,
    },
    /// Show prefixes, active nav key and the rewritten nav fragments for a page
    Nav {
        #[arg(long)]
        path: String,
    },
    /// Build the embeddable widget URL from the --attr data attributes
    EmbedUrl,
    DevUnlock {
        #[arg(long)]
        key: String,
    },
    DevStatus,
    /// Show or set the theme: light, dark or toggle
    Theme {
        value: Option<String>,
    },
    /// Connect and follow wallet account/chain changes until Ctrl+C
    Watch,
}

fn load_config(path: &str) -> anyhow::Result<config::Config> {
    const EMBEDDED_CONFIG: &str = include_str!("../config.toml");
    match config::load(path) {
        Ok(c) => Ok(c),
        Err(e1) => {
            // Attempt exe-dir config.toml
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                if let Ok(c) = config::load(dir.join("config.toml")) {
                    return Ok(c);
                }
            }
            eprintln!("⚠️  Could not read config from '{}': {} (using built-in defaults)", path, e1);
            config::load_from_str(EMBEDDED_CONFIG)
                .map_err(|e2| anyhow::anyhow!("failed to load configuration: {} / {}", e1, e2))
        }
    }
}

fn parse_attrs(raw: &[String]) -> anyhow::Result<HashMap<String, String>> {
    raw.iter()
        .map(|kv| {
            kv.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .ok_or_else(|| anyhow::anyhow!("attribute '{kv}' is not key=value"))
        })
        .collect()
}

fn print_view(shell: &WidgetShell) {
    let v = shell.view();
    println!("   👛 {}", v.connect_label);
    println!("   💰 Balance:        {}", v.balance_label);
    println!("   🔒 Staked:         {}", v.staked_label);
    println!("   📊 Total staked:   {}", v.total_staked_label);
    println!("   🎁 Pending (ETH):  {}", v.rewards_label);
    if !v.amount_input.is_empty() {
        println!("   ✏️  Amount:         {}", v.amount_input);
    }
    for a in &v.alerts {
        println!("   [{:?}] {}", a.kind, a.message);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.quiet { bonzi_stack::set_quiet_logging(true); }

    let mut cfg = load_config(&cli.config)?;

    // Resolve storage path: if relative, place under user's home at ~/.bonzi/<path>
    if std::path::Path::new(&cfg.storage.path).is_relative() {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        let abs = std::path::Path::new(&home).join(".bonzi").join(&cfg.storage.path);
        cfg.storage.path = abs.to_string_lossy().into_owned();
    }

    let store = storage::open(&cfg.storage)?;
    bonzi_stack::stack_log!("🗄️  Local storage opened at '{}'", cfg.storage.path);
    metrics::serve(cfg.metrics.clone())?;

    let provider = JsonRpcProvider::new(cfg.chain.rpc_url.clone())
        .map_err(|e| anyhow::anyhow!("wallet provider: {e}"))?;
    let provider: Arc<dyn Eip1193> = Arc::new(provider);
    let bridge = Arc::new(ProviderBridge::new(Some(provider)));
    let facade = Arc::new(ContractFacade::from_config(bridge.clone(), &cfg.chain));
    let embed = embed::EmbedConfig::from_attributes(&parse_attrs(&cli.attrs)?, &cfg.widget)?;
    let shell = Arc::new(WidgetShell::from_embed(&cfg, &embed, bridge.clone(), facade.clone()));
    let preferences = Arc::new(prefs::Preferences::new(store.clone()));

    match cli.cmd.unwrap_or(Cmd::Status) {
        Cmd::Status => {
            println!("--- bonzi stack ---");
            println!("   ⛓️  Chain {} via {}", cfg.chain.chain_id, cfg.chain.rpc_url);
            println!("   🪙 Token   {}", cfg.contracts.token);
            println!("   🧭 Router  {}", cfg.contracts.router);
            println!("   🏦 Staking {}", cfg.contracts.staking);
            println!("   🎨 Theme   {}", preferences.theme(&cfg.site.default_theme, false)?.as_str());
            println!("   🌐 Lang    {}", preferences.language()?);
            let policy = gate::GatePolicy::from_config(&cfg)?;
            let access = gate::AccessGate::new(bridge.clone(), facade.clone(), store.clone(), policy);
            println!("   🚪 Gate    {:?}", access.init()?);
        }
        Cmd::Connect => {
            shell.connect().await;
            print_view(&shell);
        }
        Cmd::Stake { amount } => {
            if shell.connect().await {
                shell.set_amount(&amount);
                shell.stake().await;
            }
            print_view(&shell);
        }
        Cmd::Unstake { amount } => {
            if shell.connect().await {
                shell.set_amount(&amount);
                shell.unstake().await;
            }
            print_view(&shell);
        }
        Cmd::Claim => {
            if shell.connect().await {
                shell.claim().await;
            }
            print_view(&shell);
        }
        Cmd::Max => {
            if shell.connect().await && shell.set_max().await {
                println!("{}", shell.view().amount_input);
            } else {
                print_view(&shell);
            }
        }
        Cmd::Gate => {
            let policy = gate::GatePolicy::from_config(&cfg)?;
            let access = gate::AccessGate::new(bridge.clone(), facade.clone(), store.clone(), policy);
            let mut state = access.init()?;
            if state == gate::GateState::Locked {
                state = access.connect().await;
            }
            println!("🚪 Gate: {:?}", state);
            if let Some(grant) = access.grant() {
                println!("   👛 {} (granted at {} ms)", units::short_address(&grant.wallet), grant.granted_at_ms);
            }
            if let Some(n) = access.notice() {
                println!("   {}", n.message());
            }
        }
        Cmd::GateRevoke => {
            let policy = gate::GatePolicy::from_config(&cfg)?;
            let access = gate::AccessGate::new(bridge.clone(), facade.clone(), store.clone(), policy);
            access.revoke()?;
            println!("🔒 Access grant removed");
        }
        Cmd::Translate { lang, path, keys } => {
            let source = assets::from_config(&cfg.site)?;
            let translator = i18n::Translator::new(source, path).with_preferences(preferences.clone());
            let mut nodes: Vec<i18n::TextNode> = keys.iter().map(|k| i18n::TextNode::new(k.clone(), "")).collect();
            translator.apply_translations(&lang, &mut nodes).await;
            for n in &nodes {
                if n.text.is_empty() {
                    println!("{} = <missing>", n.key);
                } else {
                    println!("{} = {}", n.key, n.text);
                }
            }
        }
        Cmd::Nav { path } => {
            println!("🧭 {}", path);
            println!("   fragment prefix: '{}'", site::path_prefix(&path, &cfg.site.subdirs));
            println!("   i18n base path:  '{}'", site::base_path(&path));
            println!("   active nav key:  {}", site::active_nav_key(&path).unwrap_or("-"));
            let source = assets::from_config(&cfg.site)?;
            match site::load_fragments(source.as_ref(), &path, &cfg.site.subdirs).await {
                Ok(f) => {
                    println!("--- nav ---\n{}", f.nav);
                    println!("--- mobile menu ---\n{}", f.mobile_menu);
                }
                Err(e) => eprintln!("❌ Failed to load navigation: {e}"),
            }
        }
        Cmd::EmbedUrl => {
            println!("{}", embed.widget_url()?);
            println!("   placement: {:?}", embed.placement());
            let c = shell.contracts();
            println!("   contracts: token={} router={} staking={}", c.token, c.router, c.staking);
        }
        Cmd::DevUnlock { key } => {
            let verifier = Arc::new(devmode::HttpKeyVerifier::new(&cfg.dev_mode.api_base)?);
            let dev = devmode::DevMode::new(store.clone(), verifier);
            match dev.unlock(&key).await? {
                devmode::UnlockOutcome::Unlocked => println!("🛠️  Dev mode enabled"),
                devmode::UnlockOutcome::InvalidKey => eprintln!("❌ Invalid key"),
                devmode::UnlockOutcome::Ignored => eprintln!("⚠️  Empty key ignored"),
            }
        }
        Cmd::DevStatus => {
            let verifier = Arc::new(devmode::HttpKeyVerifier::new(&cfg.dev_mode.api_base)?);
            let dev = devmode::DevMode::new(store.clone(), verifier);
            if dev.restore()? {
                let ok = dev.reverify().await?;
                println!("🛠️  Dev mode: {}", if ok { "enabled" } else { "revoked" });
            } else {
                println!("🛠️  Dev mode: disabled");
            }
        }
        Cmd::Theme { value } => {
            let default_setting = cfg.site.default_theme.as_str();
            let theme = match value.as_deref() {
                None => preferences.theme(default_setting, false)?,
                Some("toggle") => preferences.toggle_theme(default_setting, false)?,
                Some(v) => {
                    let t = prefs::Theme::parse(v).ok_or_else(|| anyhow::anyhow!("unknown theme '{v}'"))?;
                    preferences.set_theme(t)?;
                    t
                }
            };
            println!("🎨 {}", theme.as_str());
        }
        Cmd::Watch => {
            let policy = gate::GatePolicy::from_config(&cfg)?;
            let access = Arc::new(gate::AccessGate::new(bridge.clone(), facade.clone(), store.clone(), policy));
            access.init()?;
            let gate_events = gate::spawn_event_loop(access.clone());
            let widget_events = bonzi_stack::widget::spawn_event_loop(shell.clone());
            shell.connect().await;
            print_view(&shell);
            let watcher = wallet::spawn_session_watcher(
                bridge.clone(),
                Duration::from_millis(cfg.chain.session_poll_ms),
            );
            println!("   Press Ctrl+C to stop");
            signal::ctrl_c().await?;
            watcher.abort();
            widget_events.abort();
            gate_events.abort();
            print_view(&shell);
            println!("   🚪 Gate {:?}", access.state());
            println!("\n🛑 Stopped");
        }
    }

    Ok(())
}
