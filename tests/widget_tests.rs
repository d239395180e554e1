// Widget Shell Tests
// User-facing alerts, tab refreshes, MAX, buy URL and reaction to wallet events

mod common;

use alloy_primitives::{Address, U256};
use bonzi_stack::config;
use bonzi_stack::embed::EmbedConfig;
use bonzi_stack::widget::{AlertKind, CONNECT_LABEL, EMPTY_STAT};
use bonzi_stack::{ProviderBridge, SessionEvent, Tab, WidgetShell};
use common::{contracts, harness, harness_without_provider, owner, tokens, Harness};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const BUY_URL: &str = "https://app.example.org/swap";

fn shell(h: &Harness) -> WidgetShell {
    WidgetShell::new(h.bridge.clone(), h.facade.clone(), contracts(), 1, "$BONZI", BUY_URL)
}

fn fund(h: &Harness, amount: U256) {
    h.wallet.with(|s| {
        s.balances.insert((contracts().token, owner()), amount);
    });
}

#[tokio::test]
async fn test_connect_fills_stats() {
    println!("🧪 Testing widget connect...");

    let h = harness();
    fund(&h, tokens(1_234_567));
    let w = shell(&h);
    assert_eq!(w.view().connect_label, CONNECT_LABEL);
    assert!(!w.view().actions_enabled);

    assert!(w.connect().await);
    let v = w.view();
    assert_eq!(v.connect_label, "0xa1a1...a1a1");
    assert!(v.actions_enabled);
    assert!(v.loading.is_none());
    assert_eq!(v.balance_label, "1.23M $BONZI");
    assert_eq!(v.staked_label, "0.00 $BONZI");
    assert_eq!(v.rewards_label, "0.000000");
    assert!(v.alerts.is_empty());
    println!("  ✅ Connected label and stats rendered");
}

#[tokio::test]
async fn test_connect_failures_show_alerts() {
    println!("🧪 Testing widget connect failures...");

    let (bridge, facade) = harness_without_provider();
    let w = WidgetShell::new(bridge, facade, contracts(), 1, "$BONZI", BUY_URL);
    assert!(!w.connect().await);
    let alert = w.view().last_alert().cloned().expect("install alert");
    assert_eq!(alert.kind, AlertKind::Error);
    assert_eq!(alert.message, "Please install MetaMask or another Web3 wallet to continue.");
    println!("  ✅ Missing provider prompts an install");

    let h = harness();
    h.wallet.with(|s| s.reject_connect = true);
    let w = shell(&h);
    assert!(!w.connect().await);
    assert!(w.view().alerts.is_empty(), "A dismissed prompt is silent");
    assert_eq!(w.view().connect_label, CONNECT_LABEL);
    println!("  ✅ Rejected prompt returns quietly");

    let h = harness();
    h.wallet.with(|s| {
        s.chain_id = 5;
        s.reject_switch = true;
    });
    let w = shell(&h);
    assert!(!w.connect().await);
    assert_eq!(w.view().last_alert().unwrap().message, "Please switch to Ethereum Mainnet.");
    assert!(!w.view().actions_enabled);
    println!("  ✅ Refused chain switch asks for mainnet");
}

#[tokio::test]
async fn test_connect_switches_chain_when_possible() {
    println!("🧪 Testing automatic chain switch...");

    let h = harness();
    h.wallet.with(|s| s.chain_id = 5);
    let w = shell(&h);
    assert!(w.connect().await);
    assert_eq!(h.wallet.count("wallet_switchEthereumChain"), 1);
    assert_eq!(h.bridge.session().chain_id, Some(1));
    println!("  ✅ Wallet switched to chain 1");
}

#[tokio::test]
async fn test_amount_prompts_and_success_messages() {
    println!("🧪 Testing stake/unstake/claim alerts...");

    let h = harness();
    fund(&h, tokens(100));
    let w = shell(&h);
    w.connect().await;

    w.set_amount("0");
    assert!(!w.stake().await);
    assert_eq!(w.view().last_alert().unwrap().message, "Please enter an amount to stake.");
    w.set_amount("");
    assert!(!w.unstake().await);
    assert_eq!(w.view().last_alert().unwrap().message, "Please enter an amount to unstake.");
    assert_eq!(h.wallet.count("send:hardstake"), 0);

    w.set_amount("40");
    assert!(w.stake().await);
    let v = w.view();
    assert_eq!(v.last_alert().unwrap().kind, AlertKind::Success);
    assert_eq!(v.last_alert().unwrap().message, "Tokens staked successfully!");
    assert_eq!(v.amount_input, "", "Input cleared after success");
    assert_eq!(v.staked_label, "40.00 $BONZI");
    assert_eq!(v.balance_label, "60.00 $BONZI");
    assert!(v.actions_enabled);
    assert!(v.loading.is_none());

    w.set_amount("15");
    assert!(w.unstake().await);
    assert_eq!(w.view().last_alert().unwrap().message, "Tokens unstaked successfully!");
    assert_eq!(w.view().staked_label, "25.00 $BONZI");

    assert!(w.claim().await);
    assert_eq!(w.view().last_alert().unwrap().message, "Rewards claimed successfully!");
    println!("  ✅ Prompts and success alerts match each action");
}

#[tokio::test]
async fn test_failed_and_cancelled_actions() {
    println!("🧪 Testing failure alerts...");

    let h = harness();
    fund(&h, tokens(10));
    let w = shell(&h);
    w.connect().await;

    w.set_amount("3");
    assert!(!w.unstake().await);
    let alert = w.view().last_alert().cloned().unwrap();
    assert_eq!(alert.kind, AlertKind::Error);
    assert_eq!(alert.message, "Unstaking failed: unstake transaction reverted");
    assert_eq!(w.view().amount_input, "3", "Input kept after a failure");

    h.wallet.with(|s| s.reject_tx = true);
    assert!(!w.claim().await);
    let alert = w.view().last_alert().cloned().unwrap();
    assert_eq!(alert.kind, AlertKind::Info);
    assert_eq!(alert.message, "Transaction cancelled.");
    assert!(w.view().actions_enabled, "Buttons re-enabled after a cancel");
    println!("  ✅ Revert and cancel produce distinct alerts");
}

#[tokio::test]
async fn test_action_while_disconnected_starts_connect() {
    println!("🧪 Testing action before connecting...");

    let h = harness();
    let w = shell(&h);
    w.set_amount("1");
    assert!(!w.stake().await);
    assert_eq!(h.wallet.count("eth_requestAccounts"), 1);
    assert_eq!(h.wallet.count("send:hardstake"), 0);
    assert!(w.view().actions_enabled, "Connected now, ready for the next click");
    println!("  ✅ First click connects instead of staking");
}

#[tokio::test]
async fn test_max_fills_full_precision_balance() {
    println!("🧪 Testing MAX button...");

    let h = harness();
    let w = shell(&h);
    assert!(!w.set_max().await);
    assert_eq!(w.view().last_alert().unwrap().message, "Please connect your wallet first.");

    fund(&h, tokens(12) + U256::from(345_000_000_000_000_000u64));
    w.connect().await;
    assert!(w.set_max().await);
    assert_eq!(w.view().amount_input, "12.345");
    println!("  ✅ MAX uses the untruncated balance");
}

#[tokio::test]
async fn test_stake_and_earn_tabs_refresh() {
    println!("🧪 Testing tab refresh...");

    let h = harness();
    fund(&h, tokens(5));
    let w = shell(&h);
    w.switch_tab(Tab::Stake).await;
    assert_eq!(h.wallet.count("eth_call:totalStaked"), 0, "No reads while disconnected");

    w.connect().await;
    let after_connect = h.wallet.count("eth_call:totalStaked");
    w.switch_tab(Tab::Buy).await;
    assert_eq!(h.wallet.count("eth_call:totalStaked"), after_connect);
    w.switch_tab(Tab::Earn).await;
    assert_eq!(h.wallet.count("eth_call:totalStaked"), after_connect + 1);
    assert_eq!(w.view().tab, Tab::Earn);
    println!("  ✅ Only stake/earn tabs re-read");
}

#[tokio::test]
async fn test_chain_and_account_changes_clear_stats() {
    println!("🧪 Testing session events...");

    let h = harness();
    fund(&h, tokens(5));
    let w = shell(&h);
    w.connect().await;
    assert_ne!(w.view().balance_label, EMPTY_STAT);

    h.bridge.handle_chain_changed(5);
    w.handle_session_event(&SessionEvent::ChainChanged(5)).await;
    let v = w.view();
    assert_eq!(v.balance_label, EMPTY_STAT);
    assert_eq!(v.staked_label, EMPTY_STAT);
    assert!(v.snapshot.is_none());
    assert!(!v.actions_enabled);
    assert_eq!(v.last_alert().unwrap().message, "Please switch to Ethereum Mainnet.");
    println!("  ✅ Wrong chain clears every amount");

    h.bridge.handle_chain_changed(1);
    w.handle_session_event(&SessionEvent::ChainChanged(1)).await;
    assert_eq!(w.view().balance_label, "5.00 $BONZI");
    assert!(w.view().actions_enabled);

    let other = Address::repeat_byte(0xC3);
    h.bridge.handle_accounts_changed(&[other]);
    w.handle_session_event(&SessionEvent::AccountChanged(other)).await;
    let v = w.view();
    assert_eq!(v.connect_label, "0xc3c3...c3c3");
    assert_eq!(v.balance_label, "0.00 $BONZI", "Re-read for the new account");
    println!("  ✅ Account change re-reads for the new owner");

    h.bridge.handle_accounts_changed(&[]);
    w.handle_session_event(&SessionEvent::Disconnected).await;
    let v = w.view();
    assert_eq!(v.connect_label, CONNECT_LABEL);
    assert_eq!(v.balance_label, EMPTY_STAT);
    assert!(!v.actions_enabled);
    println!("  ✅ Disconnect resets the widget");
}

#[tokio::test]
async fn test_event_loop_follows_bridge() {
    println!("🧪 Testing spawned event loop...");

    let h = harness();
    fund(&h, tokens(5));
    let w = Arc::new(shell(&h));
    w.connect().await;
    let task = bonzi_stack::widget::spawn_event_loop(w.clone());

    h.bridge.handle_chain_changed(137);
    let mut cleared = false;
    for _ in 0..100 {
        if w.view().balance_label == EMPTY_STAT {
            cleared = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(cleared, "Chain change should reach the widget");
    task.abort();
    println!("  ✅ Bridge events drive the widget");
}

#[tokio::test]
async fn test_buy_url_carries_token_and_symbol() {
    println!("🧪 Testing buy iframe URL...");

    let bridge = Arc::new(ProviderBridge::new(None));
    let facade = Arc::new(bonzi_stack::ContractFacade::new(bridge.clone()));
    let w = WidgetShell::new(bridge, facade, contracts(), 1, "$BONZI", BUY_URL);
    let url = w.buy_url().expect("buy url");
    assert_eq!(
        url,
        "https://app.example.org/swap?token=0x7070707070707070707070707070707070707070&symbol=%24BONZI&embed=true"
    );
    println!("  ✅ Buy URL built");
}

fn approve_router(h: &Harness) {
    h.wallet.with(|s| {
        s.allowances.insert((contracts().token, owner(), contracts().router), U256::MAX);
    });
}

async fn wait_for(h: &Harness, entry: &str) {
    while h.wallet.count(entry) == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test]
async fn test_account_switch_mid_stake_shows_new_account() {
    println!("🧪 Testing account switch while a stake confirms...");

    let h = harness();
    let other = Address::repeat_byte(0xB2);
    fund(&h, tokens(5_000));
    approve_router(&h);
    h.wallet.with(|s| {
        s.balances.insert((contracts().token, other), tokens(7));
    });
    let w = shell(&h);
    w.connect().await;
    h.wallet.with(|s| s.receipt_delay = 3);

    w.set_amount("10");
    let switch = async {
        wait_for(&h, "receipt-pending:hardstake").await;
        h.wallet.with(|s| s.accounts = vec![other]);
        h.bridge.handle_accounts_changed(&[other]);
        w.handle_session_event(&SessionEvent::AccountChanged(other)).await;
    };
    let (staked, ()) = tokio::join!(w.stake(), switch);

    assert!(staked, "The stake itself confirmed");
    let v = w.view();
    assert_eq!(v.connect_label, "0xb2b2...b2b2");
    assert_eq!(v.balance_label, "7.00 $BONZI", "Balance belongs to the new account");
    assert_eq!(v.staked_label, "0.00 $BONZI");
    assert_eq!(v.snapshot.as_ref().map(|s| s.position.owner), Some(other));
    assert!(v.actions_enabled);
    println!("  ✅ Old owner's post-stake balances were discarded");
}

#[tokio::test]
async fn test_reads_overtaken_by_an_action_are_dropped() {
    println!("🧪 Testing refresh racing a stake...");

    let h = harness();
    fund(&h, tokens(100));
    approve_router(&h);
    let w = shell(&h);
    w.connect().await;

    w.set_amount("40");
    let (refreshed, staked) = tokio::join!(w.refresh(), w.stake());
    assert!(!refreshed, "Refresh started before the stake must not be shown");
    assert!(staked);
    assert_eq!(w.view().balance_label, "60.00 $BONZI");
    assert_eq!(w.view().staked_label, "40.00 $BONZI");
    println!("  ✅ Pre-stake refresh dropped");

    w.set_amount("10");
    let (maxed, staked) = tokio::join!(w.set_max(), w.stake());
    assert!(!maxed);
    assert!(staked);
    assert_eq!(w.view().amount_input, "", "MAX read before the stake does not refill the input");
    println!("  ✅ Pre-stake MAX dropped");
}

#[tokio::test]
async fn test_refresh_dropped_when_session_changes_during_read() {
    println!("🧪 Testing refresh racing an account change...");

    let h = harness();
    fund(&h, tokens(100));
    let w = shell(&h);
    w.connect().await;
    fund(&h, tokens(50));

    let other = Address::repeat_byte(0xC3);
    let (refreshed, ()) = tokio::join!(w.refresh(), async { h.bridge.handle_accounts_changed(&[other]) });
    assert!(!refreshed);
    assert_eq!(w.view().balance_label, "100.00 $BONZI", "Read for the old account was not applied");

    assert!(w.refresh().await);
    assert_eq!(w.view().balance_label, "0.00 $BONZI");
    println!("  ✅ Only reads from the current session are shown");
}

#[tokio::test]
async fn test_chain_switch_mid_action_keeps_actions_disabled() {
    println!("🧪 Testing chain switch while a stake confirms...");

    let h = harness();
    fund(&h, tokens(100));
    approve_router(&h);
    let w = shell(&h);
    w.connect().await;
    h.wallet.with(|s| s.receipt_delay = 3);

    w.set_amount("10");
    let switch = async {
        wait_for(&h, "receipt-pending:hardstake").await;
        h.bridge.handle_chain_changed(5);
    };
    let (staked, ()) = tokio::join!(w.stake(), switch);

    assert!(staked);
    let v = w.view();
    assert!(!v.actions_enabled, "Actions stay off on the wrong chain");
    assert_eq!(v.balance_label, EMPTY_STAT);
    assert!(v.snapshot.is_none());
    println!("  ✅ No amounts or actions on the wrong chain");
}

#[tokio::test]
async fn test_embed_overrides_pick_contracts() {
    println!("🧪 Testing embed contract overrides...");

    let cfg = config::load_from_str(
        r#"
        [contracts]
        token = "0x7070707070707070707070707070707070707070"
        router = "0x7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e"
        staking = "0x5757575757575757575757575757575757575757"

        [storage]
        path = "data"
        "#,
    )
    .expect("config");
    let brand = Address::repeat_byte(0x71);
    let brand_s = brand.to_string();
    let attrs: HashMap<String, String> = [("data-token", brand_s.as_str()), ("data-symbol", "$VISTA")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let embed = EmbedConfig::from_attributes(&attrs, &cfg.widget).expect("embed");

    let h = harness();
    h.wallet.with(|s| {
        s.balances.insert((brand, owner()), tokens(42));
    });
    let w = WidgetShell::from_embed(&cfg, &embed, h.bridge.clone(), h.facade.clone());
    assert_eq!(w.contracts().token, brand);
    assert_eq!(w.contracts().router, contracts().router, "Router falls back to the configured one");

    w.connect().await;
    assert_eq!(w.view().balance_label, "42.00 $VISTA");
    println!("  ✅ Widget reads the overridden token");
}
