// Library interface for the bonzi site stack
// Wallet bridge, contract facade, access gate, staking workflow and widget shell,
// plus the site plumbing (i18n, nav fragments, embed parameters, dev mode).

use std::sync::atomic::{AtomicBool, Ordering};

pub mod config;
pub mod error;
pub mod rpc;
pub mod wallet;
pub mod abi;
pub mod contracts;
pub mod units;
pub mod storage;
pub mod prefs;
pub mod gate;
pub mod staking;
pub mod widget;
pub mod embed;
pub mod assets;
pub mod i18n;
pub mod site;
pub mod devmode;
pub mod metrics;

#[doc(hidden)]
pub static QUIET: AtomicBool = AtomicBool::new(false);

/// Toggle routine progress logging. Errors/warnings still log.
pub fn set_quiet_logging(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

pub fn quiet_logging() -> bool {
    QUIET.load(Ordering::Relaxed)
}

#[macro_export]
macro_rules! stack_log {
    ($($arg:tt)*) => {
        if !$crate::quiet_logging() {
            println!($($arg)*);
        }
    };
}

pub use error::{ProviderError, WalletError};
pub use rpc::{Eip1193, JsonRpcProvider};
pub use wallet::{ProviderBridge, SessionEvent, WalletSession};
pub use contracts::{ContractFacade, PendingTx, StakeInfo, TxKind};
pub use gate::{AccessGate, AccessGrant, GatePolicy, GateState};
pub use staking::{Action, Progress, StakeWorkflow};
pub use storage::{LocalStorage, MemoryStorage, Store};
pub use widget::{Tab, WidgetShell};
