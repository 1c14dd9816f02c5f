//! Vidora Wallet Core
//!
//! Wallet/ledger orchestration for the Vidora platform: cached balances,
//! internal and external value transfers, pending-deposit reconciliation
//! and change-feed driven refresh. True atomicity for money movement
//! lives in the backing store's procedures; this crate orchestrates
//! calls into them.
//!
//! # Modules
//!
//! - [`core_types`] - Shared id aliases and amount conventions
//! - [`fees`] - Platform fee schedules (pure calculation)
//! - [`directory`] - Identity resolution and prefix search
//! - [`store`] - Backing store seam: rows, procedures, change feed
//! - [`chain`] - External ledger node seam and signing-key checks
//! - [`fiat`] - Payment gateway seam for fiat deposits
//! - [`wallet`] - Cache, transfer coordinator, deposit reconciler,
//!   feed listener and the service facade

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod logging;

pub mod chain;
pub mod directory;
pub mod fees;
pub mod fiat;
pub mod store;
pub mod wallet;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use core_types::{TxId, UserId};
pub use directory::{Identity, UserResolver};
pub use fees::{FeeBreakdown, FeeSchedule};
pub use store::{Account, BackingStore, Transaction, TxKind, TxStatus};
pub use wallet::{
    DepositHandle, DepositReconciler, Session, TransferCoordinator, WalletCache, WalletError,
    WalletService, WalletSnapshot,
};
