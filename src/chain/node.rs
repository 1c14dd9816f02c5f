//! LedgerNode seam
//!
//! Broadcast and lookup against the external distributed ledger. The
//! network settles asynchronously with no latency bound; a broadcast is
//! irreversible once accepted.

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::fmt::Debug;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid account name: {0}")]
    InvalidAccount(String),
    #[error("Broadcast rejected: {0}")]
    Rejected(String),
}

/// On-ledger balances of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerBalance {
    pub balance: Decimal,
    pub reward_balance: Decimal,
}

/// A value transfer handed to the network
#[derive(Debug, Clone)]
pub struct BroadcastTransfer {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub memo: String,
}

#[async_trait]
pub trait LedgerNode: Send + Sync + Debug {
    /// Sign and submit a value transfer; returns the network
    /// transaction id. Irreversible once accepted.
    async fn broadcast_transfer(
        &self,
        transfer: BroadcastTransfer,
        signing_key: &str,
    ) -> Result<String, ChainError>;

    /// Balances of an on-ledger account, None if it does not exist
    async fn account_balance(&self, account: &str) -> Result<Option<LedgerBalance>, ChainError>;
}

/// In-memory ledger node for tests and local development.
///
/// Network transaction ids are deterministic (hash of the transfer and
/// a sequence number) so assertions can be stable.
#[derive(Debug, Default)]
pub struct MockLedgerNode {
    accounts: DashMap<String, LedgerBalance>,
    broadcasts: Mutex<Vec<BroadcastTransfer>>,
    seq: AtomicU64,
    fail_broadcasts: AtomicBool,
}

impl MockLedgerNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_account(&self, name: &str, balance: Decimal, reward_balance: Decimal) {
        self.accounts.insert(
            name.to_string(),
            LedgerBalance {
                balance,
                reward_balance,
            },
        );
    }

    /// Make every broadcast fail (network unreachable)
    pub fn set_fail_broadcasts(&self, fail: bool) {
        self.fail_broadcasts.store(fail, Ordering::SeqCst);
    }

    /// Transfers the node has accepted, in order
    pub fn broadcasts(&self) -> Vec<BroadcastTransfer> {
        self.broadcasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerNode for MockLedgerNode {
    async fn broadcast_transfer(
        &self,
        transfer: BroadcastTransfer,
        _signing_key: &str,
    ) -> Result<String, ChainError> {
        if self.fail_broadcasts.load(Ordering::SeqCst) {
            return Err(ChainError::Network("node unreachable".to_string()));
        }
        if !super::keys::is_account_name(&transfer.to) {
            return Err(ChainError::InvalidAccount(transfer.to));
        }

        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let digest = md5::compute(format!(
            "{}:{}:{}:{}:{}",
            seq, transfer.from, transfer.to, transfer.amount, transfer.memo
        ));
        self.broadcasts.lock().unwrap().push(transfer);

        Ok(format!("{:x}", digest))
    }

    async fn account_balance(&self, account: &str) -> Result<Option<LedgerBalance>, ChainError> {
        Ok(self.accounts.get(account).map(|b| *b))
    }
}
