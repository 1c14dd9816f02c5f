//! Last-known wallet state
//!
//! Holds the balance, a recent-transaction window and the pending
//! deposit list for one user, refreshed on demand or from change-feed
//! events. Consistency is eventual: a resolved refresh reflects the
//! backing store as of query time, nothing stronger.
//!
//! Two guarantees matter here:
//! - a refresh already in flight absorbs further triggers instead of
//!   stacking concurrent store queries
//! - a failed refresh never overwrites previously cached values

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

use super::error::WalletError;
use crate::core_types::{TxId, UserId};
use crate::store::{Account, BackingStore, Transaction, TxKind};

/// Size of the recent-transaction window
pub const TRANSACTION_WINDOW: i64 = 20;

/// Whether the cached user sent or received a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxDirection {
    Sent,
    Received,
}

/// A transaction row formatted for display
#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    pub id: TxId,
    pub direction: TxDirection,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: String,
    pub memo: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Everything the wallet view needs, as of one refresh
#[derive(Debug, Clone, Serialize)]
pub struct WalletSnapshot {
    pub account: Account,
    pub transactions: Vec<TransactionView>,
    pub pending_deposits: Vec<Transaction>,
    pub refreshed_at: DateTime<Utc>,
}

impl WalletSnapshot {
    /// Derived total; never persisted separately
    pub fn total(&self) -> Decimal {
        self.account.total()
    }
}

/// Human description of a transaction from kind + direction +
/// counterparty handle
pub fn describe_transaction(
    kind: TxKind,
    is_sent: bool,
    counterparty: Option<&str>,
    own_description: &str,
) -> String {
    match kind {
        TxKind::Transfer => {
            let other = counterparty.unwrap_or("unknown");
            if is_sent {
                format!("Transfer to @{}", other)
            } else {
                format!("Transfer from @{}", other)
            }
        }
        TxKind::Deposit => "Wallet deposit".to_string(),
        TxKind::Withdrawal => "Withdrawal request".to_string(),
        TxKind::Reward => {
            if is_sent {
                "Reward sent to creator".to_string()
            } else {
                "Reward received from viewer".to_string()
            }
        }
        _ => {
            if own_description.is_empty() {
                "Transaction".to_string()
            } else {
                own_description.to_string()
            }
        }
    }
}

pub struct WalletCache {
    store: Arc<dyn BackingStore>,
    state: RwLock<Option<WalletSnapshot>>,
    /// Serializes refreshes; a failed try_lock means one is in flight
    gate: tokio::sync::Mutex<()>,
    /// Set by absorbed triggers; the in-flight refresh re-runs for them
    dirty: AtomicBool,
    next_revision: AtomicU64,
    applied_revision: AtomicU64,
}

impl WalletCache {
    pub fn new(store: Arc<dyn BackingStore>) -> Self {
        Self {
            store,
            state: RwLock::new(None),
            gate: tokio::sync::Mutex::new(()),
            dirty: AtomicBool::new(false),
            next_revision: AtomicU64::new(0),
            applied_revision: AtomicU64::new(0),
        }
    }

    /// Cached state, if any refresh has succeeded yet
    pub fn snapshot(&self) -> Option<WalletSnapshot> {
        self.state.read().unwrap().clone()
    }

    /// Cached available balance (advisory; may be stale)
    pub fn available(&self) -> Option<Decimal> {
        self.state.read().unwrap().as_ref().map(|s| s.account.available)
    }

    /// Revision of the currently applied snapshot (0 = never refreshed)
    pub fn revision(&self) -> u64 {
        self.applied_revision.load(Ordering::SeqCst)
    }

    /// Refresh the cached state from the backing store.
    ///
    /// If a refresh is already in flight the call is absorbed: the
    /// in-flight refresh runs once more before releasing, and this call
    /// returns immediately. Replies are fenced by revision; a reply
    /// older than the applied snapshot is discarded.
    pub async fn refresh(&self, user_id: UserId) -> Result<(), WalletError> {
        let _guard = match self.gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                self.dirty.store(true, Ordering::SeqCst);
                debug!("[cache] refresh absorbed by in-flight refresh");
                return Ok(());
            }
        };

        loop {
            self.dirty.store(false, Ordering::SeqCst);
            let revision = self.next_revision.fetch_add(1, Ordering::SeqCst) + 1;

            let snapshot = self.load(user_id).await?;

            if revision > self.applied_revision.load(Ordering::SeqCst) {
                self.applied_revision.store(revision, Ordering::SeqCst);
                *self.state.write().unwrap() = Some(snapshot);
            } else {
                debug!(revision, "[cache] discarding out-of-order refresh reply");
            }

            if !self.dirty.swap(false, Ordering::SeqCst) {
                return Ok(());
            }
        }
    }

    async fn load(&self, user_id: UserId) -> Result<WalletSnapshot, WalletError> {
        let (account, rows, pending_deposits) = futures::try_join!(
            self.store.fetch_account(user_id),
            self.store.recent_transactions(user_id, TRANSACTION_WINDOW),
            self.store.pending_deposits(user_id),
        )?;

        let account =
            account.ok_or_else(|| WalletError::NotFound("wallet account".to_string()))?;

        let transactions = rows
            .into_iter()
            .map(|row| {
                let is_sent = row.tx.sender_id == user_id;
                let counterparty = if is_sent {
                    row.receiver_handle.as_deref()
                } else {
                    Some(row.sender_handle.as_str())
                };
                TransactionView {
                    id: row.tx.id,
                    direction: if is_sent {
                        TxDirection::Sent
                    } else {
                        TxDirection::Received
                    },
                    amount: row.tx.amount,
                    fee: row.tx.fee,
                    status: row.tx.status.to_string(),
                    memo: row.tx.memo.clone(),
                    description: describe_transaction(
                        row.tx.kind,
                        is_sent,
                        counterparty,
                        &row.tx.description,
                    ),
                    created_at: row.tx.created_at,
                }
            })
            .collect();

        Ok(WalletSnapshot {
            account,
            transactions,
            pending_deposits,
            refreshed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::MockBackingStore;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_describe_transaction() {
        assert_eq!(
            describe_transaction(TxKind::Transfer, true, Some("bob"), ""),
            "Transfer to @bob"
        );
        assert_eq!(
            describe_transaction(TxKind::Transfer, false, Some("alice"), ""),
            "Transfer from @alice"
        );
        assert_eq!(
            describe_transaction(TxKind::Transfer, true, None, ""),
            "Transfer to @unknown"
        );
        assert_eq!(
            describe_transaction(TxKind::Deposit, true, None, ""),
            "Wallet deposit"
        );
        assert_eq!(
            describe_transaction(TxKind::Withdrawal, true, None, ""),
            "Withdrawal request"
        );
        assert_eq!(
            describe_transaction(TxKind::Reward, true, None, ""),
            "Reward sent to creator"
        );
        assert_eq!(
            describe_transaction(TxKind::Reward, false, None, ""),
            "Reward received from viewer"
        );
        assert_eq!(
            describe_transaction(TxKind::BlockchainTransfer, true, None, "Ledger transfer"),
            "Ledger transfer"
        );
        assert_eq!(
            describe_transaction(TxKind::BlockchainTransfer, true, None, ""),
            "Transaction"
        );
    }

    #[tokio::test]
    async fn test_refresh_populates_snapshot() {
        let store = Arc::new(MockBackingStore::new());
        let alice = store.seed_user("alice", "vdr1alice", dec("10.500"), dec("2"));
        let cache = WalletCache::new(store);

        cache.refresh(alice).await.unwrap();

        let snapshot = cache.snapshot().unwrap();
        assert_eq!(snapshot.account.available, dec("10.500"));
        assert_eq!(snapshot.total(), dec("12.500"));
        assert_eq!(cache.revision(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_values() {
        let store = Arc::new(MockBackingStore::new());
        let alice = store.seed_user("alice", "vdr1alice", dec("10"), Decimal::ZERO);
        let cache = WalletCache::new(store.clone());

        cache.refresh(alice).await.unwrap();
        store.set_fail_fetches(true);

        let err = cache.refresh(alice).await.unwrap_err();
        assert!(matches!(err, WalletError::DataUnavailable(_)));
        assert_eq!(cache.available(), Some(dec("10")));
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_coalesce() {
        let store = Arc::new(MockBackingStore::new());
        let alice = store.seed_user("alice", "vdr1alice", dec("10"), Decimal::ZERO);
        store.set_fetch_delay_ms(30);
        let cache = Arc::new(WalletCache::new(store.clone()));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.refresh(alice).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(
            store.max_concurrent_fetches(),
            1,
            "rapid triggers must not stack concurrent store queries"
        );
        assert!(cache.snapshot().is_some());
    }
}
