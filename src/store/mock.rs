//! In-memory backing store for tests and local development
//!
//! Mirrors the authoritative semantics of the real store's procedures:
//! server-side balance re-validation, memo-keyed idempotency on
//! transfers, and poll-based settlement matching for deposits.

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::backing::{BackingStore, StoreError};
use super::models::{
    Account, NewTransaction, SettlementCheck, Transaction, TransactionWithParties,
    TransferFundsCall, TransferOutcome, TxKind, TxStatus,
};
use crate::core_types::{TxId, UserId};
use crate::fees::FeeSchedule;

/// A value transfer observed on the external ledger, as the store's
/// indexer would report it
#[derive(Debug, Clone)]
struct LedgerSettlement {
    memo: String,
    amount: Decimal,
}

#[derive(Default)]
pub struct MockBackingStore {
    accounts: DashMap<UserId, Account>,
    handle_to_user: DashMap<String, UserId>,
    user_to_handle: DashMap<UserId, String>,
    transactions: Mutex<Vec<Transaction>>,
    settlements: Mutex<Vec<LedgerSettlement>>,

    transfer_calls: AtomicUsize,
    fetches_in_flight: AtomicUsize,
    max_concurrent_fetches: AtomicUsize,
    fetch_delay_ms: AtomicUsize,
    fail_fetches: AtomicBool,
}

impl MockBackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a user with a wallet account row
    pub fn seed_user(
        &self,
        handle: &str,
        ledger_account: &str,
        available: Decimal,
        rewards: Decimal,
    ) -> UserId {
        let user_id = uuid::Uuid::new_v4();
        self.accounts.insert(
            user_id,
            Account {
                user_id,
                ledger_account: ledger_account.to_string(),
                available,
                rewards,
            },
        );
        self.handle_to_user.insert(handle.to_string(), user_id);
        self.user_to_handle.insert(user_id, handle.to_string());
        user_id
    }

    /// Simulate a settlement appearing on the external ledger
    pub fn post_settlement(&self, memo: &str, amount: Decimal) {
        self.settlements.lock().unwrap().push(LedgerSettlement {
            memo: memo.to_string(),
            amount,
        });
    }

    pub fn account(&self, user_id: UserId) -> Option<Account> {
        self.accounts.get(&user_id).map(|a| a.clone())
    }

    pub fn transaction(&self, tx_id: TxId) -> Option<Transaction> {
        self.transactions
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == tx_id)
            .cloned()
    }

    /// Number of authoritative transfer calls made
    pub fn transfer_call_count(&self) -> usize {
        self.transfer_calls.load(Ordering::SeqCst)
    }

    /// High-water mark of concurrent account fetches
    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_concurrent_fetches.load(Ordering::SeqCst)
    }

    /// Hold every fetch open for `ms` so concurrency is observable
    pub fn set_fetch_delay_ms(&self, ms: usize) {
        self.fetch_delay_ms.store(ms, Ordering::SeqCst);
    }

    /// Make reads fail (store unreachable)
    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    fn handle_of(&self, user_id: UserId) -> String {
        self.user_to_handle
            .get(&user_id)
            .map(|h| h.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn reject(reason: &str) -> TransferOutcome {
        TransferOutcome {
            success: false,
            transaction_id: None,
            amount: None,
            fee: None,
            net_amount: None,
            reason: Some(reason.to_string()),
        }
    }
}

#[async_trait]
impl BackingStore for MockBackingStore {
    async fn fetch_account(&self, user_id: UserId) -> Result<Option<Account>, StoreError> {
        let in_flight = self.fetches_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_fetches
            .fetch_max(in_flight, Ordering::SeqCst);

        let delay = self.fetch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }

        self.fetches_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(self.account(user_id))
    }

    async fn recent_transactions(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<TransactionWithParties>, StoreError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        let rows = self.transactions.lock().unwrap();
        Ok(rows
            .iter()
            .rev()
            .filter(|t| t.sender_id == user_id || t.receiver_id == Some(user_id))
            .take(limit as usize)
            .map(|t| TransactionWithParties {
                tx: t.clone(),
                sender_handle: self.handle_of(t.sender_id),
                receiver_handle: t.receiver_id.map(|r| self.handle_of(r)),
            })
            .collect())
    }

    async fn pending_deposits(&self, user_id: UserId) -> Result<Vec<Transaction>, StoreError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        let rows = self.transactions.lock().unwrap();
        Ok(rows
            .iter()
            .rev()
            .filter(|t| {
                t.sender_id == user_id
                    && t.kind == TxKind::Deposit
                    && t.status == TxStatus::Pending
            })
            .cloned()
            .collect())
    }

    async fn insert_transaction(&self, new: NewTransaction) -> Result<Transaction, StoreError> {
        let mut rows = self.transactions.lock().unwrap();

        // Partial unique index in the real schema: one pending row per
        // (sender, memo).
        let duplicate = rows.iter().any(|t| {
            t.sender_id == new.sender_id && t.status == TxStatus::Pending && t.memo == new.memo
        });
        if duplicate {
            return Err(StoreError::Unavailable(format!(
                "duplicate pending memo: {}",
                new.memo
            )));
        }

        let tx = Transaction {
            id: uuid::Uuid::new_v4(),
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            amount: new.amount,
            fee: new.fee,
            kind: new.kind,
            status: new.status,
            memo: new.memo,
            description: new.description,
            metadata: new.metadata,
            created_at: Utc::now(),
        };
        rows.push(tx.clone());
        Ok(tx)
    }

    async fn transfer_funds(&self, call: TransferFundsCall) -> Result<TransferOutcome, StoreError> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);

        let Some(sender_id) = self.handle_to_user.get(&call.sender_handle).map(|u| *u) else {
            return Ok(Self::reject("sender not found"));
        };
        let Some(receiver_id) = self.handle_to_user.get(&call.receiver_handle).map(|u| *u)
        else {
            return Ok(Self::reject("receiver not found"));
        };

        // Idempotent replay: an identical memo from the same sender
        // returns the originally applied outcome.
        {
            let rows = self.transactions.lock().unwrap();
            if let Some(prior) = rows.iter().find(|t| {
                t.sender_id == sender_id && t.kind == TxKind::Transfer && t.memo == call.memo
            }) {
                return Ok(TransferOutcome {
                    success: true,
                    transaction_id: Some(prior.id),
                    amount: Some(prior.amount),
                    fee: Some(prior.fee),
                    net_amount: Some(prior.amount - prior.fee),
                    reason: None,
                });
            }
        }

        // Authoritative balance re-check; the client-side check is
        // advisory only.
        {
            let sender = self.accounts.get(&sender_id).expect("seeded sender");
            if sender.available < call.amount {
                return Ok(Self::reject("insufficient funds"));
            }
        }

        let split = FeeSchedule::peer_transfer().calculate(call.amount);
        self.accounts.get_mut(&sender_id).unwrap().available -= call.amount;
        self.accounts.get_mut(&receiver_id).unwrap().available += split.net_amount;

        let tx = Transaction {
            id: uuid::Uuid::new_v4(),
            sender_id,
            receiver_id: Some(receiver_id),
            amount: call.amount,
            fee: split.fee,
            kind: TxKind::Transfer,
            status: TxStatus::Confirmed,
            memo: call.memo,
            description: call.description,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        };
        self.transactions.lock().unwrap().push(tx.clone());

        Ok(TransferOutcome {
            success: true,
            transaction_id: Some(tx.id),
            amount: Some(call.amount),
            fee: Some(split.fee),
            net_amount: Some(split.net_amount),
            reason: None,
        })
    }

    async fn confirm_pending_deposit(&self, tx_id: TxId) -> Result<SettlementCheck, StoreError> {
        let (sender_id, memo, amount, status) = {
            let rows = self.transactions.lock().unwrap();
            let row = rows
                .iter()
                .find(|t| t.id == tx_id && t.kind == TxKind::Deposit)
                .ok_or(StoreError::TransactionNotFound(tx_id))?;
            (row.sender_id, row.memo.clone(), row.amount, row.status)
        };

        match status {
            TxStatus::Confirmed => {
                let balance = self.accounts.get(&sender_id).expect("seeded user");
                return Ok(SettlementCheck::AlreadySettled {
                    new_balance: balance.available,
                });
            }
            TxStatus::Failed => {
                return Ok(SettlementCheck::Mismatch {
                    reason: "deposit previously failed settlement checks".to_string(),
                });
            }
            TxStatus::Pending => {}
        }

        let settlement = {
            let settlements = self.settlements.lock().unwrap();
            settlements.iter().find(|s| s.memo == memo).cloned()
        };

        let Some(settlement) = settlement else {
            return Ok(SettlementCheck::NotYetSettled);
        };

        if settlement.amount != amount {
            let mut rows = self.transactions.lock().unwrap();
            if let Some(row) = rows.iter_mut().find(|t| t.id == tx_id) {
                row.status = TxStatus::Failed;
            }
            return Ok(SettlementCheck::Mismatch {
                reason: format!(
                    "amount mismatch: expected {}, settled {}",
                    amount, settlement.amount
                ),
            });
        }

        let new_balance = {
            let mut account = self.accounts.get_mut(&sender_id).expect("seeded user");
            account.available += amount;
            account.available
        };
        {
            let mut rows = self.transactions.lock().unwrap();
            if let Some(row) = rows.iter_mut().find(|t| t.id == tx_id) {
                row.status = TxStatus::Confirmed;
            }
        }

        Ok(SettlementCheck::Settled { new_balance })
    }
}
