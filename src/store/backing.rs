//! BackingStore seam
//!
//! The relational store owns all Account/Transaction rows and the two
//! authoritative procedures. This crate orchestrates calls into it and
//! never applies money movement locally.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{
    Account, NewTransaction, SettlementCheck, Transaction, TransactionWithParties,
    TransferFundsCall, TransferOutcome,
};
use crate::core_types::{TxId, UserId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Backing store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed procedure result: {0}")]
    MalformedResult(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TxId),
}

#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Current account row, if the user has a provisioned wallet
    async fn fetch_account(&self, user_id: UserId) -> Result<Option<Account>, StoreError>;

    /// Most recent transactions where the user is sender or receiver,
    /// newest first, joined with both parties' handles
    async fn recent_transactions(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<TransactionWithParties>, StoreError>;

    /// The user's pending deposit intents, newest first
    async fn pending_deposits(&self, user_id: UserId) -> Result<Vec<Transaction>, StoreError>;

    /// Record a local transaction row (pending deposit intents and
    /// external-transfer intents). Does not move any balance.
    async fn insert_transaction(&self, new: NewTransaction) -> Result<Transaction, StoreError>;

    /// The single authoritative internal-transfer procedure: one atomic
    /// server-side transaction, re-validating balance and receiver.
    async fn transfer_funds(&self, call: TransferFundsCall) -> Result<TransferOutcome, StoreError>;

    /// The authoritative settlement check for a pending deposit. Always
    /// polls the indexer; safe to call repeatedly.
    async fn confirm_pending_deposit(&self, tx_id: TxId) -> Result<SettlementCheck, StoreError>;
}
