//! Row models and stored-procedure payloads of the wallet backing store

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core_types::{TxId, UserId};

/// Wallet transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Transfer,
    Deposit,
    Withdrawal,
    Reward,
    BlockchainTransfer,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxKind::Transfer => write!(f, "transfer"),
            TxKind::Deposit => write!(f, "deposit"),
            TxKind::Withdrawal => write!(f, "withdrawal"),
            TxKind::Reward => write!(f, "reward"),
            TxKind::BlockchainTransfer => write!(f, "blockchain_transfer"),
        }
    }
}

impl FromStr for TxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(TxKind::Transfer),
            "deposit" => Ok(TxKind::Deposit),
            "withdrawal" => Ok(TxKind::Withdrawal),
            "reward" => Ok(TxKind::Reward),
            "blockchain_transfer" => Ok(TxKind::BlockchainTransfer),
            _ => Err(format!("Invalid transaction kind: {}", s)),
        }
    }
}

/// Wallet transaction status.
///
/// A pending row may only transition status; amount and fee are frozen
/// at insert time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    #[default]
    Pending,
    Confirmed,
    Failed,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Pending => write!(f, "pending"),
            TxStatus::Confirmed => write!(f, "confirmed"),
            TxStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TxStatus::Pending),
            "confirmed" => Ok(TxStatus::Confirmed),
            "failed" => Ok(TxStatus::Failed),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

/// A user's wallet account row.
///
/// Owned by the backing store; the crate holds cached copies only.
/// The total is always derived, never persisted separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    /// Account identifier on the external distributed ledger
    pub ledger_account: String,
    pub available: Decimal,
    pub rewards: Decimal,
}

impl Account {
    pub fn total(&self) -> Decimal {
        self.available + self.rewards
    }
}

/// Wallet transaction row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub sender_id: UserId,
    pub receiver_id: Option<UserId>,
    pub amount: Decimal,
    pub fee: Decimal,
    pub kind: TxKind,
    pub status: TxStatus,
    pub memo: String,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A transaction row joined with both parties' handles, as the recent
/// activity query returns it
#[derive(Debug, Clone)]
pub struct TransactionWithParties {
    pub tx: Transaction,
    pub sender_handle: String,
    pub receiver_handle: Option<String>,
}

/// Insert payload for a locally recorded transaction (pending deposits
/// and external-transfer intents)
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub sender_id: UserId,
    pub receiver_id: Option<UserId>,
    pub amount: Decimal,
    pub fee: Decimal,
    pub kind: TxKind,
    pub status: TxStatus,
    pub memo: String,
    pub description: String,
    pub metadata: serde_json::Value,
}

/// Arguments of the authoritative `transfer_funds` stored procedure
#[derive(Debug, Clone)]
pub struct TransferFundsCall {
    pub sender_handle: String,
    pub receiver_handle: String,
    pub amount: Decimal,
    pub memo: String,
    pub description: String,
}

/// Verdict of the `transfer_funds` stored procedure, verbatim.
///
/// `success == false` carries the server's rejection reason; nothing was
/// applied in that case.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferOutcome {
    pub success: bool,
    pub transaction_id: Option<TxId>,
    pub amount: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub net_amount: Option<Decimal>,
    pub reason: Option<String>,
}

/// Verdict of the `confirm_pending_deposit` stored procedure
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementCheck {
    /// Settlement found and credited in this call
    Settled { new_balance: Decimal },
    /// A previous call already credited this deposit; same state, no
    /// second credit
    AlreadySettled { new_balance: Decimal },
    /// No matching settlement on the ledger yet; retry later
    NotYetSettled,
    /// Memo/amount/destination mismatch; fatal for this deposit
    Mismatch { reason: String },
}
