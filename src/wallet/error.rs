//! Wallet error taxonomy
//!
//! Every operation returns `Result<T, WalletError>`; collaborator
//! transport failures are converted at this boundary so callers match
//! on one type instead of handling each collaborator's errors.

use thiserror::Error;

use crate::chain::ChainError;
use crate::directory::DirectoryError;
use crate::fiat::GatewayError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Invalid amount: must be positive")]
    InvalidAmount,

    #[error("Cannot transfer to yourself")]
    SelfTransfer,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Insufficient balance")]
    InsufficientFunds,

    #[error("Invalid signing key format")]
    InvalidKeyFormat,

    #[error("Wallet data unavailable: {0}")]
    DataUnavailable(String),

    /// Non-fatal: the settlement has not appeared on the ledger yet
    #[error("Deposit not yet settled")]
    SettlementPending,

    /// Fatal for this deposit handle; the balance was not touched
    #[error("Settlement mismatch: {0}")]
    SettlementMismatch(String),

    /// The backing store's rejection, verbatim
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("A transfer is already in progress")]
    TransferInFlight,
}

impl WalletError {
    /// Worth retrying later with the same arguments?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::DataUnavailable(_) | WalletError::SettlementPending
        )
    }
}

impl From<StoreError> for WalletError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::TransactionNotFound(id) => {
                WalletError::NotFound(format!("transaction {}", id))
            }
            other => WalletError::DataUnavailable(other.to_string()),
        }
    }
}

impl From<DirectoryError> for WalletError {
    fn from(e: DirectoryError) -> Self {
        WalletError::DataUnavailable(e.to_string())
    }
}

impl From<ChainError> for WalletError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Rejected(reason) => WalletError::Rejected(reason),
            ChainError::InvalidAccount(name) => {
                WalletError::NotFound(format!("ledger account {}", name))
            }
            ChainError::Network(reason) => WalletError::DataUnavailable(reason),
        }
    }
}

impl From<GatewayError> for WalletError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Rejected(reason) => WalletError::Rejected(reason),
            GatewayError::Network(reason) => WalletError::DataUnavailable(reason),
        }
    }
}
