pub mod backing;
pub mod feed;
pub mod mock;
pub mod models;
pub mod pg;

pub use backing::{BackingStore, StoreError};
pub use feed::{ChangeEvent, ChangeFeed, ChangeSource};
pub use models::{
    Account, NewTransaction, SettlementCheck, Transaction, TransactionWithParties,
    TransferFundsCall, TransferOutcome, TxKind, TxStatus,
};
