pub mod cache;
pub mod deposit;
pub mod error;
pub mod feed;
pub mod memo;
pub mod service;
pub mod session;
pub mod transfer;

pub use cache::{WalletCache, WalletSnapshot};
pub use deposit::{DepositConfirmation, DepositHandle, DepositInstructions, DepositReconciler};
pub use error::WalletError;
pub use feed::{ChangeFeedListener, WalletSubscription};
pub use service::{WalletService, WatchHandle};
pub use session::Session;
pub use transfer::{ExternalTransferReceipt, RewardReceipt, TransferCoordinator, TransferReceipt};
