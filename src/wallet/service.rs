//! Wallet service facade
//!
//! Wires the cache, coordinator, reconciler and feed listener over one
//! set of collaborators and exposes the interface the UI layer
//! consumes: balance snapshot, transaction window, pending deposits,
//! the operations, and the in-progress flag.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::cache::{WalletCache, WalletSnapshot};
use super::deposit::{DepositConfirmation, DepositHandle, DepositReconciler};
use super::error::WalletError;
use super::feed::ChangeFeedListener;
use super::session::Session;
use super::transfer::{
    ExternalTransferReceipt, RewardReceipt, TransferCoordinator, TransferReceipt,
};
use crate::chain::{LedgerBalance, LedgerNode};
use crate::config::{FeeConfig, LedgerConfig};
use crate::directory::{Identity, UserResolver};
use crate::fees::{FeeBreakdown, FeeSchedule};
use crate::fiat::PaymentGateway;
use crate::store::{BackingStore, ChangeFeed};

/// Handle of a running watch task; dropping it stops the driver and
/// closes the subscription
pub struct WatchHandle {
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct WalletService {
    cache: Arc<WalletCache>,
    resolver: Arc<UserResolver>,
    transfers: Arc<TransferCoordinator>,
    deposits: Arc<DepositReconciler>,
    listener: Arc<ChangeFeedListener>,
    ledger: Arc<dyn LedgerNode>,
    treasury_account: String,
    transfer_schedule: FeeSchedule,
}

impl WalletService {
    pub fn new(
        store: Arc<dyn BackingStore>,
        resolver: Arc<UserResolver>,
        ledger: Arc<dyn LedgerNode>,
        gateway: Arc<dyn PaymentGateway>,
        feed: Arc<dyn ChangeFeed>,
        ledger_cfg: LedgerConfig,
        fee_cfg: FeeConfig,
    ) -> Self {
        let cache = Arc::new(WalletCache::new(store.clone()));
        let transfers = Arc::new(TransferCoordinator::new(
            store.clone(),
            resolver.clone(),
            cache.clone(),
            ledger.clone(),
            ledger_cfg.clone(),
            FeeSchedule {
                rate: fee_cfg.reward,
            },
        ));
        let deposits = Arc::new(DepositReconciler::new(
            store,
            gateway,
            cache.clone(),
            ledger_cfg.treasury_account.clone(),
        ));

        Self {
            cache,
            resolver,
            transfers,
            deposits,
            listener: Arc::new(ChangeFeedListener::new(feed)),
            ledger,
            treasury_account: ledger_cfg.treasury_account,
            transfer_schedule: FeeSchedule {
                rate: fee_cfg.peer_transfer,
            },
        }
    }

    // ------------------------------------------------------------------
    // Read model
    // ------------------------------------------------------------------

    /// Last-known wallet state, if any refresh has succeeded
    pub fn snapshot(&self) -> Option<WalletSnapshot> {
        self.cache.snapshot()
    }

    /// Is a transfer currently in flight?
    pub fn is_sending(&self) -> bool {
        self.transfers.is_sending()
    }

    /// What a transfer of `amount` would cost, for display next to the
    /// send form. The authoritative split is computed server-side.
    pub fn preview_transfer_fee(&self, amount: Decimal) -> FeeBreakdown {
        self.transfer_schedule.calculate(amount)
    }

    /// Refresh the cached wallet state (coalesced)
    pub async fn refresh(&self, session: &Session) -> Result<(), WalletError> {
        self.cache.refresh(session.user_id).await
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    pub async fn transfer_internal(
        &self,
        session: &Session,
        receiver_identifier: &str,
        amount: Decimal,
        memo: Option<String>,
        description: Option<String>,
    ) -> Result<TransferReceipt, WalletError> {
        self.transfers
            .transfer_internal(session, receiver_identifier, amount, memo, description)
            .await
    }

    pub async fn transfer_external(
        &self,
        session: &Session,
        destination: &str,
        amount: Decimal,
        signing_key: &str,
        memo: Option<String>,
    ) -> Result<ExternalTransferReceipt, WalletError> {
        self.transfers
            .transfer_external(session, destination, amount, signing_key, memo)
            .await
    }

    pub async fn reward_creator(
        &self,
        session: &Session,
        creator_account: &str,
        amount: Decimal,
        context: &str,
    ) -> Result<RewardReceipt, WalletError> {
        self.transfers
            .reward_creator(session, creator_account, amount, context)
            .await
    }

    pub async fn initiate_fiat_deposit(
        &self,
        session: &Session,
        amount: Decimal,
        contact: &str,
    ) -> Result<DepositHandle, WalletError> {
        self.deposits
            .initiate_fiat_deposit(session, amount, contact)
            .await
    }

    pub async fn initiate_ledger_deposit(
        &self,
        session: &Session,
        amount: Decimal,
        signing_key: &str,
    ) -> Result<DepositHandle, WalletError> {
        self.deposits
            .initiate_ledger_deposit(session, amount, signing_key)
            .await
    }

    pub async fn confirm_deposit(
        &self,
        session: &Session,
        transaction_id: crate::core_types::TxId,
    ) -> Result<DepositConfirmation, WalletError> {
        self.deposits.confirm_deposit(session, transaction_id).await
    }

    // ------------------------------------------------------------------
    // Directory
    // ------------------------------------------------------------------

    /// Resolve an identifier for display (full exact/fuzzy chain)
    pub async fn resolve(&self, identifier: &str) -> Result<Option<Identity>, WalletError> {
        Ok(self.resolver.resolve(identifier).await?)
    }

    /// Prefix search for the send-to picker, excluding the caller
    pub async fn search_users(
        &self,
        session: &Session,
        query: &str,
    ) -> Result<Vec<Identity>, WalletError> {
        Ok(self
            .resolver
            .search(query, Some(session.handle.as_str()))
            .await?)
    }

    // ------------------------------------------------------------------
    // Treasury / feed
    // ------------------------------------------------------------------

    /// On-ledger balances of the platform treasury
    pub async fn treasury_balance(&self) -> Result<Option<LedgerBalance>, WalletError> {
        Ok(self.ledger.account_balance(&self.treasury_account).await?)
    }

    /// Subscribe to change events and drive coalesced cache refreshes
    /// until the handle is dropped
    pub async fn watch(&self, session: &Session) -> Result<WatchHandle, WalletError> {
        let mut subscription = self.listener.subscribe(session.user_id).await?;
        let cache = self.cache.clone();
        let user_id = session.user_id;

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                debug!(?event.source, "Change event, refreshing wallet state");
                if let Err(e) = cache.refresh(user_id).await {
                    warn!("Feed-driven refresh failed: {}", e);
                }
            }
        });

        Ok(WatchHandle { task })
    }

    /// Raw change-event subscription for consumers that drive their own
    /// refresh policy
    pub async fn subscribe(
        &self,
        session: &Session,
    ) -> Result<super::feed::WalletSubscription, WalletError> {
        self.listener.subscribe(session.user_id).await
    }
}
