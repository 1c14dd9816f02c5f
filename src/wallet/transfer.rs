//! Transfer orchestration
//!
//! Internal transfers delegate to the backing store's single
//! authoritative procedure; the checks here are ordered fast-fails, not
//! the real guard. External transfers persist a durable intent row
//! before anything is handed to the ledger, so a crash mid-flow leaves
//! a trace instead of silent money movement.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use super::cache::WalletCache;
use super::error::WalletError;
use super::memo;
use super::session::Session;
use crate::chain::node::BroadcastTransfer;
use crate::chain::{LedgerNode, keys};
use crate::config::LedgerConfig;
use crate::core_types::TxId;
use crate::directory::UserResolver;
use crate::fees::FeeSchedule;
use crate::store::{BackingStore, NewTransaction, TransferFundsCall, TxKind, TxStatus};

/// Result of a confirmed internal transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub transaction_id: TxId,
    pub amount: Decimal,
    pub fee: Decimal,
    pub net_amount: Decimal,
    pub receiver_id: crate::core_types::UserId,
}

/// Result of an external transfer handed to the ledger network
#[derive(Debug, Clone, Serialize)]
pub struct ExternalTransferReceipt {
    pub transaction_id: TxId,
    pub network_tx_id: String,
    pub amount: Decimal,
    pub destination: String,
    pub memo: String,
}

/// Result of a creator reward payout
#[derive(Debug, Clone, Serialize)]
pub struct RewardReceipt {
    pub transaction_id: TxId,
    pub network_tx_id: String,
    pub amount: Decimal,
    pub fee: Decimal,
}

/// Clears the in-flight flag when the operation ends, however it ends
struct SendGuard<'a>(&'a AtomicBool);

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct TransferCoordinator {
    store: Arc<dyn BackingStore>,
    resolver: Arc<UserResolver>,
    cache: Arc<WalletCache>,
    ledger: Arc<dyn LedgerNode>,
    ledger_cfg: LedgerConfig,
    reward_schedule: FeeSchedule,
    sending: AtomicBool,
}

impl TransferCoordinator {
    pub fn new(
        store: Arc<dyn BackingStore>,
        resolver: Arc<UserResolver>,
        cache: Arc<WalletCache>,
        ledger: Arc<dyn LedgerNode>,
        ledger_cfg: LedgerConfig,
        reward_schedule: FeeSchedule,
    ) -> Self {
        Self {
            store,
            resolver,
            cache,
            ledger,
            ledger_cfg,
            reward_schedule,
            sending: AtomicBool::new(false),
        }
    }

    /// Is a transfer currently in flight? Callers use this to disable
    /// re-issuance in the UI.
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::SeqCst)
    }

    fn acquire_send(&self) -> Result<SendGuard<'_>, WalletError> {
        if self
            .sending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WalletError::TransferInFlight);
        }
        Ok(SendGuard(&self.sending))
    }

    /// Fast-fail against the cached balance. Advisory only: the cache
    /// may be stale, so the authoritative check happens server-side at
    /// execution time. With a cold cache there is nothing to check.
    fn check_cached_balance(&self, amount: Decimal) -> Result<(), WalletError> {
        if let Some(available) = self.cache.available()
            && amount > available
        {
            return Err(WalletError::InsufficientFunds);
        }
        Ok(())
    }

    /// Transfer between two platform accounts.
    ///
    /// Preconditions, checked in order (first failure wins): amount
    /// positive, amount within cached balance, receiver resolves by
    /// exact match to a provisioned wallet account, receiver is not the
    /// sender. Everything is re-validated inside the store procedure.
    pub async fn transfer_internal(
        &self,
        session: &Session,
        receiver_identifier: &str,
        amount: Decimal,
        memo_text: Option<String>,
        description: Option<String>,
    ) -> Result<TransferReceipt, WalletError> {
        let _guard = self.acquire_send()?;

        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount);
        }
        self.check_cached_balance(amount)?;

        let identity = self
            .resolver
            .resolve_exact(receiver_identifier)
            .await?
            .ok_or_else(|| WalletError::NotFound(format!("user {}", receiver_identifier)))?;

        if self
            .store
            .fetch_account(identity.account_id)
            .await?
            .is_none()
        {
            return Err(WalletError::NotFound(format!(
                "wallet account of @{}",
                identity.handle
            )));
        }

        if identity.account_id == session.user_id {
            return Err(WalletError::SelfTransfer);
        }

        let memo_text = memo_text
            .filter(|m| !m.is_empty())
            .unwrap_or_else(memo::transfer_memo);
        let description = description
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("Transfer to @{}", identity.handle));

        let outcome = self
            .store
            .transfer_funds(TransferFundsCall {
                sender_handle: session.handle.clone(),
                receiver_handle: identity.handle.clone(),
                amount,
                memo: memo_text,
                description,
            })
            .await?;

        if !outcome.success {
            let reason = outcome
                .reason
                .unwrap_or_else(|| "transfer failed".to_string());
            return Err(WalletError::Rejected(reason));
        }

        let malformed =
            || WalletError::DataUnavailable("malformed transfer verdict".to_string());
        let receipt = TransferReceipt {
            transaction_id: outcome.transaction_id.ok_or_else(malformed)?,
            amount: outcome.amount.ok_or_else(malformed)?,
            fee: outcome.fee.ok_or_else(malformed)?,
            net_amount: outcome.net_amount.ok_or_else(malformed)?,
            receiver_id: identity.account_id,
        };

        info!(
            transaction_id = %receipt.transaction_id,
            amount = %receipt.amount,
            "Internal transfer confirmed: @{} -> @{}",
            session.handle,
            identity.handle
        );

        if let Err(e) = self.cache.refresh(session.user_id).await {
            warn!("Post-transfer cache refresh failed: {}", e);
        }

        Ok(receipt)
    }

    /// Transfer from the user's ledger account to an arbitrary account
    /// on the external network.
    ///
    /// The pending intent row is persisted BEFORE the broadcast handoff
    /// and carries a freshly generated single-use correlation memo, so
    /// one intent can never broadcast twice and a crash mid-flow leaves
    /// a durable trace. The broadcast itself is irreversible.
    pub async fn transfer_external(
        &self,
        session: &Session,
        destination: &str,
        amount: Decimal,
        signing_key: &str,
        memo_text: Option<String>,
    ) -> Result<ExternalTransferReceipt, WalletError> {
        let _guard = self.acquire_send()?;

        if !keys::is_wif_format(signing_key) {
            return Err(WalletError::InvalidKeyFormat);
        }
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount);
        }
        self.check_cached_balance(amount)?;

        let own_account = match self.cache.snapshot() {
            Some(snapshot) => snapshot.account,
            None => self
                .store
                .fetch_account(session.user_id)
                .await?
                .ok_or_else(|| WalletError::NotFound("wallet account".to_string()))?,
        };
        if destination == own_account.ledger_account {
            return Err(WalletError::SelfTransfer);
        }

        let correlation = memo::external_transfer_memo();
        let chain_memo = memo_text
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| correlation.clone());
        // Client-side correlation id, distinct from the on-chain memo;
        // the reconciliation sweep keys on it across retries.
        let cid = ulid::Ulid::new().to_string();

        let intent = self
            .store
            .insert_transaction(NewTransaction {
                sender_id: session.user_id,
                receiver_id: None,
                amount,
                fee: Decimal::ZERO,
                kind: TxKind::BlockchainTransfer,
                status: TxStatus::Pending,
                memo: correlation,
                description: format!("Ledger transfer to @{}", destination),
                metadata: json!({
                    "destination_account": destination,
                    "chain_memo": chain_memo,
                    "cid": cid,
                }),
            })
            .await?;

        let network_tx_id = match self
            .ledger
            .broadcast_transfer(
                BroadcastTransfer {
                    from: own_account.ledger_account,
                    to: destination.to_string(),
                    amount,
                    memo: chain_memo.clone(),
                },
                signing_key,
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                // The intent row stays pending for the out-of-band
                // reconciliation sweep.
                warn!(
                    transaction_id = %intent.id,
                    "Broadcast failed, leaving orphaned pending intent: {}",
                    e
                );
                return Err(e.into());
            }
        };

        info!(
            transaction_id = %intent.id,
            network_tx_id = %network_tx_id,
            "Ledger transfer broadcast: @{} -> @{}",
            session.handle,
            destination
        );

        if let Err(e) = self.cache.refresh(session.user_id).await {
            warn!("Post-broadcast cache refresh failed: {}", e);
        }

        Ok(ExternalTransferReceipt {
            transaction_id: intent.id,
            network_tx_id,
            amount,
            destination: destination.to_string(),
            memo: chain_memo,
        })
    }

    /// Pay out a creator reward from the platform treasury.
    ///
    /// The 10% platform fee is retained by the treasury; only the net
    /// amount leaves it.
    pub async fn reward_creator(
        &self,
        session: &Session,
        creator_account: &str,
        amount: Decimal,
        context: &str,
    ) -> Result<RewardReceipt, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount);
        }
        if creator_account.is_empty() {
            return Err(WalletError::MissingField("creator_account"));
        }

        let split = self.reward_schedule.calculate(amount);
        let reward_memo = format!("Reward for {}", context);

        let network_tx_id = self
            .ledger
            .broadcast_transfer(
                BroadcastTransfer {
                    from: self.ledger_cfg.treasury_account.clone(),
                    to: creator_account.to_string(),
                    amount: split.net_amount,
                    memo: reward_memo.clone(),
                },
                &self.ledger_cfg.treasury_signing_key,
            )
            .await?;

        let record = self
            .store
            .insert_transaction(NewTransaction {
                sender_id: session.user_id,
                receiver_id: None,
                amount: split.net_amount,
                fee: split.fee,
                kind: TxKind::Reward,
                status: TxStatus::Confirmed,
                memo: reward_memo,
                description: "Reward sent to creator".to_string(),
                metadata: json!({
                    "creator_account": creator_account,
                    "context": context,
                }),
            })
            .await?;

        info!(
            transaction_id = %record.id,
            network_tx_id = %network_tx_id,
            "Reward paid: {} net to @{}",
            split.net_amount,
            creator_account
        );

        Ok(RewardReceipt {
            transaction_id: record.id,
            network_tx_id,
            amount: split.net_amount,
            fee: split.fee,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockLedgerNode;
    use crate::directory::mock::MockDirectory;
    use crate::directory::models::Identity;
    use crate::store::TxStatus;
    use crate::store::mock::MockBackingStore;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    struct Fixture {
        store: Arc<MockBackingStore>,
        ledger: Arc<MockLedgerNode>,
        cache: Arc<WalletCache>,
        coordinator: TransferCoordinator,
        alice: Session,
        bob_id: crate::core_types::UserId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MockBackingStore::new());
        let alice_id = store.seed_user("alice", "vdr1alice", dec("100"), Decimal::ZERO);
        let bob_id = store.seed_user("bob", "vdr1bob", dec("5"), Decimal::ZERO);

        let directory = Arc::new(MockDirectory::new());
        directory.insert(Identity {
            account_id: alice_id,
            handle: "alice".to_string(),
            display_name: "Alice".to_string(),
            avatar_url: None,
        });
        directory.insert(Identity {
            account_id: bob_id,
            handle: "bob".to_string(),
            display_name: "Bob".to_string(),
            avatar_url: None,
        });

        let cache = Arc::new(WalletCache::new(store.clone()));
        cache.refresh(alice_id).await.unwrap();

        let ledger = Arc::new(MockLedgerNode::new());
        let coordinator = TransferCoordinator::new(
            store.clone(),
            Arc::new(UserResolver::new(directory)),
            cache.clone(),
            ledger.clone(),
            LedgerConfig::default(),
            FeeSchedule::reward(),
        );

        Fixture {
            store,
            ledger,
            cache,
            coordinator,
            alice: Session::new(alice_id, "alice"),
            bob_id,
        }
    }

    #[tokio::test]
    async fn test_internal_transfer_happy_path() {
        let fx = fixture().await;
        let receipt = fx
            .coordinator
            .transfer_internal(&fx.alice, "bob", dec("10"), None, None)
            .await
            .unwrap();

        assert_eq!(receipt.amount, dec("10"));
        assert_eq!(receipt.fee, dec("0.250"));
        assert_eq!(receipt.net_amount, dec("9.750"));
        assert_eq!(receipt.receiver_id, fx.bob_id);

        // Sender down by amount, receiver up by net.
        assert_eq!(fx.store.account(fx.alice.user_id).unwrap().available, dec("90"));
        assert_eq!(fx.store.account(fx.bob_id).unwrap().available, dec("14.750"));

        // Success triggered a cache refresh.
        assert_eq!(fx.cache.available(), Some(dec("90")));
    }

    #[tokio::test]
    async fn test_insufficient_cached_balance_fails_before_store_call() {
        let fx = fixture().await;
        // Cached available is 100; ask for more.
        let err = fx
            .coordinator
            .transfer_internal(&fx.alice, "bob", dec("100.001"), None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, WalletError::InsufficientFunds));
        assert_eq!(
            fx.store.transfer_call_count(),
            0,
            "fast-fail must not reach the backing store"
        );
    }

    #[tokio::test]
    async fn test_precondition_order_amount_before_resolution() {
        let fx = fixture().await;
        // Nonexistent receiver AND bad amount: amount check wins.
        let err = fx
            .coordinator
            .transfer_internal(&fx.alice, "nobody", dec("0"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount));
    }

    #[tokio::test]
    async fn test_self_transfer_rejected() {
        let fx = fixture().await;
        let err = fx
            .coordinator
            .transfer_internal(&fx.alice, "alice", dec("1"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::SelfTransfer));
    }

    #[tokio::test]
    async fn test_unresolved_receiver_rejected() {
        let fx = fixture().await;
        let err = fx
            .coordinator
            .transfer_internal(&fx.alice, "nobody", dec("1"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_external_transfer_records_intent_before_broadcast() {
        let fx = fixture().await;
        fx.ledger.set_fail_broadcasts(true);

        let key = format!("5J{}", "x".repeat(49));
        let err = fx
            .coordinator
            .transfer_external(&fx.alice, "coldwallet", dec("10"), &key, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::DataUnavailable(_)));

        // The durable intent row survives the failed broadcast.
        let pending: Vec<_> = fx
            .store
            .recent_transactions(fx.alice.user_id, 20)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.tx.kind == TxKind::BlockchainTransfer)
            .collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].tx.status, TxStatus::Pending);
        assert!(pending[0].tx.memo.starts_with("BLOCKCHAIN_TRANSFER_"));
    }

    #[tokio::test]
    async fn test_external_transfer_happy_path() {
        let fx = fixture().await;
        let key = format!("5K{}", "x".repeat(49));

        let receipt = fx
            .coordinator
            .transfer_external(&fx.alice, "coldwallet", dec("10"), &key, None)
            .await
            .unwrap();

        assert!(!receipt.network_tx_id.is_empty());
        let broadcasts = fx.ledger.broadcasts();
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(broadcasts[0].from, "vdr1alice");
        assert_eq!(broadcasts[0].to, "coldwallet");
    }

    #[tokio::test]
    async fn test_external_transfer_rejects_bad_key_format() {
        let fx = fixture().await;
        let err = fx
            .coordinator
            .transfer_external(&fx.alice, "coldwallet", dec("10"), "6Xnotakey", None)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidKeyFormat));
    }

    #[tokio::test]
    async fn test_external_transfer_rejects_own_account() {
        let fx = fixture().await;
        let key = format!("5H{}", "x".repeat(49));
        let err = fx
            .coordinator
            .transfer_external(&fx.alice, "vdr1alice", dec("10"), &key, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::SelfTransfer));
    }

    #[tokio::test]
    async fn test_reward_pays_net_from_treasury() {
        let fx = fixture().await;
        let receipt = fx
            .coordinator
            .reward_creator(&fx.alice, "creator", dec("10"), "clip-42")
            .await
            .unwrap();

        assert_eq!(receipt.amount, dec("9.000"));
        assert_eq!(receipt.fee, dec("1.000"));

        let broadcasts = fx.ledger.broadcasts();
        assert_eq!(broadcasts[0].from, "vidora.treasury");
        assert_eq!(broadcasts[0].amount, dec("9.000"));
    }

    #[tokio::test]
    async fn test_in_flight_flag_blocks_duplicate_submission() {
        let fx = fixture().await;
        let _guard = fx.coordinator.acquire_send().unwrap();
        assert!(fx.coordinator.is_sending());

        let err = fx
            .coordinator
            .transfer_internal(&fx.alice, "bob", dec("1"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::TransferInFlight));
    }
}
