//! Pending-deposit lifecycle
//!
//! Two funding paths share one shape: record a pending self-referential
//! deposit row, hand the user elsewhere (gateway checkout or a manual
//! ledger transfer), then poll the store's authoritative settlement
//! check until it confirms. Nothing here ever credits a balance; that
//! is the confirm procedure's job, exactly once.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::cache::WalletCache;
use super::error::WalletError;
use super::memo;
use super::session::Session;
use crate::chain::keys;
use crate::core_types::TxId;
use crate::fiat::PaymentGateway;
use crate::store::{BackingStore, NewTransaction, SettlementCheck, TxKind, TxStatus};

/// Manual-transfer instructions for a direct-ledger deposit.
///
/// The memo is the only correlation mechanism: the external network has
/// no notion of platform identity, so the settlement is matched by
/// memo + amount + destination.
#[derive(Debug, Clone, Serialize)]
pub struct DepositInstructions {
    pub target_account: String,
    pub memo: String,
    pub amount: Decimal,
}

/// Handle for a deposit in progress
#[derive(Debug, Clone, Serialize)]
pub struct DepositHandle {
    pub transaction_id: TxId,
    pub memo: String,
    /// Hosted checkout to redirect to (fiat path)
    pub redirect_url: Option<String>,
    /// Gateway correlation id (fiat path)
    pub reference: Option<String>,
    /// Manual transfer instructions (direct-ledger path)
    pub instructions: Option<DepositInstructions>,
}

/// Settled state reported by a successful confirmation poll
#[derive(Debug, Clone, Serialize)]
pub struct DepositConfirmation {
    pub new_balance: Decimal,
    /// True if an earlier poll already credited this deposit
    pub already_settled: bool,
}

pub struct DepositReconciler {
    store: Arc<dyn BackingStore>,
    gateway: Arc<dyn PaymentGateway>,
    cache: Arc<WalletCache>,
    treasury_account: String,
}

impl DepositReconciler {
    pub fn new(
        store: Arc<dyn BackingStore>,
        gateway: Arc<dyn PaymentGateway>,
        cache: Arc<WalletCache>,
        treasury_account: String,
    ) -> Self {
        Self {
            store,
            gateway,
            cache,
            treasury_account,
        }
    }

    /// Start a fiat deposit: pending row first, then a gateway
    /// checkout correlated by the row id. No balance credit.
    pub async fn initiate_fiat_deposit(
        &self,
        session: &Session,
        amount: Decimal,
        contact: &str,
    ) -> Result<DepositHandle, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount);
        }
        if contact.is_empty() {
            return Err(WalletError::MissingField("contact"));
        }

        let deposit_memo = memo::fiat_deposit_memo();
        let intent = self
            .store
            .insert_transaction(NewTransaction {
                sender_id: session.user_id,
                receiver_id: Some(session.user_id),
                amount,
                fee: Decimal::ZERO,
                kind: TxKind::Deposit,
                status: TxStatus::Pending,
                memo: deposit_memo.clone(),
                description: format!("Gateway deposit of {}", amount),
                metadata: json!({
                    "payment_method": "fiat_gateway",
                    "contact": contact,
                }),
            })
            .await?;

        let checkout = self
            .gateway
            .create_checkout(amount, contact, &intent.id.to_string())
            .await?;

        info!(
            transaction_id = %intent.id,
            reference = %checkout.reference,
            "Fiat deposit initiated"
        );

        Ok(DepositHandle {
            transaction_id: intent.id,
            memo: deposit_memo,
            redirect_url: Some(checkout.redirect_url),
            reference: Some(checkout.reference),
            instructions: None,
        })
    }

    /// Start a direct-ledger deposit: generate the correlation memo,
    /// record the pending intent, return transfer instructions.
    pub async fn initiate_ledger_deposit(
        &self,
        session: &Session,
        amount: Decimal,
        signing_key: &str,
    ) -> Result<DepositHandle, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount);
        }
        if !keys::is_wif_format(signing_key) {
            return Err(WalletError::InvalidKeyFormat);
        }

        let deposit_memo = memo::ledger_deposit_memo();
        let intent = self
            .store
            .insert_transaction(NewTransaction {
                sender_id: session.user_id,
                receiver_id: Some(session.user_id),
                amount,
                fee: Decimal::ZERO,
                kind: TxKind::Deposit,
                status: TxStatus::Pending,
                memo: deposit_memo.clone(),
                description: format!("Ledger deposit of {}", amount),
                metadata: json!({
                    "payment_method": "ledger_wallet",
                    "memo": deposit_memo,
                }),
            })
            .await?;

        info!(transaction_id = %intent.id, "Ledger deposit intent recorded");

        Ok(DepositHandle {
            transaction_id: intent.id,
            memo: deposit_memo.clone(),
            redirect_url: None,
            reference: None,
            instructions: Some(DepositInstructions {
                target_account: self.treasury_account.clone(),
                memo: deposit_memo,
                amount,
            }),
        })
    }

    /// Poll the authoritative settlement check for a pending deposit.
    ///
    /// Safe to call repeatedly: a poll after success returns the
    /// settled state again without a second credit. A mismatch is fatal
    /// for this handle and never touches the balance; "not yet settled"
    /// and transport failures are retryable.
    pub async fn confirm_deposit(
        &self,
        session: &Session,
        transaction_id: TxId,
    ) -> Result<DepositConfirmation, WalletError> {
        let check = self.store.confirm_pending_deposit(transaction_id).await?;

        match check {
            SettlementCheck::Settled { new_balance } => {
                info!(
                    transaction_id = %transaction_id,
                    new_balance = %new_balance,
                    "Deposit settled"
                );
                if let Err(e) = self.cache.refresh(session.user_id).await {
                    warn!("Post-settlement cache refresh failed: {}", e);
                }
                Ok(DepositConfirmation {
                    new_balance,
                    already_settled: false,
                })
            }
            SettlementCheck::AlreadySettled { new_balance } => Ok(DepositConfirmation {
                new_balance,
                already_settled: true,
            }),
            SettlementCheck::NotYetSettled => Err(WalletError::SettlementPending),
            SettlementCheck::Mismatch { reason } => {
                warn!(
                    transaction_id = %transaction_id,
                    "Deposit failed settlement checks: {}",
                    reason
                );
                Err(WalletError::SettlementMismatch(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiat::MockPaymentGateway;
    use crate::store::mock::MockBackingStore;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    struct Fixture {
        store: Arc<MockBackingStore>,
        gateway: Arc<MockPaymentGateway>,
        reconciler: DepositReconciler,
        alice: Session,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MockBackingStore::new());
        let alice_id = store.seed_user("alice", "vdr1alice", dec("100"), Decimal::ZERO);
        let gateway = Arc::new(MockPaymentGateway::new());
        let cache = Arc::new(WalletCache::new(store.clone()));

        let reconciler = DepositReconciler::new(
            store.clone(),
            gateway.clone(),
            cache,
            "vidora.treasury".to_string(),
        );

        Fixture {
            store,
            gateway,
            reconciler,
            alice: Session::new(alice_id, "alice"),
        }
    }

    fn wif() -> String {
        format!("5J{}", "x".repeat(49))
    }

    #[tokio::test]
    async fn test_fiat_deposit_creates_pending_row_and_checkout() {
        let fx = fixture();
        let handle = fx
            .reconciler
            .initiate_fiat_deposit(&fx.alice, dec("25"), "alice@example.com")
            .await
            .unwrap();

        assert!(handle.memo.starts_with("FIAT_DEPOSIT_"));
        assert!(handle.redirect_url.is_some());
        assert_eq!(
            fx.gateway.checkout_references(),
            vec![handle.transaction_id.to_string()]
        );

        // No credit happened.
        assert_eq!(fx.store.account(fx.alice.user_id).unwrap().available, dec("100"));

        let pending = fx.store.pending_deposits(fx.alice.user_id).await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_deposit_lifecycle_is_idempotent() {
        let fx = fixture();
        let handle = fx
            .reconciler
            .initiate_ledger_deposit(&fx.alice, dec("50"), &wif())
            .await
            .unwrap();

        let instructions = handle.instructions.as_ref().unwrap();
        assert_eq!(instructions.target_account, "vidora.treasury");
        assert_eq!(instructions.amount, dec("50"));

        // Poll before any settlement exists: retryable, not fatal.
        let err = fx
            .reconciler
            .confirm_deposit(&fx.alice, handle.transaction_id)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::SettlementPending));
        assert_eq!(fx.store.account(fx.alice.user_id).unwrap().available, dec("100"));

        // Settlement appears on the ledger.
        fx.store.post_settlement(&handle.memo, dec("50"));

        let confirmed = fx
            .reconciler
            .confirm_deposit(&fx.alice, handle.transaction_id)
            .await
            .unwrap();
        assert!(!confirmed.already_settled);
        assert_eq!(confirmed.new_balance, dec("150"));

        // A third poll returns the settled state without re-crediting.
        let again = fx
            .reconciler
            .confirm_deposit(&fx.alice, handle.transaction_id)
            .await
            .unwrap();
        assert!(again.already_settled);
        assert_eq!(again.new_balance, dec("150"));
        assert_eq!(fx.store.account(fx.alice.user_id).unwrap().available, dec("150"));
    }

    #[tokio::test]
    async fn test_amount_mismatch_is_fatal_and_leaves_balance() {
        let fx = fixture();
        let handle = fx
            .reconciler
            .initiate_ledger_deposit(&fx.alice, dec("50"), &wif())
            .await
            .unwrap();

        // Settlement arrives with the wrong amount.
        fx.store.post_settlement(&handle.memo, dec("5"));

        let err = fx
            .reconciler
            .confirm_deposit(&fx.alice, handle.transaction_id)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::SettlementMismatch(_)));
        assert_eq!(fx.store.account(fx.alice.user_id).unwrap().available, dec("100"));

        // The handle stays fatal on later polls.
        let err = fx
            .reconciler
            .confirm_deposit(&fx.alice, handle.transaction_id)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::SettlementMismatch(_)));
    }

    #[tokio::test]
    async fn test_ledger_deposit_rejects_bad_key() {
        let fx = fixture();
        let err = fx
            .reconciler
            .initiate_ledger_deposit(&fx.alice, dec("50"), "not-a-key")
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidKeyFormat));
    }

    #[tokio::test]
    async fn test_fiat_deposit_validations() {
        let fx = fixture();
        assert!(matches!(
            fx.reconciler
                .initiate_fiat_deposit(&fx.alice, dec("0"), "a@b.c")
                .await
                .unwrap_err(),
            WalletError::InvalidAmount
        ));
        assert!(matches!(
            fx.reconciler
                .initiate_fiat_deposit(&fx.alice, dec("5"), "")
                .await
                .unwrap_err(),
            WalletError::MissingField("contact")
        ));
    }

    #[tokio::test]
    async fn test_unknown_transaction_id() {
        let fx = fixture();
        let err = fx
            .reconciler
            .confirm_deposit(&fx.alice, uuid::Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::NotFound(_)));
    }
}
