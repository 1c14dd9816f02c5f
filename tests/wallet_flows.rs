//! End-to-end wallet flows over the in-memory collaborators
//!
//! Exercises the full service wiring the way the UI layer would:
//! resolve, transfer, deposit, confirm, and feed-driven refresh.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use vidora_wallet::chain::MockLedgerNode;
use vidora_wallet::config::{FeeConfig, LedgerConfig};
use vidora_wallet::directory::mock::MockDirectory;
use vidora_wallet::directory::models::Identity;
use vidora_wallet::directory::UserResolver;
use vidora_wallet::fiat::MockPaymentGateway;
use vidora_wallet::store::feed::MockChangeFeed;
use vidora_wallet::store::mock::MockBackingStore;
use vidora_wallet::{BackingStore, Session, UserId, WalletError, WalletService};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn wif() -> String {
    format!("5J{}", "x".repeat(49))
}

struct World {
    service: WalletService,
    store: Arc<MockBackingStore>,
    ledger: Arc<MockLedgerNode>,
    feed: Arc<MockChangeFeed>,
    alice: Session,
    bob_id: UserId,
}

fn world() -> World {
    let store = Arc::new(MockBackingStore::new());
    let alice_id = store.seed_user("alice", "vdr1alice", dec("100"), dec("5"));
    let bob_id = store.seed_user("bob", "vdr1bob", dec("20"), Decimal::ZERO);

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
        display_name: "Bob the Builder".to_string(),
        avatar_url: None,
    });

    let ledger = Arc::new(MockLedgerNode::new());
    let feed = Arc::new(MockChangeFeed::new());
    let service = WalletService::new(
        store.clone(),
        Arc::new(UserResolver::new(directory)),
        ledger.clone(),
        Arc::new(MockPaymentGateway::new()),
        feed.clone(),
        LedgerConfig::default(),
        FeeConfig::default(),
    );

    World {
        service,
        store,
        ledger,
        feed,
        alice: Session::new(alice_id, "alice"),
        bob_id,
    }
}

#[tokio::test]
async fn transfer_moves_amount_and_net_and_refreshes_cache() {
    let w = world();
    w.service.refresh(&w.alice).await.unwrap();

    let receipt = w
        .service
        .transfer_internal(&w.alice, "bob", dec("40"), None, Some("rent".to_string()))
        .await
        .unwrap();

    assert_eq!(receipt.amount, dec("40"));
    assert_eq!(receipt.fee + receipt.net_amount, receipt.amount);

    // Sender down by exactly amount; receiver up by exactly net.
    assert_eq!(w.store.account(w.alice.user_id).unwrap().available, dec("60"));
    assert_eq!(
        w.store.account(w.bob_id).unwrap().available,
        dec("20") + receipt.net_amount
    );

    // The cache was refreshed and the window describes the transfer.
    let snapshot = w.service.snapshot().unwrap();
    assert_eq!(snapshot.account.available, dec("60"));
    assert_eq!(snapshot.transactions[0].description, "Transfer to @bob");
}

#[tokio::test]
async fn stale_cache_fast_fail_never_reaches_the_store() {
    let w = world();
    w.service.refresh(&w.alice).await.unwrap();

    // Cached available is 100.000; ask for 100.001.
    let err = w
        .service
        .transfer_internal(&w.alice, "bob", dec("100.001"), None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, WalletError::InsufficientFunds));
    assert_eq!(w.store.transfer_call_count(), 0);
}

#[tokio::test]
async fn server_rejection_is_surfaced_verbatim() {
    let w = world();
    // Cold cache: the advisory check is skipped and the store's
    // authoritative verdict comes back instead.
    let err = w
        .service
        .transfer_internal(&w.alice, "bob", dec("5000"), None, None)
        .await
        .unwrap_err();

    match err {
        WalletError::Rejected(reason) => assert_eq!(reason, "insufficient funds"),
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn ledger_deposit_poll_then_settle_then_replay() {
    let w = world();
    w.service.refresh(&w.alice).await.unwrap();
    let old_balance = w.service.snapshot().unwrap().account.available;

    let handle = w
        .service
        .initiate_ledger_deposit(&w.alice, dec("50"), &wif())
        .await
        .unwrap();

    let instructions = handle.instructions.clone().unwrap();
    assert_eq!(instructions.target_account, "vidora.treasury");
    assert!(instructions.memo.starts_with("CHAIN_DEPOSIT_"));

    // Pending deposit shows up in the read model.
    w.service.refresh(&w.alice).await.unwrap();
    assert_eq!(w.service.snapshot().unwrap().pending_deposits.len(), 1);

    // Poll before the settlement exists: retryable.
    let err = w
        .service
        .confirm_deposit(&w.alice, handle.transaction_id)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::SettlementPending));

    // Settlement appears; the poll credits exactly once.
    w.store.post_settlement(&handle.memo, dec("50"));
    let confirmed = w
        .service
        .confirm_deposit(&w.alice, handle.transaction_id)
        .await
        .unwrap();
    assert_eq!(confirmed.new_balance, old_balance + dec("50"));

    // Replay: same settled state, no second credit.
    let again = w
        .service
        .confirm_deposit(&w.alice, handle.transaction_id)
        .await
        .unwrap();
    assert!(again.already_settled);
    assert_eq!(again.new_balance, old_balance + dec("50"));
}

#[tokio::test]
async fn external_transfer_leaves_durable_intent_when_network_is_down() {
    let w = world();
    w.service.refresh(&w.alice).await.unwrap();
    w.ledger.set_fail_broadcasts(true);

    let err = w
        .service
        .transfer_external(&w.alice, "coldwallet", dec("10"), &wif(), None)
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    // No balance moved, but the intent row is durable.
    assert_eq!(w.store.account(w.alice.user_id).unwrap().available, dec("100"));
    let rows = w.store.recent_transactions(w.alice.user_id, 20).await.unwrap();
    assert!(rows.iter().any(|r| r.tx.memo.starts_with("BLOCKCHAIN_TRANSFER_")));

    // Nothing was broadcast, so nothing can have broadcast twice.
    assert!(w.ledger.broadcasts().is_empty());
}

#[tokio::test]
async fn fee_preview_matches_the_published_schedule() {
    let w = world();
    let split = w.service.preview_transfer_fee(dec("100"));
    assert_eq!(split.fee, dec("2.500"));
    assert_eq!(split.net_amount, dec("97.500"));
}

#[tokio::test]
async fn search_and_resolve_behave_like_the_directory_contract() {
    let w = world();

    // Too short: empty, no directory round trip.
    assert!(w.service.search_users(&w.alice, "b").await.unwrap().is_empty());

    // Search finds bob by display-name fragment, excluding alice.
    let found = w.service.search_users(&w.alice, "builder").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].handle, "bob");

    // Full resolve falls back to fuzzy for display flows.
    let bob = w.service.resolve("Builder").await.unwrap().unwrap();
    assert_eq!(bob.account_id, w.bob_id);
}

#[tokio::test]
async fn feed_events_coalesce_into_at_most_one_inflight_query() {
    let w = world();
    w.store.set_fetch_delay_ms(25);

    let watch = w.service.watch(&w.alice).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // A burst of change events while the first refresh is still
    // in flight.
    for _ in 0..5 {
        w.feed.emit_balance_change(w.alice.user_id);
        w.feed.emit_transaction_insert(w.alice.user_id);
    }

    // Let the driver drain.
    tokio::time::sleep(Duration::from_millis(300)).await;
    watch.stop();

    assert!(w.service.snapshot().is_some());
    assert_eq!(
        w.store.max_concurrent_fetches(),
        1,
        "burst of events must never stack concurrent store queries"
    );
}
