//! Push change feed of the backing store
//!
//! The store notifies on balance-row changes and transaction-row
//! inserts. Each subscription is an independent channel delivering
//! events for one user; closing the channel (or dropping it) ends the
//! underlying listener task.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::backing::StoreError;
use crate::core_types::UserId;

/// Which table produced a change event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    Balance,
    Transaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub user_id: UserId,
    pub source: ChangeSource,
}

/// One push channel. Dropping it tears down the listener task.
pub struct EventChannel {
    rx: mpsc::Receiver<ChangeEvent>,
    task: JoinHandle<()>,
}

impl EventChannel {
    pub fn new(rx: mpsc::Receiver<ChangeEvent>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    pub fn close(&mut self) {
        self.task.abort();
        self.rx.close();
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Push channel for balance-row changes of `user_id`
    async fn balance_changes(&self, user_id: UserId) -> Result<EventChannel, StoreError>;

    /// Push channel for transaction-row inserts where `user_id` is
    /// sender or receiver
    async fn transaction_inserts(&self, user_id: UserId) -> Result<EventChannel, StoreError>;
}

// ============================================================================
// PostgreSQL LISTEN/NOTIFY implementation
// ============================================================================

/// Notification channels raised by triggers in the wallet schema
pub mod channels {
    pub const BALANCE_CHANGED: &str = "wallet_balance_changed";
    pub const TRANSACTION_INSERTED: &str = "wallet_transaction_inserted";
}

#[derive(Debug, Deserialize)]
struct NotifyPayload {
    user_id: UserId,
    #[serde(default)]
    receiver_id: Option<UserId>,
}

pub struct PgChangeFeed {
    pool: sqlx::PgPool,
}

impl PgChangeFeed {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    async fn listen(
        &self,
        channel: &'static str,
        user_id: UserId,
        source: ChangeSource,
    ) -> Result<EventChannel, StoreError> {
        let mut listener = sqlx::postgres::PgListener::connect_with(&self.pool).await?;
        listener.listen(channel).await?;

        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(n) => n,
                    Err(e) => {
                        warn!("[feed] {} listener dropped: {}", channel, e);
                        break;
                    }
                };

                let payload: NotifyPayload =
                    match serde_json::from_str(notification.payload()) {
                        Ok(p) => p,
                        Err(e) => {
                            debug!("[feed] ignoring malformed payload: {}", e);
                            continue;
                        }
                    };

                let matches =
                    payload.user_id == user_id || payload.receiver_id == Some(user_id);
                if !matches {
                    continue;
                }

                if tx.send(ChangeEvent { user_id, source }).await.is_err() {
                    break; // subscriber gone
                }
            }
        });

        Ok(EventChannel::new(rx, task))
    }
}

#[async_trait]
impl ChangeFeed for PgChangeFeed {
    async fn balance_changes(&self, user_id: UserId) -> Result<EventChannel, StoreError> {
        self.listen(channels::BALANCE_CHANGED, user_id, ChangeSource::Balance)
            .await
    }

    async fn transaction_inserts(&self, user_id: UserId) -> Result<EventChannel, StoreError> {
        self.listen(
            channels::TRANSACTION_INSERTED,
            user_id,
            ChangeSource::Transaction,
        )
        .await
    }
}

// ============================================================================
// In-memory implementation
// ============================================================================

pub struct MockChangeFeed {
    balances: broadcast::Sender<ChangeEvent>,
    transactions: broadcast::Sender<ChangeEvent>,
}

impl Default for MockChangeFeed {
    fn default() -> Self {
        Self {
            balances: broadcast::channel(64).0,
            transactions: broadcast::channel(64).0,
        }
    }
}

impl MockChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit_balance_change(&self, user_id: UserId) {
        let _ = self.balances.send(ChangeEvent {
            user_id,
            source: ChangeSource::Balance,
        });
    }

    pub fn emit_transaction_insert(&self, user_id: UserId) {
        let _ = self.transactions.send(ChangeEvent {
            user_id,
            source: ChangeSource::Transaction,
        });
    }

    fn forward(
        source: &broadcast::Sender<ChangeEvent>,
        user_id: UserId,
    ) -> EventChannel {
        let mut upstream = source.subscribe();
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(async move {
            while let Ok(event) = upstream.recv().await {
                if event.user_id != user_id {
                    continue;
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        EventChannel::new(rx, task)
    }
}

#[async_trait]
impl ChangeFeed for MockChangeFeed {
    async fn balance_changes(&self, user_id: UserId) -> Result<EventChannel, StoreError> {
        Ok(Self::forward(&self.balances, user_id))
    }

    async fn transaction_inserts(&self, user_id: UserId) -> Result<EventChannel, StoreError> {
        Ok(Self::forward(&self.transactions, user_id))
    }
}
