//! Change-feed subscriptions
//!
//! A subscription merges the store's two push channels (balance-row
//! changes, transaction-row inserts) into one cancellable event stream.
//! The listener never touches the cache itself; the consumer decides
//! when an event becomes a refresh (see `WalletService::watch`).

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core_types::UserId;
use crate::store::feed::EventChannel;
use crate::store::{ChangeEvent, ChangeFeed};

use super::error::WalletError;

/// A live subscription for one user. Dropping it (or calling
/// [`unsubscribe`](Self::unsubscribe)) closes both underlying channels
/// so nothing leaks after the consuming view goes away.
pub struct WalletSubscription {
    rx: mpsc::Receiver<ChangeEvent>,
    forwarders: Vec<JoinHandle<()>>,
}

impl WalletSubscription {
    /// Next change event, None once the subscription is closed
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Close both push channels and stop forwarding
    pub fn unsubscribe(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Aborting a forwarder drops its channel, which closes the
        // underlying push listener.
        for task in self.forwarders.drain(..) {
            task.abort();
        }
        self.rx.close();
    }
}

impl Drop for WalletSubscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub struct ChangeFeedListener {
    feed: Arc<dyn ChangeFeed>,
}

impl ChangeFeedListener {
    pub fn new(feed: Arc<dyn ChangeFeed>) -> Self {
        Self { feed }
    }

    /// Open both push channels for `user_id` and merge them
    pub async fn subscribe(&self, user_id: UserId) -> Result<WalletSubscription, WalletError> {
        let balance_channel = self.feed.balance_changes(user_id).await?;
        let transaction_channel = self.feed.transaction_inserts(user_id).await?;

        let (tx, rx) = mpsc::channel(16);
        let forwarders = vec![
            Self::forward(balance_channel, tx.clone()),
            Self::forward(transaction_channel, tx),
        ];

        debug!(%user_id, "Change-feed subscription opened");
        Ok(WalletSubscription { rx, forwarders })
    }

    fn forward(mut channel: EventChannel, tx: mpsc::Sender<ChangeEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = channel.recv().await {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        })
    }
}
