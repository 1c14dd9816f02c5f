//! HTTP client for the ledger node and broadcast relay
//!
//! Account lookups go to a public node's JSON-RPC endpoint. Broadcasts
//! go to the platform's signing relay, which holds the actual
//! cryptography; this crate only ships the transfer description and the
//! (syntactically checked) signing secret over an internal channel.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::node::{BroadcastTransfer, ChainError, LedgerBalance, LedgerNode};
use crate::config::LedgerConfig;
use crate::core_types::parse_ledger_amount;

#[derive(Debug)]
pub struct RpcLedgerNode {
    http: reqwest::Client,
    rpc_url: String,
    broadcast_url: String,
}

#[derive(Debug, Deserialize)]
struct RpcAccount {
    balance: String,
    reward_balance: String,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    id: String,
}

impl RpcLedgerNode {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            rpc_url: config.rpc_url.clone(),
            broadcast_url: config.broadcast_url.clone(),
        }
    }
}

#[async_trait]
impl LedgerNode for RpcLedgerNode {
    async fn broadcast_transfer(
        &self,
        transfer: BroadcastTransfer,
        signing_key: &str,
    ) -> Result<String, ChainError> {
        if !super::keys::is_account_name(&transfer.to) {
            return Err(ChainError::InvalidAccount(transfer.to));
        }

        let body = json!({
            "from": transfer.from,
            "to": transfer.to,
            "amount": crate::core_types::format_amount(transfer.amount),
            "memo": transfer.memo,
            "wif": signing_key,
        });

        let response = self
            .http
            .post(format!("{}/broadcast/transfer", self.broadcast_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(ChainError::Rejected(reason));
        }

        let parsed: BroadcastResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Network(e.to_string()))?;
        Ok(parsed.id)
    }

    async fn account_balance(&self, account: &str) -> Result<Option<LedgerBalance>, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": "condenser_api.get_accounts",
            "params": [[account]],
            "id": 1,
        });

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Network(e.to_string()))?;

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ChainError::Network(e.to_string()))?;

        let Some(first) = payload
            .get("result")
            .and_then(|r| r.as_array())
            .and_then(|a| a.first())
        else {
            return Ok(None);
        };

        let account: RpcAccount = serde_json::from_value(first.clone())
            .map_err(|e| ChainError::Network(format!("malformed account row: {}", e)))?;

        let balance = parse_ledger_amount(&account.balance)
            .ok_or_else(|| ChainError::Network(format!("bad balance: {}", account.balance)))?;
        let reward_balance = parse_ledger_amount(&account.reward_balance).ok_or_else(|| {
            ChainError::Network(format!("bad reward balance: {}", account.reward_balance))
        })?;

        Ok(Some(LedgerBalance {
            balance,
            reward_balance,
        }))
    }
}
