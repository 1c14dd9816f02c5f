//! Payment gateway seam for fiat deposits
//!
//! The gateway turns (amount, contact) into a hosted checkout: a
//! redirect target plus a correlation reference. Settlement is
//! confirmed entirely out of band.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::fmt::Debug;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::config::FiatGatewayConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway unreachable: {0}")]
    Network(String),
    #[error("Checkout rejected: {0}")]
    Rejected(String),
}

/// A hosted checkout created by the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct Checkout {
    pub reference: String,
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + Debug {
    /// Create a checkout for `amount`, correlated by `reference`
    /// (our pending transaction id)
    async fn create_checkout(
        &self,
        amount: Decimal,
        contact: &str,
        reference: &str,
    ) -> Result<Checkout, GatewayError>;
}

/// HTTP client for the hosted payment gateway
#[derive(Debug)]
pub struct HttpPaymentGateway {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &FiatGatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            secret_key: config.secret_key.clone(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_checkout(
        &self,
        amount: Decimal,
        contact: &str,
        reference: &str,
    ) -> Result<Checkout, GatewayError> {
        let response = self
            .http
            .post(format!("{}/checkout", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&json!({
                "amount": amount,
                "contact": contact,
                "reference": reference,
            }))
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(reason));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))
    }
}

/// In-memory gateway for tests and local development
#[derive(Debug, Default)]
pub struct MockPaymentGateway {
    checkouts: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// References of every checkout created
    pub fn checkout_references(&self) -> Vec<String> {
        self.checkouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout(
        &self,
        _amount: Decimal,
        _contact: &str,
        reference: &str,
    ) -> Result<Checkout, GatewayError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("gateway unreachable".to_string()));
        }
        self.checkouts.lock().unwrap().push(reference.to_string());
        Ok(Checkout {
            reference: reference.to_string(),
            redirect_url: format!("https://pay.gateway.example/c/{}", reference),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_checkout_carries_reference() {
        let gateway = MockPaymentGateway::new();
        let checkout = gateway
            .create_checkout("25".parse().unwrap(), "alice@example.com", "txn-1")
            .await
            .unwrap();
        assert_eq!(checkout.reference, "txn-1");
        assert!(checkout.redirect_url.ends_with("/txn-1"));
        assert_eq!(gateway.checkout_references(), vec!["txn-1".to_string()]);
    }
}
