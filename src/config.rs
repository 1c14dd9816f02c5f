use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::fees;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    /// PostgreSQL connection URL for the wallet backing store
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub gateway: FiatGatewayConfig,
    #[serde(default)]
    pub fees: FeeConfig,
}

/// External distributed-ledger network endpoints and platform accounts
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of a public ledger node
    pub rpc_url: String,
    /// Broadcast relay endpoint (signs and submits value transfers)
    pub broadcast_url: String,
    /// Platform account receiving direct-ledger deposits
    pub treasury_account: String,
    /// Signing secret the relay uses for treasury-originated transfers.
    /// Syntactic WIF format only; never validated cryptographically here.
    pub treasury_signing_key: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://rpc.vidora.network".to_string(),
            broadcast_url: "https://relay.vidora.network".to_string(),
            treasury_account: "vidora.treasury".to_string(),
            treasury_signing_key: String::new(),
        }
    }
}

/// Fiat payment gateway (checkout redirect) configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FiatGatewayConfig {
    pub base_url: String,
    pub secret_key: String,
}

impl Default for FiatGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.gateway.example".to_string(),
            secret_key: String::new(),
        }
    }
}

/// Platform fee rates; defaults match the published schedule
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FeeConfig {
    pub peer_transfer: Decimal,
    pub reward: Decimal,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            peer_transfer: fees::PEER_TRANSFER_RATE,
            reward: fees::REWARD_RATE,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
