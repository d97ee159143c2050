//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from a TOML file and
//! every section has defaults, so an empty file yields the UZH deployment.

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::blockchain::units::DEFAULT_DECIMALS;
use crate::blockchain::wallet::PRIVATE_KEY_ENV_VAR;
use crate::connector::NetworkDescriptor;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletConfig {
    /// Network the wallet must be on before anything else happens.
    pub network: NetworkDescriptor,

    /// RPC behaviour of the local wallet provider.
    pub rpc: RpcConfig,

    /// Token contract and transfer policy.
    pub token: TokenConfig,

    /// Local wallet provider settings.
    pub wallet: LocalWalletConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// RPC settings shared by every network client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Extra endpoints tried after the network's own `rpc_urls`.
    pub failover_urls: Vec<String>,

    /// RPC request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            failover_urls: Vec::new(),
            timeout_secs: 10,
        }
    }
}

/// Token contract and transfer policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Address of the token contract exposing `transfer(address,uint256)`.
    pub contract_address: Address,

    /// Fractional digits of the token.
    pub decimals: u8,

    /// The only account allowed to initiate transfers.
    pub authorized_sender: Address,

    /// How long to wait for a receipt before giving up.
    pub confirmation_timeout_secs: u64,

    /// Base receipt polling interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Upper bound for the receipt polling interval in milliseconds.
    pub max_poll_interval_ms: u64,

    /// Username -> address directory for recipients.
    pub recipients: BTreeMap<String, Address>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        let mut recipients = BTreeMap::new();
        recipients.insert(
            "john doe".to_string(),
            address!("0x75ce93e8a7a73cf688b4c0b12b11bbbc96417995"),
        );
        recipients.insert(
            "store".to_string(),
            address!("0x18c8a44533877dfd8a22fb060e4f52e4cfd708f4"),
        );

        Self {
            contract_address: address!("0x3d540965809ccb355b1f0d1cbcabb55762997cfd"),
            decimals: DEFAULT_DECIMALS,
            authorized_sender: address!("0x284edb1ab6010422503c4190beb08dbaa6bb7ea5"),
            confirmation_timeout_secs: 300,
            poll_interval_ms: 1000,
            max_poll_interval_ms: 8000,
            recipients,
        }
    }
}

/// Settings of the local (non-browser) wallet provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalWalletConfig {
    /// Environment variable holding the private key. Unset means no wallet.
    pub private_key_env: String,

    /// Grant account access without asking. When false, account requests
    /// are refused until the wallet is unlocked programmatically.
    pub auto_approve: bool,

    /// Networks the wallet knows at startup; the first one is active.
    /// Empty means the wallet starts on `network`.
    pub networks: Vec<NetworkDescriptor>,
}

impl Default for LocalWalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: PRIVATE_KEY_ENV_VAR.to_string(),
            auto_approve: true,
            networks: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
