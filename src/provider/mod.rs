//! Wallet provider abstraction.
//!
//! A wallet provider is the EIP-1193 object a browser extension injects:
//! a `request(method, params)` entry point plus `accountsChanged` and
//! `chainChanged` notifications. [`WalletProvider`] is that contract;
//! [`local::LocalWallet`] implements it natively.
//!
//! Listener registration is exposed as [`Subscription`] handles that
//! unregister themselves when dropped.

pub mod local;

use alloy::primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::blockchain::{BlockchainError, ChainId, Wallet};
use crate::config::WalletConfig;

pub use local::LocalWallet;

/// EIP-1193 / JSON-RPC error codes the workflow reacts to.
pub mod codes {
    /// The user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// The requested account or method is not authorized.
    pub const UNAUTHORIZED: i64 = 4100;
    /// The provider does not support the method.
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    /// `wallet_switchEthereumChain` target is unknown to the wallet.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    /// A request of the same kind is already waiting for the user.
    pub const REQUEST_PENDING: i64 = -32002;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL: i64 = -32603;
}

/// Error returned by a provider request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(codes::USER_REJECTED, "User rejected the request.")
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == codes::USER_REJECTED
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == codes::UNRECOGNIZED_CHAIN
    }
}

impl From<BlockchainError> for ProviderError {
    fn from(e: BlockchainError) -> Self {
        Self::new(codes::INTERNAL, e.to_string())
    }
}

/// Notification names a provider emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEventKind {
    AccountsChanged,
    ChainChanged,
}

impl ProviderEventKind {
    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccountsChanged => "accountsChanged",
            Self::ChainChanged => "chainChanged",
        }
    }
}

/// A provider notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The authorized account list changed; empty means access was revoked.
    AccountsChanged(Vec<Address>),
    /// The wallet switched to another chain.
    ChainChanged(ChainId),
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            Self::AccountsChanged(_) => ProviderEventKind::AccountsChanged,
            Self::ChainChanged(_) => ProviderEventKind::ChainChanged,
        }
    }
}

/// Callback registered with [`WalletProvider::on`].
pub type Listener = Arc<dyn Fn(&ProviderEvent) + Send + Sync>;

/// Handle identifying one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// The injected wallet contract.
///
/// Implementations must invoke listeners in the order events occur.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Perform a JSON-RPC style request. `params` is a JSON array.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Register `listener` for `event`.
    fn on(&self, event: ProviderEventKind, listener: Listener) -> ListenerId;

    /// Unregister a listener. Unknown ids are ignored.
    fn remove_listener(&self, event: ProviderEventKind, id: ListenerId);
}

/// A registered listener, unregistered on drop.
pub struct Subscription {
    provider: Arc<dyn WalletProvider>,
    event: ProviderEventKind,
    id: ListenerId,
}

impl Subscription {
    /// Register `listener` and hold the registration until the handle drops.
    pub fn acquire(provider: Arc<dyn WalletProvider>, event: ProviderEventKind, listener: Listener) -> Self {
        let id = provider.on(event, listener);
        tracing::debug!(event = event.as_str(), listener = id.0, "Provider listener registered");
        Self { provider, event, id }
    }

    pub fn event(&self) -> ProviderEventKind {
        self.event
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.provider.remove_listener(self.event, self.id);
        tracing::debug!(event = self.event.as_str(), listener = self.id.0, "Provider listener released");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}

/// Look for a wallet in the execution environment.
///
/// The local wallet exists only when its key variable is set. A key that is
/// set but unusable is logged and treated as absent.
pub fn detect_provider(config: &WalletConfig) -> Option<Arc<dyn WalletProvider>> {
    let wallet = match Wallet::from_env(&config.wallet.private_key_env) {
        Ok(Some(wallet)) => wallet,
        Ok(None) => {
            tracing::info!(var = %config.wallet.private_key_env, "No wallet key in environment");
            return None;
        }
        Err(e) => {
            tracing::error!(error = %e, "Wallet key present but unusable");
            return None;
        }
    };

    let networks = if config.wallet.networks.is_empty() {
        vec![config.network.clone()]
    } else {
        config.wallet.networks.clone()
    };

    match LocalWallet::new(wallet, config.rpc.clone(), networks, config.wallet.auto_approve) {
        Ok(provider) => Some(Arc::new(provider)),
        Err(e) => {
            tracing::error!(error = %e, "Local wallet could not start");
            None
        }
    }
}
