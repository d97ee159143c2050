//! UZH wallet connector and token transfer library

pub mod blockchain;
pub mod config;
pub mod connector;
pub mod observability;
pub mod provider;
pub mod transfer;

pub use config::WalletConfig;
pub use connector::{ConnectError, ConnectionState, ConnectionStatus, Session, WalletConnector};
pub use provider::{detect_provider, ProviderError, ProviderEvent, WalletProvider};
pub use transfer::{TransferError, TransferExecutor, TransferRequest, TransferResult, TransferSettings};
