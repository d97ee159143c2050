//! Chain access for the local wallet provider.
//!
//! # Data Flow
//! ```text
//! Environment variable (private key)
//!     → wallet.rs (key loading)
//!     → client.rs (RPC connection with timeouts and failover)
//!     → transaction.rs (fill, sign, broadcast)
//! ```
//!
//! `units.rs` holds the exact decimal <-> base-unit conversions shared by the
//! connector (balance display) and the transfer executor (amount parsing).
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod transaction;
pub mod types;
pub mod units;
pub mod wallet;

pub use client::BlockchainClient;
pub use types::{BlockchainError, BlockchainResult, ChainId, ConfirmationStatus};
pub use wallet::Wallet;
