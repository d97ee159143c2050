//! Token transfer executor.
//!
//! # Data Flow
//! ```text
//! TransferRequest + ConnectionState
//!     → executor.rs (validate: connected, amount, sender, recipient)
//!     → token.rs (transfer calldata)
//!     → provider lease: eth_gasPrice, eth_sendTransaction (once)
//!     → confirm.rs (receipt polling, reads only)
//!     → TransferResult
//! ```
//!
//! # Design Decisions
//! - A submission is never retried; retrying is the caller's decision
//! - Submissions are serialized so nonces are assigned in call order
//! - Once broadcast, a transfer is `Submitted` even without a receipt in time

pub mod confirm;
pub mod executor;
pub mod recipient;
pub mod request;
pub mod token;

use alloy::primitives::Address;
use thiserror::Error;

use crate::blockchain::units::AmountError;

pub use executor::{TransferExecutor, TransferSettings};
pub use recipient::RecipientDirectory;
pub use request::{TransferReceipt, TransferRequest, TransferResult};

/// Reasons a transfer is refused or fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("wallet is not connected")]
    NotConnected,

    #[error("invalid amount: {0}")]
    InvalidAmount(AmountError),

    #[error("please connect the wallet to the account {expected:#x} (connected: {actual:#x})")]
    WrongAccount { expected: Address, actual: Address },

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("transaction failed: {0}")]
    TransferFailed(String),
}

impl TransferError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::WrongAccount { .. } => "wrong_account",
            Self::InvalidRecipient(_) => "invalid_recipient",
            Self::TransferFailed(_) => "transfer_failed",
        }
    }
}
