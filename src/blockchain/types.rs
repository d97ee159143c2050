//! Chain-specific types and error definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::blockchain::units::parse_u64_quantity;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    /// Format as the `0x`-prefixed quantity wallets exchange on the wire.
    pub fn to_hex(self) -> String {
        format!("{:#x}", self.0)
    }

    /// Parse a `0x`-prefixed hex quantity (case-insensitive) or a plain decimal string.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse::<u64>().ok(),
        };
        parsed.map(Self)
    }

    /// Parse a chain id as reported by a wallet: either a hex string or a JSON number.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => n.as_u64().map(Self),
            _ => None,
        }
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Invalid private key format or derivation error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Transaction could not be assembled or signed.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// Outcome of watching a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// No receipt yet.
    Pending,
    /// Transaction is mined and succeeded.
    Confirmed { block_number: Option<u64> },
    /// Transaction was mined but reverted.
    Reverted,
}

impl ConfirmationStatus {
    /// Interpret an `eth_getTransactionReceipt` response.
    ///
    /// `null` means pending. A receipt without a `status` field predates
    /// byzantium and is treated as success.
    pub fn from_receipt(receipt: &Value) -> Self {
        if receipt.is_null() {
            return Self::Pending;
        }
        let block_number = receipt.get("blockNumber").and_then(parse_u64_quantity);
        match receipt.get("status").and_then(parse_u64_quantity) {
            Some(0) => Self::Reverted,
            _ => Self::Confirmed { block_number },
        }
    }
}
