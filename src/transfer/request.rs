//! Transfer requests and their results.

use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transfer::TransferError;

/// One transfer a caller wants performed.
///
/// Not `Clone`: a request is consumed by exactly one submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Correlates logs and the result with this request.
    pub id: Uuid,
    /// Raw `0x` address or directory username.
    pub recipient: String,
    /// Positive decimal amount in display units.
    pub amount_tokens: String,
    /// Display-only annotation, never sent on-chain.
    pub message: Option<String>,
}

impl TransferRequest {
    pub fn new(recipient: impl Into<String>, amount_tokens: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: recipient.into(),
            amount_tokens: amount_tokens.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.message = if message.trim().is_empty() { None } else { Some(message) };
        self
    }
}

/// Details of a broadcast transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub transaction_id: TxHash,
    pub from: Address,
    pub to: Address,
    /// Canonical decimal form of the amount (`"01.50"` becomes `"1.5"`).
    pub amount_tokens: String,
    pub amount_base_units: U256,
    /// False when no receipt arrived before the confirmation timeout. The
    /// transaction may still be mined; it must not be sent again.
    pub confirmed: bool,
    pub block_number: Option<u64>,
    pub message: Option<String>,
}

/// Outcome of one submission. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferResult {
    Submitted { request_id: Uuid, receipt: TransferReceipt },
    Failed { request_id: Uuid, error: TransferError },
}

impl TransferResult {
    pub fn request_id(&self) -> Uuid {
        match self {
            Self::Submitted { request_id, .. } | Self::Failed { request_id, .. } => *request_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Submitted { .. })
    }

    /// Submitted and seen in a successful receipt.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Submitted { receipt, .. } if receipt.confirmed)
    }

    pub fn transaction_id(&self) -> Option<TxHash> {
        match self {
            Self::Submitted { receipt, .. } => Some(receipt.transaction_id),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&TransferError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Submitted { .. } => None,
        }
    }

    /// Human-readable reason for a failed transfer.
    pub fn failure_reason(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }

    /// Banner text for a successful transfer.
    pub fn success_message(&self, symbol: &str) -> Option<String> {
        let Self::Submitted { receipt, .. } = self else {
            return None;
        };
        let note = receipt
            .message
            .as_deref()
            .map(|m| format!(" with message: {}", m))
            .unwrap_or_default();
        if !receipt.confirmed {
            return Some(format!(
                "Sent {} {}{} from {:#x} to {:#x}, not yet confirmed. Transaction Hash: {}",
                receipt.amount_tokens, symbol, note, receipt.from, receipt.to, receipt.transaction_id
            ));
        }
        Some(format!(
            "Successfully sent {} {}{} from {:#x} to {:#x}! Transaction Hash: {}",
            receipt.amount_tokens, symbol, note, receipt.from, receipt.to, receipt.transaction_id
        ))
    }
}
