//! Connection state snapshots handed to the presentation layer.

use alloy::primitives::Address;
use serde::{Serialize, Serializer};

use crate::blockchain::ChainId;
use crate::connector::ConnectError;

/// Coarse connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

fn lowercase_address<S: Serializer>(address: &Option<Address>, s: S) -> Result<S::Ok, S::Error> {
    match address {
        Some(a) => s.serialize_some(&format!("{:#x}", a)),
        None => s.serialize_none(),
    }
}

/// Snapshot of the wallet session.
///
/// `status == Connected` implies `address` is set and `chain_id` is the
/// target network.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ConnectionState {
    #[serde(serialize_with = "lowercase_address")]
    pub address: Option<Address>,
    pub chain_id: Option<ChainId>,
    /// Native balance, 4 decimal places.
    pub balance: Option<String>,
    pub status: ConnectionStatus,
    pub error_message: Option<String>,
}

impl ConnectionState {
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Keep what is already known about the account while a sequence runs.
    pub fn connecting(previous: &ConnectionState) -> Self {
        Self {
            address: previous.address,
            chain_id: previous.chain_id,
            balance: None,
            status: ConnectionStatus::Connecting,
            error_message: None,
        }
    }

    pub fn connected(address: Address, chain_id: ChainId, balance: String) -> Self {
        Self {
            address: Some(address),
            chain_id: Some(chain_id),
            balance: Some(balance),
            status: ConnectionStatus::Connected,
            error_message: None,
        }
    }

    pub fn failed(address: Option<Address>, chain_id: Option<ChainId>, error: &ConnectError) -> Self {
        Self {
            address,
            chain_id,
            balance: None,
            status: ConnectionStatus::Error,
            error_message: Some(error.to_string()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Lowercase `0x` hex of the account, as displayed.
    pub fn address_hex(&self) -> Option<String> {
        self.address.map(|a| format!("{:#x}", a))
    }

    /// Shortened `0x1234...abcd` form for compact display.
    pub fn short_address(&self) -> Option<String> {
        self.address_hex().map(|hex| format!("{}...{}", &hex[..6], &hex[hex.len() - 4..]))
    }
}
