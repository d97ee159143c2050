//! Recipient resolution: raw addresses or directory usernames.

use alloy::primitives::Address;
use std::collections::HashMap;

use crate::transfer::TransferError;

/// Username -> address lookup, case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct RecipientDirectory {
    entries: HashMap<String, Address>,
}

impl RecipientDirectory {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Address)>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, address)| (normalize(name.as_ref()), address))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a recipient identifier.
    ///
    /// Anything starting with `0x` must be a valid address; everything else
    /// is looked up as a username.
    pub fn resolve(&self, identifier: &str) -> Result<Address, TransferError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(TransferError::InvalidRecipient("recipient is empty".to_string()));
        }
        if identifier.starts_with("0x") || identifier.starts_with("0X") {
            return identifier
                .parse::<Address>()
                .map_err(|_| TransferError::InvalidRecipient(format!("'{}' is not a valid address", identifier)));
        }
        self.entries
            .get(&normalize(identifier))
            .copied()
            .ok_or_else(|| TransferError::InvalidRecipient(format!("unknown recipient '{}'", identifier)))
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
