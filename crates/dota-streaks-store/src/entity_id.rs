//! Row keys and the entity id factory.
//!
//! Row keys are `sha256(component)[..hash_prefix_len] || component`. The hash prefix
//! spreads consecutive ids across the key space (and across units); embedding the
//! component verbatim keeps keys collision-free.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use dota_streaks_core::{AccountId, MatchId};

use crate::error::{Result, StoreError};
use crate::layout::{RowKeyFormat, TableLayout};

/// A physical row key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey(Vec<u8>);

impl RowKey {
    /// Wrap raw row-key bytes.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for RowKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowKey({self})")
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Derives row keys for one table.
///
/// Constructed once from the table layout at unit setup and passed by reference into
/// per-row logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityIdFactory {
    format: RowKeyFormat,
}

impl EntityIdFactory {
    /// Create a factory for a row-key format.
    #[must_use]
    pub const fn new(format: RowKeyFormat) -> Self {
        Self { format }
    }

    /// Create the factory matching a table layout.
    #[must_use]
    pub const fn from_layout(layout: &TableLayout) -> Self {
        Self::new(layout.row_key)
    }

    /// Derive the row key for a raw component.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidKey` if the component length does not match the format.
    pub fn entity_id(&self, component: &[u8]) -> Result<RowKey> {
        if component.len() != self.format.component_len {
            return Err(StoreError::InvalidKey(format!(
                "component of {} bytes, layout expects {}",
                component.len(),
                self.format.component_len
            )));
        }
        let digest = Sha256::digest(component);
        let mut key = Vec::with_capacity(self.format.row_key_len());
        key.extend_from_slice(&digest[..self.format.hash_prefix_len]);
        key.extend_from_slice(component);
        Ok(RowKey(key))
    }

    /// Row key of a player, or `None` for the anonymous account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidKey` if the table is not keyed by 4-byte account ids.
    pub fn player_row_key(&self, account: AccountId) -> Result<Option<RowKey>> {
        if !account.is_non_anonymous() {
            return Ok(None);
        }
        self.entity_id(&account.to_be_bytes()).map(Some)
    }

    /// Row key of a match.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidKey` if the table is not keyed by 8-byte match ids.
    pub fn match_row_key(&self, match_id: MatchId) -> Result<RowKey> {
        self.entity_id(&match_id.to_be_bytes())
    }

}
