//! Identifier types for dota-streaks.
//!
//! This module provides strongly-typed identifiers for player accounts and matches.
//!
//! # Macro-based ID Types
//!
//! The `numeric_id_type!` macro reduces boilerplate for integer identifier types,
//! ensuring consistent implementation of serialization, parsing, and display traits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The account id reported for players who hide their profile.
///
/// Anonymous participants share this single sentinel value, so they can never be
/// addressed as a player row.
pub const ANONYMOUS_ACCOUNT_ID: u32 = u32::MAX;

/// Macro to define an integer identifier type with standard trait implementations.
///
/// This macro generates a newtype wrapper around an unsigned integer with implementations for:
/// - `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `Serialize`, `Deserialize` (as the bare number)
/// - `FromStr`, `Display`, `Debug`
/// - `From<inner>`
macro_rules! numeric_id_type {
    ($name:ident, $inner:ty, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Create an identifier from its raw value.
            #[must_use]
            pub const fn new(raw: $inner) -> Self {
                Self(raw)
            }

            /// Return the raw value.
            #[must_use]
            pub const fn get(self) -> $inner {
                self.0
            }

            /// Return the big-endian byte representation used as a row-key component.
            #[must_use]
            pub const fn to_be_bytes(self) -> [u8; std::mem::size_of::<$inner>()] {
                self.0.to_be_bytes()
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<$inner>()
                    .map(Self)
                    .map_err(|_| IdError::InvalidNumber(s.to_string()))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(raw: $inner) -> Self {
                Self(raw)
            }
        }
    };
}

numeric_id_type!(
    AccountId,
    u32,
    "A player account identifier (32-bit Steam account id).\n\nThe value `4294967295` is reserved for anonymous players."
);
numeric_id_type!(MatchId, u64, "A match identifier as assigned by the game coordinator.");

impl AccountId {
    /// The shared id of every anonymous player.
    pub const ANONYMOUS: Self = Self(ANONYMOUS_ACCOUNT_ID);

    /// Whether this account can be addressed as a player row.
    #[must_use]
    pub const fn is_non_anonymous(self) -> bool {
        self.0 != ANONYMOUS_ACCOUNT_ID
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid unsigned integer for this identifier.
    #[error("invalid numeric identifier: {0}")]
    InvalidNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_roundtrip() {
        let id = AccountId::new(86_745_912);
        let parsed = AccountId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn account_id_serializes_as_number() {
        let id = AccountId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let parsed: AccountId = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn anonymous_sentinel() {
        assert!(!AccountId::ANONYMOUS.is_non_anonymous());
        assert!(!AccountId::new(4_294_967_295).is_non_anonymous());
        assert!(AccountId::new(0).is_non_anonymous());
        assert!(AccountId::new(123).is_non_anonymous());
    }

    #[test]
    fn match_id_bytes_are_big_endian() {
        let id = MatchId::new(0x0102_0304_0506_0708);
        assert_eq!(id.to_be_bytes(), [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn invalid_ids_are_rejected() {
        assert!(matches!(
            AccountId::from_str("-1"),
            Err(IdError::InvalidNumber(_))
        ));
        assert!(MatchId::from_str("abc").is_err());
        assert!(AccountId::from_str("4294967296").is_err());
    }
}
