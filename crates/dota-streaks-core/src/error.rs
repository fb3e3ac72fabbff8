//! Error types for dota-streaks core values.

use crate::cell::ValueKind;
use crate::ids::IdError;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while building or interpreting core values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// A family or qualifier name is empty or contains forbidden characters.
    #[error("invalid column name: {0:?}")]
    InvalidColumnName(String),

    /// A cell holds a different type than the reader expects.
    #[error("type mismatch in {column}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The column that was read.
        column: String,
        /// The type the reader expected.
        expected: ValueKind,
        /// The type actually stored.
        found: ValueKind,
    },

    /// An enum code is outside the known range.
    #[error("unknown {field} code: {code}")]
    UnknownCode {
        /// The field being decoded (e.g. `game_mode`).
        field: &'static str,
        /// The raw code.
        code: i64,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
