//! Job error types.

use std::fmt;

use dota_streaks_core::ColumnName;
use dota_streaks_store::{RowKey, StoreError};

/// Job errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Storage layer failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An input row could not be interpreted. The row is skipped.
    #[error("malformed row {row}: {reason}")]
    MalformedRow {
        /// Hex row key.
        row: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Invalid configuration or missing prerequisites.
    #[error("setup error: {0}")]
    Setup(String),

    /// Filesystem failure outside the store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A unit could not be run to completion.
    #[error("unit failed: {0}")]
    Unit(String),
}

impl JobError {
    /// A malformed-row error for `row`.
    #[must_use]
    pub fn malformed(row: &RowKey, reason: impl fmt::Display) -> Self {
        Self::MalformedRow {
            row: row.to_string(),
            reason: reason.to_string(),
        }
    }

    /// A malformed-row error for a missing required column.
    #[must_use]
    pub fn missing(row: &RowKey, column: &ColumnName) -> Self {
        Self::malformed(row, format_args!("missing column {column}"))
    }

    /// Whether the error only affects the current row; everything else fails the unit.
    #[must_use]
    pub const fn is_row_level(&self) -> bool {
        matches!(self, Self::MalformedRow { .. })
    }
}

/// Result type for job operations.
pub type Result<T> = std::result::Result<T, JobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_level_classification() {
        let row = RowKey::from_bytes(vec![0xab, 0x01]);
        let err = JobError::missing(&row, &"data:player_data".parse().unwrap());
        assert!(err.is_row_level());
        assert_eq!(
            err.to_string(),
            "malformed row ab01: missing column data:player_data"
        );

        assert!(!JobError::Setup("x".into()).is_row_level());
        assert!(!JobError::from(StoreError::TableNotFound("players".into())).is_row_level());
    }
}
