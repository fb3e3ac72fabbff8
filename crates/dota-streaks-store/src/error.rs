//! Error types for dota-streaks storage.

use dota_streaks_core::{CoreError, ValueKind};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem error while writing or reading bulk files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The table has not been created.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// The table already exists.
    #[error("table already exists: {0}")]
    TableExists(String),

    /// The column is not part of the table layout.
    #[error("unknown column {column} in table {table}")]
    UnknownColumn {
        /// The table being addressed.
        table: String,
        /// The logical column name.
        column: String,
    },

    /// A value does not match the column's declared type, or a layout is invalid.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A value of the wrong kind was written to a column.
    #[error("cannot write {found} to {column}, declared {declared}")]
    WrongValueKind {
        /// The logical column name.
        column: String,
        /// The declared kind.
        declared: ValueKind,
        /// The kind of the rejected value.
        found: ValueKind,
    },

    /// The table layout changed between setup and load.
    #[error("layout of {table} changed: expected version {expected}, found {found}")]
    LayoutChanged {
        /// The table.
        table: String,
        /// Version the data was generated against.
        expected: u32,
        /// Version currently stored.
        found: u32,
    },

    /// A physical key could not be decoded.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid core value (column name, identifier).
    #[error(transparent)]
    Core(#[from] CoreError),
}
