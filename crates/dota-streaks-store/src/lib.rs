//! Versioned wide-column storage for dota-streaks, backed by `RocksDB`.
//!
//! Each table (`matches`, `players`) is a `RocksDB` column family whose rows hold named
//! columns, and each column holds an ordered history of `(timestamp, value)` versions.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `layouts`: table layouts (schema, row-key format, version), keyed by table name
//! - one column family per table, holding cells keyed by
//!   `row_key || family_id || qualifier || 0x00 || !timestamp`
//!
//! Writes go through `Store::write` (atomic batch), the `BufferedWriter` (batched and
//! flushed at a threshold) or, for backfills, sorted bulk files produced by
//! `BulkFileWriter` and ingested with `Store::bulk_load`.
//!
//! # Example
//!
//! ```no_run
//! use dota_streaks_core::{AccountId, CellValue, Timestamp};
//! use dota_streaks_store::{schema, DataRequest, EntityIdFactory, RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/dota-streaks-db").unwrap();
//! let layout = store.ensure_table(&schema::players_layout()).unwrap();
//!
//! let ids = EntityIdFactory::from_layout(&layout);
//! let row = ids.player_row_key(AccountId::new(42)).unwrap().unwrap();
//! let column = schema::columns::player_real_match();
//! store
//!     .put("players", &row, &column, Timestamp::from_millis(1_000), CellValue::Double(3.0))
//!     .unwrap();
//!
//! let request = DataRequest::builder().add(&column).build();
//! let data = store.get_row("players", &row, &request).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bulk;
pub mod encoding;
pub mod entity_id;
pub mod error;
pub mod keys;
pub mod layout;
pub mod request;
pub mod rocks;
pub mod schema;
pub mod writer;

pub use bulk::{BulkFile, BulkFileWriter, BulkKeyValue};
pub use encoding::CellEncoder;
pub use entity_id::{EntityIdFactory, RowKey};
pub use error::{Result, StoreError};
pub use layout::{ColumnTranslator, FamilyKind, FamilyLayout, RowKeyFormat, TableLayout};
pub use request::{Cell, DataRequest, RowData, RowRange, ALL_VERSIONS};
pub use rocks::{RocksStore, StoreOptions};
pub use writer::{BufferedWriter, Mutation};

use dota_streaks_core::{CellValue, ColumnName, Timestamp};

/// Boxed iterator over scanned rows.
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<RowData>> + 'a>;

/// The storage trait defining all table operations.
///
/// This trait abstracts the storage layer so writers and jobs can be written against
/// any implementation.
pub trait Store: Send + Sync {
    // =========================================================================
    // Schema Operations
    // =========================================================================

    /// Create a table with the given layout.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::TableExists` if the table exists, or
    /// `StoreError::SchemaMismatch` if the layout is invalid.
    fn create_table(&self, layout: &TableLayout) -> Result<()>;

    /// Replace a table's layout with a newer version.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::TableNotFound` if the table doesn't exist, or
    /// `StoreError::SchemaMismatch` if the version does not increase.
    fn alter_table(&self, layout: &TableLayout) -> Result<()>;

    /// Get the current layout of a table.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::TableNotFound` if the table doesn't exist.
    fn table_layout(&self, table: &str) -> Result<TableLayout>;

    /// Create the table if it is missing and return its current layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout cannot be read or the table cannot be created.
    fn ensure_table(&self, layout: &TableLayout) -> Result<TableLayout> {
        match self.table_layout(&layout.name) {
            Ok(existing) => Ok(existing),
            Err(StoreError::TableNotFound(_)) => {
                self.create_table(layout)?;
                Ok(layout.clone())
            }
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Apply a set of mutations atomically.
    ///
    /// Writing a cell that already exists at the same timestamp overwrites it.
    ///
    /// # Errors
    ///
    /// Returns an error if a column is undeclared, a value has the wrong kind, or the
    /// database write fails.
    fn write(&self, table: &str, mutations: &[Mutation]) -> Result<()>;

    /// Write a single cell.
    ///
    /// # Errors
    ///
    /// Same as [`Store::write`].
    fn put(
        &self,
        table: &str,
        row: &RowKey,
        column: &ColumnName,
        timestamp: Timestamp,
        value: CellValue,
    ) -> Result<()> {
        self.write(
            table,
            &[Mutation {
                row_key: row.clone(),
                column: column.clone(),
                timestamp,
                value,
            }],
        )
    }

    /// Ingest a sorted bulk file, returning the number of cells loaded.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LayoutChanged` if the table layout changed since the file
    /// was generated, or a database error if ingestion fails.
    fn bulk_load(&self, file: &BulkFile) -> Result<u64>;

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Scan the rows of a range that hold at least one requested cell.
    ///
    /// # Errors
    ///
    /// Returns an error if the table doesn't exist; per-row read failures are yielded
    /// by the iterator.
    fn scan<'a>(&'a self, table: &str, request: &DataRequest, range: &RowRange)
        -> Result<RowIter<'a>>;

    /// Read the requested columns of one row.
    ///
    /// Returns `None` if the row holds none of the requested columns.
    ///
    /// # Errors
    ///
    /// Returns an error if the table doesn't exist or the read fails.
    fn get_row(&self, table: &str, row: &RowKey, request: &DataRequest) -> Result<Option<RowData>> {
        self.scan(table, request, &RowRange::single(row))?
            .next()
            .transpose()
    }
}
