//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, ReadOptions, WriteBatch,
};

use dota_streaks_core::CellValue;

use crate::bulk::BulkFile;
use crate::encoding::{deserialize, serialize, CellEncoder};
use crate::entity_id::RowKey;
use crate::error::{Result, StoreError};
use crate::keys;
use crate::layout::{ColumnTranslator, TableLayout};
use crate::request::{Cell, DataRequest, RowData, RowRange};
use crate::schema::cf;
use crate::writer::Mutation;
use crate::{RowIter, Store};

/// Default read-ahead for table scans.
pub const DEFAULT_SCAN_READAHEAD_BYTES: usize = 2 * 1024 * 1024;

/// Tuning options for a `RocksStore`. None of them change what is read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Read-ahead size used by scans.
    pub scan_readahead_bytes: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            scan_readahead_bytes: DEFAULT_SCAN_READAHEAD_BYTES,
        }
    }
}

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    options: StoreOptions,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    /// Open or create a database with explicit tuning options.
    ///
    /// Every existing table column family is reopened.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open_with<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        // A fresh directory has no column families to list yet.
        let mut names = DBWithThreadMode::<MultiThreaded>::list_cf(&opts, path.as_ref())
            .unwrap_or_default();
        for required in [rocksdb::DEFAULT_COLUMN_FAMILY_NAME, cf::LAYOUTS] {
            if !names.iter().any(|n| n == required) {
                names.push(required.to_string());
            }
        }

        let cf_descriptors: Vec<_> = names
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            options,
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    fn put_layout(&self, layout: &TableLayout) -> Result<()> {
        let cf = self.cf(cf::LAYOUTS)?;
        let value = serialize(layout)?;
        self.db
            .put_cf(&cf, keys::layout_key(&layout.name), value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn scanner(
        &self,
        table: &str,
        request: &DataRequest,
        range: &RowRange,
    ) -> Result<RowScanner<'_>> {
        let layout = self.table_layout(table)?;
        let cf = self.cf(table)?;

        let mut read_opts = ReadOptions::default();
        read_opts.set_readahead_size(self.options.scan_readahead_bytes);
        if let Some(end) = &range.end {
            read_opts.set_iterate_upper_bound(end.clone());
        }
        let mode = match &range.start {
            Some(start) => IteratorMode::From(start, Direction::Forward),
            None => IteratorMode::Start,
        };
        let entries = self.db.iterator_cf_opt(&cf, read_opts, mode);

        Ok(RowScanner {
            entries: Box::new(entries),
            pending: None,
            row_len: layout.row_key_len(),
            translator: ColumnTranslator::new(&layout),
            request: request.clone(),
            range: range.clone(),
            finished: false,
        })
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Schema Operations
    // =========================================================================

    fn create_table(&self, layout: &TableLayout) -> Result<()> {
        layout.validate()?;
        if layout.name == cf::LAYOUTS || layout.name == rocksdb::DEFAULT_COLUMN_FAMILY_NAME {
            return Err(StoreError::SchemaMismatch(format!(
                "reserved table name: {}",
                layout.name
            )));
        }
        match self.table_layout(&layout.name) {
            Ok(_) => return Err(StoreError::TableExists(layout.name.clone())),
            Err(StoreError::TableNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        if self.db.cf_handle(&layout.name).is_none() {
            self.db
                .create_cf(&layout.name, &Options::default())
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }
        self.put_layout(layout)?;

        tracing::info!(table = %layout.name, version = layout.version, "Created table");
        Ok(())
    }

    fn alter_table(&self, layout: &TableLayout) -> Result<()> {
        layout.validate()?;
        let current = self.table_layout(&layout.name)?;
        if layout.version <= current.version {
            return Err(StoreError::SchemaMismatch(format!(
                "{}: new layout version {} must exceed {}",
                layout.name, layout.version, current.version
            )));
        }
        self.put_layout(layout)?;

        tracing::info!(
            table = %layout.name,
            from = current.version,
            to = layout.version,
            "Altered table layout"
        );
        Ok(())
    }

    fn table_layout(&self, table: &str) -> Result<TableLayout> {
        let cf = self.cf(cf::LAYOUTS)?;
        self.db
            .get_cf(&cf, keys::layout_key(table))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| deserialize(&data))
            .transpose()?
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    fn write(&self, table: &str, mutations: &[Mutation]) -> Result<()> {
        if mutations.is_empty() {
            return Ok(());
        }

        let layout = self.table_layout(table)?;
        let translator = ColumnTranslator::new(&layout);
        let cf = self.cf(table)?;

        let mut batch = WriteBatch::default();
        for mutation in mutations {
            if mutation.row_key.as_bytes().len() != layout.row_key_len() {
                return Err(StoreError::InvalidKey(format!(
                    "row key {} does not fit table {}",
                    mutation.row_key, table
                )));
            }
            let physical = translator.to_physical(&mutation.column)?;
            let value = CellEncoder::for_column(&layout, &mutation.column)?.encode(&mutation.value)?;
            let key = keys::cell_key(
                mutation.row_key.as_bytes(),
                physical.family_id,
                &physical.qualifier,
                mutation.timestamp,
            );
            batch.put_cf(&cf, key, value);
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn bulk_load(&self, file: &BulkFile) -> Result<u64> {
        file.check_layout(&self.table_layout(&file.table)?)?;

        let cf = self.cf(&file.table)?;
        self.db
            .ingest_external_file_cf(&cf, vec![&file.sst_path])
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!(
            table = %file.table,
            path = %file.sst_path.display(),
            cells = file.entries,
            "Bulk loaded file"
        );
        Ok(file.entries)
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    fn scan<'a>(
        &'a self,
        table: &str,
        request: &DataRequest,
        range: &RowRange,
    ) -> Result<RowIter<'a>> {
        Ok(Box::new(self.scanner(table, request, range)?))
    }
}

type RawEntry = (Box<[u8]>, Box<[u8]>);

/// Groups consecutive cells of a table into `RowData` snapshots.
struct RowScanner<'a> {
    entries: Box<dyn Iterator<Item = std::result::Result<RawEntry, rocksdb::Error>> + 'a>,
    pending: Option<RawEntry>,
    row_len: usize,
    translator: ColumnTranslator,
    request: DataRequest,
    range: RowRange,
    finished: bool,
}

impl RowScanner<'_> {
    fn next_entry(&mut self) -> Result<Option<RawEntry>> {
        if let Some(entry) = self.pending.take() {
            return Ok(Some(entry));
        }
        self.entries
            .next()
            .transpose()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn next_row(&mut self) -> Result<Option<RowData>> {
        loop {
            let Some((key, value)) = self.next_entry()? else {
                return Ok(None);
            };
            let row = key
                .get(..self.row_len)
                .ok_or_else(|| StoreError::InvalidKey(format!("short cell key: {} bytes", key.len())))?
                .to_vec();
            if self.range.is_past_end(&row) {
                return Ok(None);
            }

            let mut data = RowData::new(RowKey::from_bytes(row));
            self.absorb(&mut data, &key, &value)?;
            loop {
                match self.next_entry()? {
                    Some((k, v)) if k.starts_with(data.row_key().as_bytes()) => {
                        self.absorb(&mut data, &k, &v)?;
                    }
                    Some(other) => {
                        self.pending = Some(other);
                        break;
                    }
                    None => break,
                }
            }

            // Rows without any requested cell are not returned.
            if !data.is_empty() {
                return Ok(Some(data));
            }
        }
    }

    fn absorb(&self, data: &mut RowData, key: &[u8], value: &[u8]) -> Result<()> {
        let cell_key = keys::decode_cell_key(key, self.row_len)?;
        if !self
            .translator
            .layout()
            .families
            .iter()
            .any(|f| f.id == cell_key.family_id && self.request.wants_family(&f.name))
        {
            return Ok(());
        }
        let column = self
            .translator
            .to_logical(cell_key.family_id, cell_key.qualifier)?;
        let Some(limit) = self.request.max_versions(&column) else {
            return Ok(());
        };
        if data.version_count(&column) >= limit {
            return Ok(());
        }
        let value: CellValue = deserialize(value)?;
        data.push_version(
            column,
            Cell {
                timestamp: cell_key.timestamp,
                value,
            },
        );
        Ok(())
    }
}

impl Iterator for RowScanner<'_> {
    type Item = Result<RowData>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
