//! Bulk file generation and manifests.
//!
//! A backfill unit collects cells with `BulkFileWriter`, which sorts them into a
//! `RocksDB` SST file and writes a JSON manifest next to it. A later step ingests the
//! file with `Store::bulk_load`, which refuses files generated against an older layout.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rocksdb::{Options, SstFileWriter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dota_streaks_core::{CellValue, ColumnName, Timestamp};

use crate::encoding::CellEncoder;
use crate::entity_id::RowKey;
use crate::error::{Result, StoreError};
use crate::keys;
use crate::layout::{ColumnTranslator, TableLayout};

/// Extension of manifest files.
pub const MANIFEST_EXTENSION: &str = "json";

/// Extension of SST files.
pub const SST_EXTENSION: &str = "sst";

/// One encoded cell destined for a bulk file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkKeyValue {
    /// Row key.
    pub row_key: RowKey,
    /// Physical family id.
    pub family_id: u8,
    /// Qualifier.
    pub qualifier: String,
    /// Version timestamp.
    pub timestamp: Timestamp,
    /// Encoded value.
    pub value: Vec<u8>,
}

impl BulkKeyValue {
    /// The physical cell key.
    #[must_use]
    pub fn cell_key(&self) -> Vec<u8> {
        keys::cell_key(
            self.row_key.as_bytes(),
            self.family_id,
            &self.qualifier,
            self.timestamp,
        )
    }
}

/// Describes a finished bulk file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFile {
    /// Target table.
    pub table: String,
    /// Layout version the cells were encoded against.
    pub layout_version: u32,
    /// Path of the SST file.
    pub sst_path: PathBuf,
    /// Number of cells in the file.
    pub entries: u64,
}

impl BulkFile {
    /// Path of the manifest describing this file.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.sst_path.with_extension(MANIFEST_EXTENSION)
    }

    /// Write the manifest next to the SST file.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be encoded or written.
    pub fn write_manifest(&self) -> Result<PathBuf> {
        let path = self.manifest_path();
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        fs::write(&path, json)?;
        Ok(path)
    }

    /// Read a manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read or parsed.
    pub fn read_manifest(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        serde_json::from_slice(&data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Check that the file was generated against the current layout of its table.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LayoutChanged` if the layout version differs.
    pub fn check_layout(&self, current: &TableLayout) -> Result<()> {
        if current.version != self.layout_version {
            return Err(StoreError::LayoutChanged {
                table: self.table.clone(),
                expected: self.layout_version,
                found: current.version,
            });
        }
        Ok(())
    }

    /// Delete the SST file and its manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    pub fn remove(&self) -> Result<()> {
        for path in [self.sst_path.clone(), self.manifest_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Delete every bulk file described by a manifest in `dir`, returning how many
    /// were removed. A missing directory holds no files.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a manifest cannot be read, or a file
    /// cannot be removed.
    pub fn clear_dir(dir: &Path) -> Result<usize> {
        if !dir.exists() {
            return Ok(0);
        }
        let files = Self::discover(dir)?;
        for file in &files {
            file.remove()?;
        }
        Ok(files.len())
    }

    /// Read every manifest in a directory, ordered by file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a manifest cannot be read.
    pub fn discover(dir: &Path) -> Result<Vec<Self>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == MANIFEST_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();
        paths.iter().map(|p| Self::read_manifest(p)).collect()
    }
}

/// Collects cells for one table and writes them as a sorted SST file.
pub struct BulkFileWriter {
    dir: PathBuf,
    unit: String,
    translator: ColumnTranslator,
    encoders: HashMap<ColumnName, CellEncoder>,
    entries: Vec<BulkKeyValue>,
}

impl BulkFileWriter {
    /// Create a writer emitting into `dir` for the given layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory cannot be created.
    pub fn new(dir: &Path, layout: &TableLayout, unit: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            unit: unit.to_string(),
            translator: ColumnTranslator::new(layout),
            encoders: HashMap::new(),
            entries: Vec::new(),
        })
    }

    /// Encode and queue one cell.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is undeclared, the value has the wrong kind, or
    /// the row key does not fit the layout.
    pub fn put(
        &mut self,
        row: &RowKey,
        column: &ColumnName,
        timestamp: Timestamp,
        value: &CellValue,
    ) -> Result<()> {
        let layout = self.translator.layout();
        if row.as_bytes().len() != layout.row_key_len() {
            return Err(StoreError::InvalidKey(format!(
                "row key {row} does not fit table {}",
                layout.name
            )));
        }
        let physical = self.translator.to_physical(column)?;
        if !self.encoders.contains_key(column) {
            let encoder = CellEncoder::for_column(layout, column)?;
            self.encoders.insert(column.clone(), encoder);
        }
        let value = self.encoders[column].encode(value)?;
        self.entries.push(BulkKeyValue {
            row_key: row.clone(),
            family_id: physical.family_id,
            qualifier: physical.qualifier,
            timestamp,
            value,
        });
        Ok(())
    }

    /// Number of queued cells.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.entries.len()
    }

    /// Sort the queued cells, write the SST file and its manifest.
    ///
    /// When the same cell is queued twice, the later value wins. Returns `None` if no
    /// cell was queued.
    ///
    /// # Errors
    ///
    /// Returns an error if the SST file or manifest cannot be written.
    pub fn finish(self) -> Result<Option<BulkFile>> {
        if self.entries.is_empty() {
            return Ok(None);
        }
        let layout = self.translator.layout();

        let mut cells: Vec<(Vec<u8>, Vec<u8>)> = self
            .entries
            .into_iter()
            .rev()
            .map(|kv| (kv.cell_key(), kv.value))
            .collect();
        // Stable sort over the reversed input keeps the last put first among equal keys.
        cells.sort_by(|a, b| a.0.cmp(&b.0));
        cells.dedup_by(|later, earlier| later.0 == earlier.0);

        let sst_path = self.dir.join(format!(
            "{}-{}-{}.{SST_EXTENSION}",
            layout.name,
            self.unit,
            Uuid::new_v4()
        ));
        let opts = Options::default();
        let mut writer = SstFileWriter::create(&opts);
        writer
            .open(&sst_path)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        for (key, value) in &cells {
            writer
                .put(key, value)
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }
        writer
            .finish()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let file = BulkFile {
            table: layout.name.clone(),
            layout_version: layout.version,
            sst_path,
            entries: cells.len() as u64,
        };
        file.write_manifest()?;

        tracing::debug!(
            table = %file.table,
            unit = %self.unit,
            path = %file.sst_path.display(),
            cells = file.entries,
            "Wrote bulk file"
        );
        Ok(Some(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{DataRequest, RowRange, ALL_VERSIONS};
    use crate::rocks::RocksStore;
    use crate::schema::{columns, players_layout, tables};
    use crate::{EntityIdFactory, Store};
    use dota_streaks_core::AccountId;
    use tempfile::TempDir;

    fn create_test_store(dir: &TempDir) -> RocksStore {
        let store = RocksStore::open(dir.path().join("db")).unwrap();
        store.create_table(&players_layout()).unwrap();
        store
    }

    fn row(account: u32) -> RowKey {
        EntityIdFactory::from_layout(&players_layout())
            .player_row_key(AccountId::new(account))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn empty_writer_produces_no_file() {
        let dir = TempDir::new().unwrap();
        let writer = BulkFileWriter::new(&dir.path().join("out"), &players_layout(), "u0").unwrap();
        assert!(writer.finish().unwrap().is_none());
    }

    #[test]
    fn generate_and_load() {
        let dir = TempDir::new().unwrap();
        let store = create_test_store(&dir);
        let out = dir.path().join("out");

        let mut writer = BulkFileWriter::new(&out, &players_layout(), "u0").unwrap();
        // Queued out of key order on purpose.
        for account in (1..=10).rev() {
            writer
                .put(
                    &row(account),
                    &columns::player_real_match(),
                    Timestamp::from_millis(u64::from(account)),
                    &CellValue::Double(3.0),
                )
                .unwrap();
        }
        writer
            .put(
                &row(1),
                &columns::player_real_match(),
                Timestamp::from_millis(1),
                &CellValue::Double(2.0),
            )
            .unwrap();
        let file = writer.finish().unwrap().unwrap();
        assert_eq!(file.entries, 10);

        let manifests = BulkFile::discover(&out).unwrap();
        assert_eq!(manifests, vec![file.clone()]);

        assert_eq!(store.bulk_load(&file).unwrap(), 10);
        let request = DataRequest::builder()
            .max_versions(ALL_VERSIONS)
            .add(&columns::player_real_match())
            .build();
        let rows: Vec<_> = store
            .scan(tables::PLAYERS, &request, &RowRange::all())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows.len(), 10);

        let first = store.get_row(tables::PLAYERS, &row(1), &request).unwrap().unwrap();
        assert_eq!(
            first.most_recent_value(&columns::player_real_match()),
            Some(&CellValue::Double(2.0))
        );
    }

    #[test]
    fn load_rejects_changed_layout() {
        let dir = TempDir::new().unwrap();
        let store = create_test_store(&dir);

        let mut writer =
            BulkFileWriter::new(&dir.path().join("out"), &players_layout(), "u1").unwrap();
        writer
            .put(
                &row(5),
                &columns::player_real_match(),
                Timestamp::from_millis(1),
                &CellValue::Double(1.0),
            )
            .unwrap();
        let file = writer.finish().unwrap().unwrap();

        store
            .alter_table(&players_layout().with_version(2))
            .unwrap();
        assert!(matches!(
            store.bulk_load(&file),
            Err(StoreError::LayoutChanged {
                expected: 1,
                found: 2,
                ..
            })
        ));
    }

    #[test]
    fn clear_dir_removes_files_and_manifests() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        assert_eq!(BulkFile::clear_dir(&out).unwrap(), 0);

        for unit in ["u0", "u1"] {
            let mut writer = BulkFileWriter::new(&out, &players_layout(), unit).unwrap();
            writer
                .put(
                    &row(7),
                    &columns::player_real_match(),
                    Timestamp::from_millis(1),
                    &CellValue::Double(3.0),
                )
                .unwrap();
            writer.finish().unwrap().unwrap();
        }
        fs::write(out.join("notes.txt"), "kept").unwrap();

        assert_eq!(BulkFile::clear_dir(&out).unwrap(), 2);
        assert!(BulkFile::discover(&out).unwrap().is_empty());
        let left: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(left, vec![std::ffi::OsString::from("notes.txt")]);
    }

    #[test]
    fn check_layout_compares_versions() {
        let dir = TempDir::new().unwrap();
        let mut writer =
            BulkFileWriter::new(&dir.path().join("out"), &players_layout(), "u3").unwrap();
        writer
            .put(
                &row(9),
                &columns::player_real_match(),
                Timestamp::from_millis(1),
                &CellValue::Double(1.0),
            )
            .unwrap();
        let file = writer.finish().unwrap().unwrap();

        file.check_layout(&players_layout()).unwrap();
        assert!(matches!(
            file.check_layout(&players_layout().with_version(3)),
            Err(StoreError::LayoutChanged { found: 3, .. })
        ));
    }

    #[test]
    fn put_validates_cells() {
        let dir = TempDir::new().unwrap();
        let mut writer = BulkFileWriter::new(dir.path(), &players_layout(), "u2").unwrap();
        assert!(writer
            .put(
                &row(1),
                &columns::player_real_match(),
                Timestamp::from_millis(1),
                &CellValue::Int(1),
            )
            .is_err());
        assert!(writer
            .put(
                &RowKey::from_bytes(vec![1, 2]),
                &columns::player_real_match(),
                Timestamp::from_millis(1),
                &CellValue::Double(1.0),
            )
            .is_err());
        assert_eq!(writer.entries(), 0);
    }
}
