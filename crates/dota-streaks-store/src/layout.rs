//! Table layouts and the logical-to-physical column translation.
//!
//! A layout is the schema of one table: its row-key format, its column families and the
//! declared value kind of every column. Layouts are versioned; anything derived from a
//! layout (translators, encoders, entity id factories) is only valid for that version.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use dota_streaks_core::cell::validate_name;
use dota_streaks_core::{ColumnName, ValueKind};

use crate::error::{Result, StoreError};

/// Maximum hash prefix length (bytes of a SHA-256 digest).
pub const MAX_HASH_PREFIX_LEN: usize = 32;

/// Row-key format: `hash(component)[..hash_prefix_len] || component`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowKeyFormat {
    /// Number of hash bytes prepended to spread rows across the key space.
    pub hash_prefix_len: usize,

    /// Fixed length of the entity component (e.g. 4 bytes for an account id).
    pub component_len: usize,
}

impl RowKeyFormat {
    /// Total row-key length in bytes.
    #[must_use]
    pub const fn row_key_len(&self) -> usize {
        self.hash_prefix_len + self.component_len
    }
}

/// Layout of one column family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyLayout {
    /// Logical family name.
    pub name: String,

    /// One-byte physical id used in cell keys.
    pub id: u8,

    /// Group or map family.
    pub kind: FamilyKind,
}

/// Shape of a column family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FamilyKind {
    /// A fixed set of named, individually typed columns.
    Group {
        /// The declared columns.
        columns: Vec<ColumnLayout>,
    },
    /// Any qualifier, all sharing one value kind.
    Map {
        /// The value kind of every qualifier.
        values: ValueKind,
    },
}

/// A declared column of a group family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnLayout {
    /// Column qualifier.
    pub qualifier: String,

    /// Declared value kind.
    pub values: ValueKind,
}

/// The schema of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableLayout {
    /// Table name; also the name of the backing `RocksDB` column family.
    pub name: String,

    /// Layout version, increased by every alteration.
    pub version: u32,

    /// Row-key format.
    pub row_key: RowKeyFormat,

    /// Column families.
    pub families: Vec<FamilyLayout>,
}

impl TableLayout {
    /// Create a version 1 layout with no families.
    #[must_use]
    pub fn new(name: impl Into<String>, row_key: RowKeyFormat) -> Self {
        Self {
            name: name.into(),
            version: 1,
            row_key,
            families: Vec::new(),
        }
    }

    /// Set the layout version.
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Add a group family with the given typed columns.
    #[must_use]
    pub fn with_group(mut self, name: &str, id: u8, columns: &[(&str, ValueKind)]) -> Self {
        let columns = columns
            .iter()
            .map(|(qualifier, values)| ColumnLayout {
                qualifier: (*qualifier).to_string(),
                values: *values,
            })
            .collect();
        self.families.push(FamilyLayout {
            name: name.to_string(),
            id,
            kind: FamilyKind::Group { columns },
        });
        self
    }

    /// Add a map family whose qualifiers all hold `values`.
    #[must_use]
    pub fn with_map(mut self, name: &str, id: u8, values: ValueKind) -> Self {
        self.families.push(FamilyLayout {
            name: name.to_string(),
            id,
            kind: FamilyKind::Map { values },
        });
        self
    }

    /// Check names, ids and the row-key format.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SchemaMismatch` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.version == 0 {
            return Err(StoreError::SchemaMismatch(format!(
                "{}: layout version must start at 1",
                self.name
            )));
        }
        if self.row_key.hash_prefix_len > MAX_HASH_PREFIX_LEN || self.row_key.component_len == 0 {
            return Err(StoreError::SchemaMismatch(format!(
                "{}: invalid row key format {:?}",
                self.name, self.row_key
            )));
        }

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for family in &self.families {
            validate_name(&family.name)?;
            if !names.insert(family.name.as_str()) || !ids.insert(family.id) {
                return Err(StoreError::SchemaMismatch(format!(
                    "{}: duplicate family {} (id {})",
                    self.name, family.name, family.id
                )));
            }
            if let FamilyKind::Group { columns } = &family.kind {
                let mut qualifiers = HashSet::new();
                for column in columns {
                    validate_name(&column.qualifier)?;
                    if !qualifiers.insert(column.qualifier.as_str()) {
                        return Err(StoreError::SchemaMismatch(format!(
                            "{}: duplicate column {}:{}",
                            self.name, family.name, column.qualifier
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Look up a family by logical name.
    #[must_use]
    pub fn family(&self, name: &str) -> Option<&FamilyLayout> {
        self.families.iter().find(|f| f.name == name)
    }

    /// The declared value kind of a column.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownColumn` if the family or group column is not declared.
    pub fn value_kind(&self, column: &ColumnName) -> Result<ValueKind> {
        let unknown = || StoreError::UnknownColumn {
            table: self.name.clone(),
            column: column.to_string(),
        };
        let family = self.family(column.family()).ok_or_else(unknown)?;
        match &family.kind {
            FamilyKind::Map { values } => Ok(*values),
            FamilyKind::Group { columns } => columns
                .iter()
                .find(|c| c.qualifier == column.qualifier())
                .map(|c| c.values)
                .ok_or_else(unknown),
        }
    }

    /// Row-key length in bytes.
    #[must_use]
    pub const fn row_key_len(&self) -> usize {
        self.row_key.row_key_len()
    }
}

/// A column as addressed in physical cell keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalColumn {
    /// Physical family id.
    pub family_id: u8,

    /// Qualifier bytes.
    pub qualifier: String,
}

/// Translates logical column names to physical family ids and back.
///
/// Built once from a layout and assumed valid for as long as that layout version is current.
#[derive(Debug, Clone)]
pub struct ColumnTranslator {
    table: String,
    by_name: HashMap<String, u8>,
    by_id: HashMap<u8, String>,
    layout: TableLayout,
}

impl ColumnTranslator {
    /// Build a translator for a layout.
    #[must_use]
    pub fn new(layout: &TableLayout) -> Self {
        let by_name = layout
            .families
            .iter()
            .map(|f| (f.name.clone(), f.id))
            .collect();
        let by_id = layout
            .families
            .iter()
            .map(|f| (f.id, f.name.clone()))
            .collect();
        Self {
            table: layout.name.clone(),
            by_name,
            by_id,
            layout: layout.clone(),
        }
    }

    /// Translate a logical column, checking that it is declared.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownColumn` if the column is not part of the layout.
    pub fn to_physical(&self, column: &ColumnName) -> Result<PhysicalColumn> {
        self.layout.value_kind(column)?;
        let family_id = self
            .family_id(column.family())
            .ok_or_else(|| StoreError::UnknownColumn {
                table: self.table.clone(),
                column: column.to_string(),
            })?;
        Ok(PhysicalColumn {
            family_id,
            qualifier: column.qualifier().to_string(),
        })
    }

    /// Translate a physical column back to its logical name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidKey` for an unknown family id.
    pub fn to_logical(&self, family_id: u8, qualifier: &str) -> Result<ColumnName> {
        let family = self.by_id.get(&family_id).ok_or_else(|| {
            StoreError::InvalidKey(format!("unknown family id {family_id} in {}", self.table))
        })?;
        Ok(ColumnName::new(family.clone(), qualifier)?)
    }

    /// Physical id of a logical family.
    #[must_use]
    pub fn family_id(&self, family: &str) -> Option<u8> {
        self.by_name.get(family).copied()
    }

    /// The layout this translator was built from.
    #[must_use]
    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }
}
