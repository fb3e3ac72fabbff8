//! On-disk cell encoding.
//!
//! Cells are CBOR-encoded `CellValue`s. Both the live write path and the bulk file
//! writer go through `CellEncoder`, so cells written either way read back identically.

use dota_streaks_core::{CellValue, ColumnName, ValueKind};

use crate::error::{Result, StoreError};
use crate::layout::TableLayout;

/// Encodes values for one column, checking them against the declared kind.
#[derive(Debug, Clone)]
pub struct CellEncoder {
    column: ColumnName,
    declared: ValueKind,
}

impl CellEncoder {
    /// Build the encoder for a column of a table layout.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownColumn` if the layout does not declare the column.
    pub fn for_column(layout: &TableLayout, column: &ColumnName) -> Result<Self> {
        Ok(Self {
            column: column.clone(),
            declared: layout.value_kind(column)?,
        })
    }

    /// Encode a value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WrongValueKind` if the value does not match the declared kind,
    /// or `StoreError::Serialization` if encoding fails.
    pub fn encode(&self, value: &CellValue) -> Result<Vec<u8>> {
        if value.kind() != self.declared {
            return Err(StoreError::WrongValueKind {
                column: self.column.to_string(),
                declared: self.declared,
                found: value.kind(),
            });
        }
        serialize(value)
    }
}

/// Serialize a value using CBOR.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if encoding fails.
pub fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Deserialize a value from CBOR.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the bytes are not a valid encoding of `T`.
pub fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
    ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::RowKeyFormat;
    use dota_streaks_core::{AccountId, Participant};

    fn layout() -> TableLayout {
        TableLayout::new(
            "matches",
            RowKeyFormat {
                hash_prefix_len: 4,
                component_len: 8,
            },
        )
        .with_group("data", 0, &[("player_data", ValueKind::Participants)])
        .with_map("derived_data", 1, ValueKind::Double)
    }

    #[test]
    fn encode_then_decode() {
        let column = ColumnName::new("data", "player_data").unwrap();
        let encoder = CellEncoder::for_column(&layout(), &column).unwrap();
        let value = CellValue::Participants(vec![Participant::new(AccountId::new(5), 0, 1)]);
        let bytes = encoder.encode(&value).unwrap();
        let back: CellValue = deserialize(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let column = ColumnName::new("derived_data", "real_match").unwrap();
        let encoder = CellEncoder::for_column(&layout(), &column).unwrap();
        let result = encoder.encode(&CellValue::Int(3));
        assert!(matches!(
            result,
            Err(StoreError::WrongValueKind {
                declared: ValueKind::Double,
                found: ValueKind::Int,
                ..
            })
        ));
    }

    #[test]
    fn undeclared_column_has_no_encoder() {
        let column = ColumnName::new("stats", "kills").unwrap();
        assert!(CellEncoder::for_column(&layout(), &column).is_err());
    }
}
