//! Key encoding utilities for `RocksDB`.
//!
//! Cell key format: `row_key || family_id (1 byte) || qualifier || 0x00 || !timestamp (8 bytes BE)`.
//!
//! Row keys have a fixed length per table, qualifiers never contain `0x00`, and the
//! timestamp is stored inverted, so the versions of one column sort newest first.

use dota_streaks_core::Timestamp;

use crate::error::{Result, StoreError};

const QUALIFIER_TERMINATOR: u8 = 0x00;
const TIMESTAMP_LEN: usize = 8;

/// A decoded cell key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellKey<'a> {
    /// Row-key bytes.
    pub row: &'a [u8],
    /// Physical family id.
    pub family_id: u8,
    /// Qualifier.
    pub qualifier: &'a str,
    /// Version timestamp.
    pub timestamp: Timestamp,
}

/// Encode a cell key.
#[must_use]
pub fn cell_key(row: &[u8], family_id: u8, qualifier: &str, timestamp: Timestamp) -> Vec<u8> {
    let mut key = Vec::with_capacity(row.len() + qualifier.len() + 2 + TIMESTAMP_LEN);
    key.extend_from_slice(row);
    key.push(family_id);
    key.extend_from_slice(qualifier.as_bytes());
    key.push(QUALIFIER_TERMINATOR);
    key.extend_from_slice(&(u64::MAX - timestamp.as_millis()).to_be_bytes());
    key
}

/// Decode a cell key for a table with `row_len`-byte row keys.
///
/// # Errors
///
/// Returns `StoreError::InvalidKey` if the key is truncated or malformed.
pub fn decode_cell_key(key: &[u8], row_len: usize) -> Result<CellKey<'_>> {
    let invalid = |what: &str| StoreError::InvalidKey(format!("{what} in cell key of {} bytes", key.len()));

    if key.len() < row_len + 2 + TIMESTAMP_LEN {
        return Err(invalid("truncated"));
    }
    let (row, rest) = key.split_at(row_len);
    let family_id = rest[0];
    let (column, ts_bytes) = rest[1..].split_at(rest.len() - 1 - TIMESTAMP_LEN);
    let (terminator, qualifier) = column
        .split_last()
        .ok_or_else(|| invalid("missing qualifier"))?;
    if *terminator != QUALIFIER_TERMINATOR {
        return Err(invalid("unterminated qualifier"));
    }
    let qualifier = std::str::from_utf8(qualifier).map_err(|_| invalid("non-utf8 qualifier"))?;

    let mut inverted = [0u8; TIMESTAMP_LEN];
    inverted.copy_from_slice(ts_bytes);
    let timestamp = Timestamp::from_millis(u64::MAX - u64::from_be_bytes(inverted));

    Ok(CellKey {
        row,
        family_id,
        qualifier,
        timestamp,
    })
}

/// Smallest key strictly greater than every key starting with `prefix`.
///
/// Returns `None` if no such key exists (the prefix is all `0xff`).
#[must_use]
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut next = prefix.to_vec();
    while let Some(last) = next.pop() {
        if last < u8::MAX {
            next.push(last + 1);
            return Some(next);
        }
    }
    None
}

/// Create a layout key from a table name.
#[must_use]
pub fn layout_key(table: &str) -> Vec<u8> {
    table.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW: [u8; 8] = [0xaa, 0xbb, 0xcc, 0xdd, 0, 0, 0, 42];

    #[test]
    fn cell_key_roundtrip() {
        let ts = Timestamp::from_millis(1_371_234_567_000);
        let key = cell_key(&ROW, 3, "real_match", ts);
        let decoded = decode_cell_key(&key, ROW.len()).unwrap();
        assert_eq!(decoded.row, &ROW);
        assert_eq!(decoded.family_id, 3);
        assert_eq!(decoded.qualifier, "real_match");
        assert_eq!(decoded.timestamp, ts);
    }

    #[test]
    fn newer_versions_sort_first() {
        let old = cell_key(&ROW, 1, "player", Timestamp::from_millis(100));
        let new = cell_key(&ROW, 1, "player", Timestamp::from_millis(200));
        assert!(new < old);
    }

    #[test]
    fn qualifier_prefixes_do_not_interleave() {
        // "streak" must sort entirely before "streak_all" regardless of timestamps.
        let short_old = cell_key(&ROW, 1, "streak", Timestamp::from_millis(1));
        let long_new = cell_key(&ROW, 1, "streak_all", Timestamp::from_millis(u64::MAX));
        assert!(short_old < long_new);
    }

    #[test]
    fn decode_rejects_truncated_keys() {
        assert!(matches!(
            decode_cell_key(&ROW, ROW.len()),
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn prefix_successor_carries() {
        assert_eq!(prefix_successor(&[1, 2]), Some(vec![1, 3]));
        assert_eq!(prefix_successor(&[1, 0xff]), Some(vec![2]));
        assert_eq!(prefix_successor(&[0xff, 0xff]), None);
    }
}
