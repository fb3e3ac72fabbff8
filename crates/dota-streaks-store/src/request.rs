//! Read requests and row snapshots.

use std::collections::BTreeMap;

use dota_streaks_core::{CellValue, ColumnName, Timestamp};

use crate::entity_id::RowKey;
use crate::keys::prefix_successor;

/// Request every version of a column.
pub const ALL_VERSIONS: usize = usize::MAX;

/// One requested column or family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRequest {
    /// Logical family.
    pub family: String,
    /// Qualifier, or `None` for every qualifier of the family.
    pub qualifier: Option<String>,
    /// Maximum number of versions returned per column, newest first.
    pub max_versions: usize,
}

impl ColumnRequest {
    fn matches(&self, column: &ColumnName) -> bool {
        self.family == column.family()
            && self
                .qualifier
                .as_deref()
                .map_or(true, |q| q == column.qualifier())
    }
}

/// The set of columns a read should return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataRequest {
    columns: Vec<ColumnRequest>,
}

impl DataRequest {
    /// Start building a request.
    #[must_use]
    pub fn builder() -> DataRequestBuilder {
        DataRequestBuilder::default()
    }

    /// Version limit for a column, or `None` if the column is not requested.
    #[must_use]
    pub fn max_versions(&self, column: &ColumnName) -> Option<usize> {
        self.columns
            .iter()
            .filter(|r| r.matches(column))
            .map(|r| r.max_versions)
            .max()
    }

    /// Whether any column of the family is requested.
    #[must_use]
    pub fn wants_family(&self, family: &str) -> bool {
        self.columns.iter().any(|r| r.family == family)
    }

}

/// Builder for `DataRequest`.
#[derive(Debug, Clone)]
pub struct DataRequestBuilder {
    max_versions: usize,
    columns: Vec<ColumnRequest>,
}

impl Default for DataRequestBuilder {
    fn default() -> Self {
        Self {
            max_versions: 1,
            columns: Vec::new(),
        }
    }
}

impl DataRequestBuilder {
    /// Set the version limit for columns added after this call.
    #[must_use]
    pub fn max_versions(mut self, max_versions: usize) -> Self {
        self.max_versions = max_versions.max(1);
        self
    }

    /// Request one column.
    #[must_use]
    pub fn add(mut self, column: &ColumnName) -> Self {
        self.columns.push(ColumnRequest {
            family: column.family().to_string(),
            qualifier: Some(column.qualifier().to_string()),
            max_versions: self.max_versions,
        });
        self
    }

    /// Request every qualifier of a family.
    #[must_use]
    pub fn add_family(mut self, family: &str) -> Self {
        self.columns.push(ColumnRequest {
            family: family.to_string(),
            qualifier: None,
            max_versions: self.max_versions,
        });
        self
    }

    /// Finish the request.
    #[must_use]
    pub fn build(self) -> DataRequest {
        DataRequest {
            columns: self.columns,
        }
    }
}

/// One version of a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Version timestamp.
    pub timestamp: Timestamp,
    /// Value.
    pub value: CellValue,
}

/// A snapshot of the requested columns of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowData {
    row_key: RowKey,
    columns: BTreeMap<ColumnName, Vec<Cell>>,
}

impl RowData {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new(row_key: RowKey) -> Self {
        Self {
            row_key,
            columns: BTreeMap::new(),
        }
    }

    /// Append a version. Versions of one column must be pushed newest first.
    pub fn push_version(&mut self, column: ColumnName, cell: Cell) {
        self.columns.entry(column).or_default().push(cell);
    }

    /// Number of versions already held for a column.
    pub(crate) fn version_count(&self, column: &ColumnName) -> usize {
        self.columns.get(column).map_or(0, Vec::len)
    }

    /// The row key.
    #[must_use]
    pub fn row_key(&self) -> &RowKey {
        &self.row_key
    }

    /// Whether no requested column has any version.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All versions of a column, newest first.
    #[must_use]
    pub fn cells(&self, column: &ColumnName) -> &[Cell] {
        self.columns.get(column).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The newest version of a column.
    #[must_use]
    pub fn most_recent_cell(&self, column: &ColumnName) -> Option<&Cell> {
        self.cells(column).first()
    }

    /// The newest value of a column.
    #[must_use]
    pub fn most_recent_value(&self, column: &ColumnName) -> Option<&CellValue> {
        self.most_recent_cell(column).map(|c| &c.value)
    }

    /// The newest value of every qualifier of a family, keyed by qualifier.
    #[must_use]
    pub fn most_recent_values(&self, family: &str) -> BTreeMap<&str, &CellValue> {
        self.columns
            .iter()
            .filter(|(column, _)| column.family() == family)
            .filter_map(|(column, cells)| cells.first().map(|c| (column.qualifier(), &c.value)))
            .collect()
    }

    /// Timestamps of a column's versions, newest first.
    pub fn timestamps(&self, column: &ColumnName) -> impl Iterator<Item = Timestamp> + '_ {
        self.cells(column).iter().map(|c| c.timestamp)
    }

    /// The value of a column at exactly `timestamp`.
    #[must_use]
    pub fn value_at(&self, column: &ColumnName, timestamp: Timestamp) -> Option<&CellValue> {
        let cells = self.cells(column);
        // Cells are sorted by descending timestamp.
        cells
            .binary_search_by(|c| timestamp.cmp(&c.timestamp))
            .ok()
            .map(|i| &cells[i].value)
    }
}

/// A half-open range of row keys, `[start, end)`; `None` bounds are open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowRange {
    /// Inclusive lower bound.
    pub start: Option<Vec<u8>>,
    /// Exclusive upper bound.
    pub end: Option<Vec<u8>>,
}

impl RowRange {
    /// The whole table.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Exactly one row.
    #[must_use]
    pub fn single(row: &RowKey) -> Self {
        Self {
            start: Some(row.as_bytes().to_vec()),
            end: prefix_successor(row.as_bytes()),
        }
    }

    /// Split the key space into `parts` contiguous ranges on the first key byte.
    ///
    /// `parts` is clamped to `1..=256`.
    #[must_use]
    pub fn split(parts: usize) -> Vec<Self> {
        let parts = parts.clamp(1, 256);
        let bound = |i: usize| -> Option<Vec<u8>> {
            if i == 0 || i == parts {
                None
            } else {
                u8::try_from(i * 256 / parts).ok().map(|b| vec![b])
            }
        };
        (0..parts)
            .map(|i| Self {
                start: bound(i),
                end: bound(i + 1),
            })
            .collect()
    }

    /// Whether a row key lies at or past the upper bound.
    #[must_use]
    pub fn is_past_end(&self, row: &[u8]) -> bool {
        self.end.as_deref().is_some_and(|e| row >= e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(range: &RowRange, row: &[u8]) -> bool {
        range.start.as_deref().map_or(true, |s| row >= s) && !range.is_past_end(row)
    }

    fn column(s: &str) -> ColumnName {
        s.parse().unwrap()
    }

    #[test]
    fn request_version_limits() {
        let request = DataRequest::builder()
            .add(&column("data:player_data"))
            .max_versions(ALL_VERSIONS)
            .add_family("derived_data")
            .build();

        assert_eq!(request.max_versions(&column("data:player_data")), Some(1));
        assert_eq!(
            request.max_versions(&column("derived_data:real_match")),
            Some(ALL_VERSIONS)
        );
        assert_eq!(request.max_versions(&column("data:game_mode")), None);
        assert!(request.wants_family("data"));
        assert!(!request.wants_family("match_derived_data"));
    }

    #[test]
    fn row_data_lookups() {
        let col = column("data:player");
        let mut row = RowData::new(RowKey::from_bytes(vec![1, 2, 3]));
        for ts in [300, 200, 100] {
            row.push_version(
                col.clone(),
                Cell {
                    timestamp: Timestamp::from_millis(ts),
                    value: CellValue::Int(i64::try_from(ts).unwrap()),
                },
            );
        }

        assert_eq!(row.most_recent_value(&col), Some(&CellValue::Int(300)));
        assert_eq!(
            row.timestamps(&col).map(Timestamp::as_millis).collect::<Vec<_>>(),
            vec![300, 200, 100]
        );
        assert_eq!(
            row.value_at(&col, Timestamp::from_millis(200)),
            Some(&CellValue::Int(200))
        );
        assert_eq!(row.value_at(&col, Timestamp::from_millis(250)), None);
        assert!(row.cells(&column("data:other")).is_empty());
    }

    #[test]
    fn split_covers_key_space() {
        let ranges = RowRange::split(4);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0].start, None);
        assert_eq!(ranges[0].end, Some(vec![64]));
        assert_eq!(ranges[3].start, Some(vec![192]));
        assert_eq!(ranges[3].end, None);

        for key in [[0u8, 1], [63, 255], [64, 0], [200, 7], [255, 255]] {
            let owners = ranges.iter().filter(|r| contains(r, &key)).count();
            assert_eq!(owners, 1, "key {key:?}");
        }
    }

    #[test]
    fn single_row_range() {
        let row = RowKey::from_bytes(vec![5, 5]);
        let range = RowRange::single(&row);
        assert!(contains(&range, &[5, 5]));
        assert!(!contains(&range, &[5, 6]));
        assert!(range.is_past_end(&[5, 6]));
    }
}
