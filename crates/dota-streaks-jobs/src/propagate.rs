//! Derived-data propagation from match rows to player rows.
//!
//! Every value of a match row's `derived_data` family is copied to
//! `match_derived_data:<qualifier>` of each non-anonymous participant, stamped with
//! the match's `player_data` timestamp. The same cells can be written live through a
//! `BufferedWriter` or collected into bulk files with a `BulkFileWriter`.

use dota_streaks_core::{CellValue, ColumnName, CoreError, Participant, Timestamp};
use dota_streaks_store::schema::{columns, families};
use dota_streaks_store::{
    BufferedWriter, BulkFileWriter, DataRequest, EntityIdFactory, RowData, RowKey, Store,
    StoreError,
};

use crate::counters::{Counter, Counters};
use crate::error::{JobError, Result};

/// What a match row contributes to its players' rows.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFacts {
    /// Match participants, anonymous ones included.
    pub participants: Vec<Participant>,
    /// Timestamp of the `player_data` cell.
    pub played_at: Timestamp,
    /// Most recent value of each derived qualifier, ordered by qualifier.
    pub values: Vec<(String, f64)>,
}

impl DerivedFacts {
    /// Columns read for each match row.
    #[must_use]
    pub fn request() -> DataRequest {
        DataRequest::builder()
            .add(&columns::player_data())
            .add_family(families::DERIVED_DATA)
            .build()
    }

    /// Read the facts of a match row, or `None` if it has no derived data.
    ///
    /// # Errors
    ///
    /// Returns `JobError::MalformedRow` if `player_data` is missing or a cell has an
    /// unexpected type.
    pub fn from_row(row: &RowData) -> Result<Option<Self>> {
        let derived = row.most_recent_values(families::DERIVED_DATA);
        if derived.is_empty() {
            return Ok(None);
        }

        let player_data = columns::player_data();
        let cell = row
            .most_recent_cell(&player_data)
            .ok_or_else(|| JobError::missing(row.row_key(), &player_data))?;
        let participants = cell
            .value
            .require_participants(&player_data)
            .map_err(|e| JobError::malformed(row.row_key(), e))?
            .to_vec();

        let values = derived
            .into_iter()
            .map(|(qualifier, value)| -> Result<(String, f64)> {
                let column = ColumnName::new(families::DERIVED_DATA, qualifier)
                    .map_err(|e| JobError::malformed(row.row_key(), e))?;
                let value = value
                    .require_double(&column)
                    .map_err(|e| JobError::malformed(row.row_key(), e))?;
                Ok((qualifier.to_string(), value))
            })
            .collect::<Result<_>>()?;

        Ok(Some(Self {
            participants,
            played_at: cell.timestamp,
            values,
        }))
    }
}

/// Destination of propagated cells.
pub trait DerivedSink {
    /// Write one derived value to a player row.
    ///
    /// # Errors
    ///
    /// Returns an error if the cell cannot be written or queued.
    fn put_derived(
        &mut self,
        row: &RowKey,
        column: &ColumnName,
        timestamp: Timestamp,
        value: f64,
    ) -> Result<()>;
}

impl<S: Store + ?Sized> DerivedSink for BufferedWriter<'_, S> {
    fn put_derived(
        &mut self,
        row: &RowKey,
        column: &ColumnName,
        timestamp: Timestamp,
        value: f64,
    ) -> Result<()> {
        self.put(row, column, timestamp, CellValue::Double(value))?;
        Ok(())
    }
}

impl DerivedSink for BulkFileWriter {
    fn put_derived(
        &mut self,
        row: &RowKey,
        column: &ColumnName,
        timestamp: Timestamp,
        value: f64,
    ) -> Result<()> {
        self.put(row, column, timestamp, &CellValue::Double(value))?;
        Ok(())
    }
}

/// Fan the facts of one match out to its non-anonymous participants.
///
/// # Errors
///
/// Returns the sink's error.
pub fn propagate<K: DerivedSink + ?Sized>(
    facts: &DerivedFacts,
    ids: &EntityIdFactory,
    sink: &mut K,
    counters: &mut Counters,
) -> Result<()> {
    let targets: Vec<ColumnName> = facts
        .values
        .iter()
        .map(|(qualifier, _)| ColumnName::new(families::MATCH_DERIVED_DATA, qualifier.as_str()))
        .collect::<std::result::Result<_, CoreError>>()
        .map_err(StoreError::from)?;

    for participant in &facts.participants {
        let Some(row) = ids.player_row_key(participant.account_id)? else {
            counters.increment(Counter::AnonymousParticipants);
            continue;
        };
        for (column, (_, value)) in targets.iter().zip(&facts.values) {
            sink.put_derived(&row, column, facts.played_at, *value)?;
            counters.increment(Counter::CellsWritten);
        }
    }
    Ok(())
}

/// Read one match row and propagate its derived data.
///
/// # Errors
///
/// Returns `JobError::MalformedRow` for undecodable rows, or the sink's error.
pub fn propagate_row<K: DerivedSink + ?Sized>(
    row: &RowData,
    ids: &EntityIdFactory,
    sink: &mut K,
    counters: &mut Counters,
) -> Result<()> {
    match DerivedFacts::from_row(row)? {
        Some(facts) => propagate(&facts, ids, sink, counters),
        None => {
            counters.increment(Counter::RowsWithoutDerivedData);
            Ok(())
        }
    }
}
