//! Buffered table writer.
//!
//! Jobs emit one cell at a time; `BufferedWriter` groups them into batches and applies
//! each batch with a single `Store::write` once the flush threshold is reached.

use dota_streaks_core::{CellValue, ColumnName, Timestamp};
use tracing::{debug, error};

use crate::entity_id::RowKey;
use crate::error::Result;
use crate::Store;

/// A single cell write.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// Target row.
    pub row_key: RowKey,
    /// Target column.
    pub column: ColumnName,
    /// Version timestamp.
    pub timestamp: Timestamp,
    /// New value.
    pub value: CellValue,
}

/// Batches cell writes to one table.
///
/// Pending writes are flushed when the buffer reaches the threshold, on `flush`, on
/// `close`, and as a last resort when the writer is dropped.
pub struct BufferedWriter<'s, S: Store + ?Sized> {
    store: &'s S,
    table: String,
    threshold: usize,
    pending: Vec<Mutation>,
    written: u64,
    closed: bool,
}

impl<'s, S: Store + ?Sized> BufferedWriter<'s, S> {
    /// Open a writer for an existing table. A threshold of 0 is treated as 1.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::TableNotFound` if the table doesn't exist.
    pub fn open(store: &'s S, table: &str, threshold: usize) -> Result<Self> {
        store.table_layout(table)?;
        let threshold = threshold.max(1);
        Ok(Self {
            store,
            table: table.to_string(),
            threshold,
            pending: Vec::with_capacity(threshold),
            written: 0,
            closed: false,
        })
    }

    /// Queue a cell write, flushing if the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns the store error if a triggered flush fails.
    pub fn put(
        &mut self,
        row: &RowKey,
        column: &ColumnName,
        timestamp: Timestamp,
        value: CellValue,
    ) -> Result<()> {
        self.pending.push(Mutation {
            row_key: row.clone(),
            column: column.clone(),
            timestamp,
            value,
        });
        if self.pending.len() >= self.threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Apply all pending writes.
    ///
    /// # Errors
    ///
    /// Returns the store error; pending writes are kept so the flush can be retried.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.store.write(&self.table, &self.pending)?;
        let count = self.pending.len() as u64;
        self.written += count;
        self.pending.clear();
        debug!(table = %self.table, cells = count, total = self.written, "Flushed writes");
        Ok(())
    }

    /// Number of queued writes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Number of writes applied so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// The target table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Flush remaining writes and return the total number applied.
    ///
    /// # Errors
    ///
    /// Returns the store error if the final flush fails.
    pub fn close(mut self) -> Result<u64> {
        self.closed = true;
        self.flush()?;
        Ok(self.written)
    }
}

impl<S: Store + ?Sized> Drop for BufferedWriter<'_, S> {
    fn drop(&mut self) {
        if self.closed || self.pending.is_empty() {
            return;
        }
        if let Err(e) = self.flush() {
            error!(table = %self.table, pending = self.pending.len(), error = %e, "Failed to flush writes on drop");
        }
    }
}
