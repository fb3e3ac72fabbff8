//! Local unit runner.
//!
//! A job is split into units, each owning a disjoint range of row keys. Units run on
//! the blocking thread pool and share nothing but the store.

use std::sync::Arc;

use tokio::task::JoinSet;

use dota_streaks_store::{RowRange, Store};

use crate::error::{JobError, Result};

/// Run `work` once per unit over `units` disjoint row ranges covering the table.
///
/// Outputs are returned in unit order. The first failing unit fails the whole run;
/// nothing is retried.
///
/// # Errors
///
/// Returns the first unit error, or `JobError::Unit` if a unit panicked.
pub async fn run_units<S, T, F>(store: Arc<S>, units: usize, work: F) -> Result<Vec<T>>
where
    S: Store + ?Sized + 'static,
    T: Send + 'static,
    F: Fn(&S, usize, RowRange) -> Result<T> + Send + Sync + 'static,
{
    let ranges = RowRange::split(units);
    let count = ranges.len();
    let work = Arc::new(work);

    let mut set = JoinSet::new();
    for (unit, range) in ranges.into_iter().enumerate() {
        let store = Arc::clone(&store);
        let work = Arc::clone(&work);
        set.spawn_blocking(move || {
            tracing::debug!(unit, start = ?range.start, end = ?range.end, "Starting unit");
            (unit, work(&*store, unit, range))
        });
    }

    let mut outputs: Vec<Option<T>> = (0..count).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        let (unit, result) = joined.map_err(|e| JobError::Unit(e.to_string()))?;
        match result {
            Ok(output) => {
                tracing::debug!(unit, "Unit finished");
                outputs[unit] = Some(output);
            }
            Err(e) => {
                tracing::error!(unit, error = %e, "Unit failed");
                return Err(e);
            }
        }
    }

    outputs
        .into_iter()
        .enumerate()
        .map(|(unit, output)| {
            output.ok_or_else(|| JobError::Unit(format!("unit {unit} produced no output")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dota_streaks_core::{AccountId, CellValue, Timestamp};
    use dota_streaks_store::schema::{columns, players_layout, tables};
    use dota_streaks_store::{DataRequest, EntityIdFactory, RocksStore, StoreError};
    use tempfile::TempDir;

    fn create_test_store() -> (Arc<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        store.create_table(&players_layout()).unwrap();
        let ids = EntityIdFactory::from_layout(&players_layout());
        for account in 1..=40 {
            let row = ids.player_row_key(AccountId::new(account)).unwrap().unwrap();
            store
                .put(
                    tables::PLAYERS,
                    &row,
                    &columns::radiant_win(),
                    Timestamp::from_millis(1),
                    CellValue::Bool(true),
                )
                .unwrap();
        }
        (Arc::new(store), dir)
    }

    #[tokio::test]
    async fn units_cover_every_row_once() {
        let (store, _dir) = create_test_store();
        let counts = run_units(store, 5, |store: &RocksStore, _unit, range| {
            let request = DataRequest::builder().add(&columns::radiant_win()).build();
            Ok(store.scan(tables::PLAYERS, &request, &range)?.count())
        })
        .await
        .unwrap();
        assert_eq!(counts.len(), 5);
        assert_eq!(counts.iter().sum::<usize>(), 40);
    }

    #[tokio::test]
    async fn first_error_fails_the_run() {
        let (store, _dir) = create_test_store();
        let result = run_units(store, 3, |_: &RocksStore, unit, _range| {
            if unit == 1 {
                Err(StoreError::TableNotFound("gone".into()).into())
            } else {
                Ok(unit)
            }
        })
        .await;
        assert!(matches!(result, Err(JobError::Store(_))));
    }
}
