//! Job entry points.
//!
//! Each job validates its configuration and the tables it needs, runs its units in
//! parallel and merges their counters into a `JobReport`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use dota_streaks_store::schema::tables;
use dota_streaks_store::{
    BufferedWriter, BulkFile, BulkFileWriter, DataRequest, EntityIdFactory, RowData, RowRange,
    Store,
};

use crate::classifier::{classify_row, MatchSnapshot};
use crate::config::{JobConfig, JobKind};
use crate::counters::{Counter, Counters};
use crate::error::{JobError, Result};
use crate::propagate::{propagate_row, DerivedFacts};
use crate::report::write_report;
use crate::runner::run_units;
use crate::streak::{self, process_player, Bucket, StreakBuckets, StreakStat};

/// Outcome of a job.
#[derive(Debug, Clone, Default)]
pub struct JobReport {
    /// The job that ran.
    pub job: Option<JobKind>,
    /// Counters merged across units.
    pub counters: Counters,
    /// Streak table, for `streak-table`.
    pub streaks: Vec<StreakStat>,
    /// Bulk files written, for `propagate-bulk`.
    pub bulk_files: Vec<BulkFile>,
}

impl JobReport {
    fn new(job: JobKind) -> Self {
        Self {
            job: Some(job),
            ..Self::default()
        }
    }

    fn log_summary(&self) {
        let job = self.job.map_or("unknown", JobKind::as_str);
        self.counters.log_summary(job);
        info!(
            job,
            streak_values = self.streaks.len(),
            bulk_files = self.bulk_files.len(),
            "Job finished"
        );
    }
}

/// Run the configured job.
///
/// # Errors
///
/// Returns the job's error.
pub async fn run_job<S: Store + 'static>(store: Arc<S>, config: &JobConfig) -> Result<JobReport> {
    match config.job {
        JobKind::Classify => classify_matches(store, config).await,
        JobKind::Propagate => propagate_incremental(store, config).await,
        JobKind::PropagateBulk => generate_bulk_files(store, config).await,
        JobKind::LoadBulk => load_bulk_files(store, config).await,
        JobKind::StreakTable => streak_table(store, config).await,
        JobKind::StreakSeries => streak_series(store, config).await,
    }
}

/// Scan `range` of `table`, handing each row to `handle`.
///
/// Row-level errors are counted and logged; any other error stops the unit.
fn for_each_row<S, H>(
    store: &S,
    table: &str,
    request: &DataRequest,
    range: &RowRange,
    counters: &mut Counters,
    mut handle: H,
) -> Result<()>
where
    S: Store + ?Sized,
    H: FnMut(&RowData, &mut Counters) -> Result<()>,
{
    for row in store.scan(table, request, range)? {
        let row = row?;
        counters.increment(Counter::RowsScanned);
        match handle(&row, counters) {
            Ok(()) => {}
            Err(e) if e.is_row_level() => {
                counters.increment(Counter::MalformedRows);
                warn!(table, row = %row.row_key(), error = %e, "Skipping malformed row");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn merge_counters<'a>(parts: impl IntoIterator<Item = &'a Counters>) -> Counters {
    let mut total = Counters::new();
    for part in parts {
        total.merge(part);
    }
    total
}

fn prepare<S: Store + ?Sized>(store: &S, config: &JobConfig, tables: &[&str]) -> Result<()> {
    config.validate()?;
    for table in tables {
        store.table_layout(table)?;
    }
    info!(job = %config.job, units = config.units, "Starting job");
    Ok(())
}

/// Score every match and write `derived_data:real_match`.
///
/// # Errors
///
/// Returns setup errors before any row is read, or the first unit failure.
pub async fn classify_matches<S: Store + 'static>(
    store: Arc<S>,
    config: &JobConfig,
) -> Result<JobReport> {
    prepare(store.as_ref(), config, &[tables::MATCHES])?;
    let threshold = config.flush_threshold;

    let units = run_units(store, config.units, move |store: &S, _unit, range| {
        let mut counters = Counters::new();
        let mut writer = BufferedWriter::open(store, tables::MATCHES, threshold)?;
        for_each_row(
            store,
            tables::MATCHES,
            &MatchSnapshot::request(),
            &range,
            &mut counters,
            |row, counters| classify_row(row, &mut writer, counters).map(|_| ()),
        )?;
        writer.close()?;
        Ok(counters)
    })
    .await?;

    let mut report = JobReport::new(JobKind::Classify);
    report.counters = merge_counters(&units);
    report.log_summary();
    Ok(report)
}

/// Copy derived match data into player rows with buffered writes.
///
/// # Errors
///
/// Returns setup errors before any row is read, or the first unit failure.
pub async fn propagate_incremental<S: Store + 'static>(
    store: Arc<S>,
    config: &JobConfig,
) -> Result<JobReport> {
    prepare(store.as_ref(), config, &[tables::MATCHES, config.output_table.as_str()])?;
    let output = config.output_table.clone();
    let threshold = config.flush_threshold;

    let units = run_units(store, config.units, move |store: &S, _unit, range| {
        let ids = EntityIdFactory::from_layout(&store.table_layout(&output)?);
        let mut counters = Counters::new();
        let mut writer = BufferedWriter::open(store, &output, threshold)?;
        for_each_row(
            store,
            tables::MATCHES,
            &DerivedFacts::request(),
            &range,
            &mut counters,
            |row, counters| propagate_row(row, &ids, &mut writer, counters),
        )?;
        writer.close()?;
        Ok(counters)
    })
    .await?;

    let mut report = JobReport::new(JobKind::Propagate);
    report.counters = merge_counters(&units);
    report.log_summary();
    Ok(report)
}

/// Collect derived match data for player rows into bulk files.
///
/// Each unit writes at most one SST file plus manifest into `bulk_output_dir`.
///
/// # Errors
///
/// Returns setup errors before any row is read, or the first unit failure.
pub async fn generate_bulk_files<S: Store + 'static>(
    store: Arc<S>,
    config: &JobConfig,
) -> Result<JobReport> {
    prepare(store.as_ref(), config, &[tables::MATCHES, config.output_table.as_str()])?;
    let output = config.output_table.clone();
    let dir = PathBuf::from(&config.bulk_output_dir);

    let cleared = BulkFile::clear_dir(&dir)?;
    if cleared > 0 {
        info!(dir = %dir.display(), files = cleared, "Removed bulk files from an earlier run");
    }

    let units = run_units(store, config.units, move |store: &S, unit, range| {
        let layout = store.table_layout(&output)?;
        let ids = EntityIdFactory::from_layout(&layout);
        let mut counters = Counters::new();
        let mut writer = BulkFileWriter::new(&dir, &layout, &format!("unit{unit:03}"))?;
        for_each_row(
            store,
            tables::MATCHES,
            &DerivedFacts::request(),
            &range,
            &mut counters,
            |row, counters| propagate_row(row, &ids, &mut writer, counters),
        )?;
        let file = writer.finish()?;
        if file.is_some() {
            counters.increment(Counter::BulkFilesWritten);
        }
        Ok((counters, file))
    })
    .await?;

    let mut report = JobReport::new(JobKind::PropagateBulk);
    report.counters = merge_counters(units.iter().map(|(c, _)| c));
    report.bulk_files = units.into_iter().filter_map(|(_, f)| f).collect();
    report.log_summary();
    Ok(report)
}

/// Ingest every bulk file found in `bulk_output_dir`.
///
/// Every manifest is checked against the current layout of its table before any file
/// is ingested, so a file generated against an older layout aborts the load with
/// nothing written.
///
/// # Errors
///
/// Returns `StoreError::LayoutChanged` for stale files, or the first ingestion failure.
pub async fn load_bulk_files<S: Store + 'static>(
    store: Arc<S>,
    config: &JobConfig,
) -> Result<JobReport> {
    config.validate()?;
    let dir = PathBuf::from(&config.bulk_output_dir);

    let counters = tokio::task::spawn_blocking(move || load_dir(store.as_ref(), &dir))
        .await
        .map_err(|e| JobError::Unit(e.to_string()))??;

    let mut report = JobReport::new(JobKind::LoadBulk);
    report.counters = counters;
    report.log_summary();
    Ok(report)
}

fn load_dir<S: Store + ?Sized>(store: &S, dir: &Path) -> Result<Counters> {
    let files = BulkFile::discover(dir)?;
    for file in &files {
        file.check_layout(&store.table_layout(&file.table)?)?;
    }

    let mut counters = Counters::new();
    for file in &files {
        let cells = store.bulk_load(file)?;
        counters.increment(Counter::BulkFilesLoaded);
        counters.add(Counter::CellsLoaded, cells);
    }
    Ok(counters)
}

/// Compute the population streak table.
///
/// Each unit accumulates its own buckets; the partial buckets are reduced once all
/// units finish. The table is also written to `report_path` when configured.
///
/// # Errors
///
/// Returns setup errors before any row is read, the first unit failure, or a report
/// write failure.
pub async fn streak_table<S: Store + 'static>(
    store: Arc<S>,
    config: &JobConfig,
) -> Result<JobReport> {
    prepare(store.as_ref(), config, &[tables::PLAYERS])?;
    let settings = config.streak_settings();

    let units = run_units(store, config.units, move |store: &S, _unit, range| {
        let mut counters = Counters::new();
        let mut buckets = StreakBuckets::new();
        for_each_row(
            store,
            tables::PLAYERS,
            &streak::history_request(),
            &range,
            &mut counters,
            |row, counters| process_player(row, settings, &mut buckets, counters),
        )?;
        Ok((counters, buckets.into_pairs()))
    })
    .await?;

    let mut report = JobReport::new(JobKind::StreakTable);
    report.counters = merge_counters(units.iter().map(|(c, _)| c));
    let partials: Vec<(i32, Bucket)> = units.into_iter().flat_map(|(_, pairs)| pairs).collect();
    report.streaks = streak::reduce(partials);

    if let Some(path) = &config.report_path {
        write_report(Path::new(path), &report.streaks)?;
    }
    report.log_summary();
    Ok(report)
}

/// Write each player's streak value before every qualifying game past burn-in to
/// `match_derived_data:streak_all`.
///
/// # Errors
///
/// Returns setup errors before any row is read, or the first unit failure.
pub async fn streak_series<S: Store + 'static>(
    store: Arc<S>,
    config: &JobConfig,
) -> Result<JobReport> {
    prepare(store.as_ref(), config, &[tables::PLAYERS])?;
    let settings = config.streak_settings();
    let threshold = config.flush_threshold;

    let units = run_units(store, config.units, move |store: &S, _unit, range| {
        let mut counters = Counters::new();
        let mut writer = BufferedWriter::open(store, tables::PLAYERS, threshold)?;
        for_each_row(
            store,
            tables::PLAYERS,
            &streak::history_request(),
            &range,
            &mut counters,
            |row, counters| process_player(row, settings, &mut writer, counters),
        )?;
        counters.add(Counter::CellsWritten, writer.close()?);
        Ok(counters)
    })
    .await?;

    let mut report = JobReport::new(JobKind::StreakSeries);
    report.counters = merge_counters(&units);
    report.log_summary();
    Ok(report)
}
