//! dota-streaks jobs - match classification, propagation and streak statistics
//!
//! This is the main entry point for running a single job against a local store.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dota_streaks_jobs::{run_job, JobConfig};
use dota_streaks_store::{schema, RocksStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dota_streaks=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting dota-streaks jobs");

    // Load configuration from environment
    let config = JobConfig::from_env();
    config.validate()?;

    tracing::info!(
        job = %config.job,
        data_dir = %config.data_dir,
        units = config.units,
        burn_in = config.burn_in,
        burn_in_counting = %config.burn_in_counting,
        flush_threshold = config.flush_threshold,
        output_table = %config.output_table,
        "Job configuration loaded"
    );

    // Initialize RocksDB store
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = RocksStore::open_with(&config.data_dir, config.store_options())?;
    for layout in schema::standard_layouts() {
        store.ensure_table(&layout)?;
    }

    let report = run_job(Arc::new(store), &config).await?;

    if !report.streaks.is_empty() && config.report_path.is_none() {
        print!("{}", dota_streaks_jobs::format_report(&report.streaks));
    }
    Ok(())
}
