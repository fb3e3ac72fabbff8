//! Batch jobs over the dota-streaks store.
//!
//! This crate provides:
//!
//! - **Classification**: scores match quality into `derived_data:real_match`
//! - **Propagation**: copies derived match data into player rows, live or via bulk files
//! - **Streaks**: win rates per streak value, or per-player streak series
//!
//! Jobs split a table into disjoint row ranges and run one unit per range on the
//! blocking thread pool (see [`runner`]). Entry points live in [`pipeline`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod classifier;
pub mod config;
pub mod counters;
pub mod error;
pub mod pipeline;
pub mod propagate;
pub mod report;
pub mod runner;
pub mod streak;

pub use classifier::{classify, classify_row, MatchQuality, MatchSnapshot};
pub use config::{JobConfig, JobKind};
pub use counters::{Counter, Counters};
pub use error::{JobError, Result};
pub use pipeline::{
    classify_matches, generate_bulk_files, load_bulk_files, propagate_incremental, run_job,
    streak_series, streak_table, JobReport,
};
pub use propagate::{propagate, propagate_row, DerivedFacts, DerivedSink};
pub use report::{format_report, write_report};
pub use runner::run_units;
pub use streak::{
    reduce, BurnInCounting, Bucket, Observation, StreakBuckets, StreakEmitter, StreakSettings,
    StreakStat, StreakTracker,
};
