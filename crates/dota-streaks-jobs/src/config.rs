//! Job configuration.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use dota_streaks_store::schema::tables;
use dota_streaks_store::StoreOptions;

use crate::error::{JobError, Result};
use crate::streak::{BurnInCounting, StreakSettings, DEFAULT_BURN_IN};

/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_FILE_ENV: &str = "DOTA_STREAKS_CONFIG";

/// Read-ahead granted per row of `scanner_caching`.
const READAHEAD_BYTES_PER_ROW: usize = 16 * 1024;

/// Largest number of units a job can be split into.
pub const MAX_UNITS: usize = 256;

/// The job to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// Score match quality into `derived_data:real_match`.
    Classify,
    /// Copy derived match data into player rows with live writes.
    Propagate,
    /// Copy derived match data into player rows through bulk files.
    PropagateBulk,
    /// Ingest previously generated bulk files.
    LoadBulk,
    /// Compute the population streak table.
    StreakTable,
    /// Write each player's streak series to `match_derived_data:streak_all`.
    StreakSeries,
}

impl JobKind {
    /// Job name as configured and logged.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::Propagate => "propagate",
            Self::PropagateBulk => "propagate-bulk",
            Self::LoadBulk => "load-bulk",
            Self::StreakTable => "streak-table",
            Self::StreakSeries => "streak-series",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "classify" => Ok(Self::Classify),
            "propagate" => Ok(Self::Propagate),
            "propagate-bulk" => Ok(Self::PropagateBulk),
            "load-bulk" => Ok(Self::LoadBulk),
            "streak-table" => Ok(Self::StreakTable),
            "streak-series" => Ok(Self::StreakSeries),
            other => Err(format!("unknown job: {other}")),
        }
    }
}

/// Job configuration loaded from a JSON file and environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Path to `RocksDB` data directory (default: "/data/dota-streaks").
    pub data_dir: String,

    /// Job to run (default: `streak-table`).
    pub job: JobKind,

    /// Games skipped at the start of each player history (default: 12).
    pub burn_in: u32,

    /// Which games count towards the burn-in (default: `all_matches`).
    pub burn_in_counting: BurnInCounting,

    /// Pending writes that trigger a flush (default: 200).
    pub flush_threshold: usize,

    /// Rows to read ahead while scanning (default: 100). Tuning only.
    pub scanner_caching: usize,

    /// Number of parallel units (default: 4).
    pub units: usize,

    /// Directory for bulk files (default: "/data/dota-streaks/bulk").
    pub bulk_output_dir: String,

    /// Table that receives propagated data (default: "players").
    pub output_table: String,

    /// Optional path for the streak table report.
    pub report_path: Option<String>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            data_dir: "/data/dota-streaks".into(),
            job: JobKind::StreakTable,
            burn_in: DEFAULT_BURN_IN,
            burn_in_counting: BurnInCounting::AllMatches,
            flush_threshold: 200,
            scanner_caching: 100,
            units: 4,
            bulk_output_dir: "/data/dota-streaks/bulk".into(),
            output_table: tables::PLAYERS.into(),
            report_path: None,
        }
    }
}

impl JobConfig {
    /// Load configuration from the optional config file and environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration using `lookup` in place of the process environment.
    ///
    /// Values come from the defaults, then the JSON file named by `DOTA_STREAKS_CONFIG`,
    /// then individual variables. Unparseable values are ignored with a warning.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = match lookup(CONFIG_FILE_ENV) {
            Some(path) => match load_config_file(&path) {
                Ok(config) => {
                    tracing::info!(path = %path, "Loaded job configuration file");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Ignoring unreadable configuration file");
                    Self::default()
                }
            },
            None => Self::default(),
        };

        if let Some(data_dir) = lookup("DATA_DIR") {
            config.data_dir = data_dir;
        }
        if let Some(job) = parsed(&lookup, "JOB") {
            config.job = job;
        }
        if let Some(burn_in) = parsed(&lookup, "STREAK_BURN_IN") {
            config.burn_in = burn_in;
        }
        if let Some(counting) = parsed(&lookup, "STREAK_BURN_IN_COUNTING") {
            config.burn_in_counting = counting;
        }
        if let Some(threshold) = parsed(&lookup, "FLUSH_THRESHOLD") {
            config.flush_threshold = threshold;
        }
        if let Some(caching) = parsed(&lookup, "SCANNER_CACHING") {
            config.scanner_caching = caching;
        }
        if let Some(units) = parsed(&lookup, "UNITS") {
            config.units = units;
        }
        if let Some(dir) = lookup("BULK_OUTPUT_DIR") {
            config.bulk_output_dir = dir;
        }
        if let Some(table) = lookup("OUTPUT_TABLE") {
            config.output_table = table;
        }
        if let Some(path) = lookup("REPORT_PATH") {
            config.report_path = Some(path);
        }
        config
    }

    /// Check values that have no sensible fallback.
    ///
    /// # Errors
    ///
    /// Returns `JobError::Setup` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(JobError::Setup("flush_threshold must be at least 1".into()));
        }
        if !(1..=MAX_UNITS).contains(&self.units) {
            return Err(JobError::Setup(format!(
                "units must be between 1 and {MAX_UNITS}, got {}",
                self.units
            )));
        }
        if self.output_table.is_empty() {
            return Err(JobError::Setup("output_table must not be empty".into()));
        }
        Ok(())
    }

    /// Streak parameters.
    #[must_use]
    pub const fn streak_settings(&self) -> StreakSettings {
        StreakSettings {
            burn_in: self.burn_in,
            counting: self.burn_in_counting,
        }
    }

    /// Store tuning derived from the scanner hints.
    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            scan_readahead_bytes: self.scanner_caching.max(1).saturating_mul(READAHEAD_BYTES_PER_ROW),
        }
    }
}

/// Parse an optional variable, warning about values that don't parse.
fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring invalid configuration value");
            None
        }
    }
}

/// Load a configuration file.
fn load_config_file(path: &str) -> std::result::Result<JobConfig, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Configuration file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = JobConfig::from_lookup(lookup(&[]));
        assert_eq!(config, JobConfig::default());
        assert_eq!(config.burn_in, 12);
        assert_eq!(config.flush_threshold, 200);
        assert_eq!(config.output_table, "players");
        config.validate().unwrap();
    }

    #[test]
    fn env_overrides() {
        let config = JobConfig::from_lookup(lookup(&[
            ("JOB", "propagate-bulk"),
            ("STREAK_BURN_IN", "3"),
            ("STREAK_BURN_IN_COUNTING", "qualifying_matches"),
            ("UNITS", "16"),
            ("REPORT_PATH", "/tmp/streaks.tsv"),
        ]));
        assert_eq!(config.job, JobKind::PropagateBulk);
        assert_eq!(config.burn_in, 3);
        assert_eq!(config.burn_in_counting, BurnInCounting::QualifyingMatches);
        assert_eq!(config.units, 16);
        assert_eq!(config.report_path.as_deref(), Some("/tmp/streaks.tsv"));
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = JobConfig::from_lookup(lookup(&[
            ("FLUSH_THRESHOLD", "lots"),
            ("JOB", "dance"),
        ]));
        assert_eq!(config.flush_threshold, 200);
        assert_eq!(config.job, JobKind::StreakTable);
    }

    #[test]
    fn file_then_env() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("jobs.json");
        std::fs::write(&path, r#"{"burn_in": 5, "units": 8, "job": "classify"}"#).unwrap();
        let path = path.to_string_lossy().to_string();

        let config = JobConfig::from_lookup(lookup(&[
            (CONFIG_FILE_ENV, path.as_str()),
            ("UNITS", "2"),
        ]));
        assert_eq!(config.burn_in, 5);
        assert_eq!(config.job, JobKind::Classify);
        assert_eq!(config.units, 2);
        assert_eq!(config.flush_threshold, 200);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = JobConfig {
            flush_threshold: 0,
            ..JobConfig::default()
        };
        assert!(matches!(config.validate(), Err(JobError::Setup(_))));

        config.flush_threshold = 1;
        config.units = 0;
        assert!(config.validate().is_err());
        config.units = 257;
        assert!(config.validate().is_err());
        config.units = 256;
        config.validate().unwrap();
    }

    #[test]
    fn job_names_round_trip() {
        for job in [
            JobKind::Classify,
            JobKind::Propagate,
            JobKind::PropagateBulk,
            JobKind::LoadBulk,
            JobKind::StreakTable,
            JobKind::StreakSeries,
        ] {
            assert_eq!(job.as_str().parse::<JobKind>().unwrap(), job);
        }
    }
}
