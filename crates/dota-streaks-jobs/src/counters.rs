//! Per-unit job counters.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Named job counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    /// Rows returned by the scan.
    RowsScanned,
    /// Rows skipped because they could not be interpreted.
    MalformedRows,
    /// Matches whose game mode is not serious.
    BadGameMode,
    /// Matches whose lobby type is not serious.
    BadLobby,
    /// Matches with fewer than ten human players.
    UnderTenPlayers,
    /// Matches with at least one abandon.
    Leavers,
    /// Matches whose only leavers left safely.
    SafeLeavers,
    /// Competitive matches with at least one abandon.
    RealMatchWithLeavers,
    /// Competitive matches whose only leavers left safely.
    RealMatchWithSafeLeavers,
    /// Matches that received a quality score.
    GoodMatches,
    /// Matches that did not.
    BadMatches,
    /// Match rows with an empty `derived_data` family.
    RowsWithoutDerivedData,
    /// Participants not propagated to because they are anonymous.
    AnonymousParticipants,
    /// Cells emitted to a writer.
    CellsWritten,
    /// Streak observations past burn-in.
    StreakObservations,
    /// Bulk files written.
    BulkFilesWritten,
    /// Bulk files ingested.
    BulkFilesLoaded,
    /// Cells ingested from bulk files.
    CellsLoaded,
}

impl Counter {
    /// Counter name as logged.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RowsScanned => "rows_scanned",
            Self::MalformedRows => "malformed_rows",
            Self::BadGameMode => "bad_game_mode",
            Self::BadLobby => "bad_lobby",
            Self::UnderTenPlayers => "under_ten_players",
            Self::Leavers => "leavers",
            Self::SafeLeavers => "safe_leavers",
            Self::RealMatchWithLeavers => "real_match_with_leavers",
            Self::RealMatchWithSafeLeavers => "real_match_with_safe_leavers",
            Self::GoodMatches => "good_matches",
            Self::BadMatches => "bad_matches",
            Self::RowsWithoutDerivedData => "rows_without_derived_data",
            Self::AnonymousParticipants => "anonymous_participants",
            Self::CellsWritten => "cells_written",
            Self::StreakObservations => "streak_observations",
            Self::BulkFilesWritten => "bulk_files_written",
            Self::BulkFilesLoaded => "bulk_files_loaded",
            Self::CellsLoaded => "cells_loaded",
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of counters. Units keep their own and the job merges them at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counters(BTreeMap<Counter, u64>);

impl Counters {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one.
    pub fn increment(&mut self, counter: Counter) {
        self.add(counter, 1);
    }

    /// Add `n`.
    pub fn add(&mut self, counter: Counter, n: u64) {
        *self.0.entry(counter).or_default() += n;
    }

    /// Current value, zero if never touched.
    #[must_use]
    pub fn get(&self, counter: Counter) -> u64 {
        self.0.get(&counter).copied().unwrap_or(0)
    }

    /// Add every counter of `other`.
    pub fn merge(&mut self, other: &Self) {
        for (&counter, &n) in &other.0 {
            self.add(counter, n);
        }
    }

    /// Non-zero counters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (Counter, u64)> + '_ {
        self.0.iter().map(|(&c, &n)| (c, n))
    }

    /// Log every counter at `info`.
    pub fn log_summary(&self, job: &str) {
        for (counter, value) in self.iter() {
            tracing::info!(job, counter = counter.as_str(), value, "Job counter");
        }
    }
}
