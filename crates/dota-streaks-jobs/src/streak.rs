//! Win/loss streak statistics.
//!
//! Each player row is scanned as a history of games, most recent first. A signed
//! streak counter is kept while walking the history: positive while the player keeps
//! winning, negative while they keep losing. Once a player is past the burn-in, every
//! qualifying game is observed together with the streak value it was played on.
//!
//! Observations go to a `StreakEmitter`: either unit-local `StreakBuckets`, later
//! summed across units by `reduce`, or a writer that stores the streak value on the
//! player row itself (`match_derived_data:streak_all`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use dota_streaks_core::{CellValue, CoreError, Timestamp};
use dota_streaks_store::schema::columns;
use dota_streaks_store::{BufferedWriter, DataRequest, RowData, RowKey, Store, ALL_VERSIONS};

use crate::counters::{Counter, Counters};
use crate::error::{JobError, Result};

/// Lowest match quality that counts towards streaks.
pub const QUALIFYING_QUALITY: f64 = 2.0;

/// Default number of games skipped at the start of a history.
pub const DEFAULT_BURN_IN: u32 = 12;

/// Which games count towards the burn-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurnInCounting {
    /// Every game in the history counts, qualifying or not.
    #[default]
    AllMatches,
    /// Only qualifying games count.
    QualifyingMatches,
}

impl BurnInCounting {
    /// Configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllMatches => "all_matches",
            Self::QualifyingMatches => "qualifying_matches",
        }
    }
}

impl fmt::Display for BurnInCounting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BurnInCounting {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "all_matches" => Ok(Self::AllMatches),
            "qualifying_matches" => Ok(Self::QualifyingMatches),
            other => Err(format!("unknown burn-in counting mode: {other}")),
        }
    }
}

/// Streak tracking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakSettings {
    /// Games skipped before observations start.
    pub burn_in: u32,
    /// Which games count towards `burn_in`.
    pub counting: BurnInCounting,
}

impl Default for StreakSettings {
    fn default() -> Self {
        Self {
            burn_in: DEFAULT_BURN_IN,
            counting: BurnInCounting::default(),
        }
    }
}

/// One game of a player's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    /// When the match was played.
    pub timestamp: Timestamp,
    /// Whether the player won, or `None` if the game does not qualify.
    pub won: Option<bool>,
}

/// A qualifying game past burn-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// When the match was played.
    pub timestamp: Timestamp,
    /// Streak value before this game.
    pub streak: i32,
    /// Whether the player won.
    pub won: bool,
}

/// Streak value after a game played on `score`.
#[must_use]
pub const fn next_score(score: i32, won: bool) -> i32 {
    match (won, score) {
        (true, s) if s > 0 => s.saturating_add(1),
        (true, _) => 1,
        (false, s) if s < 0 => s.saturating_sub(1),
        (false, _) => -1,
    }
}

/// The per-player streak state machine.
#[derive(Debug, Clone)]
pub struct StreakTracker {
    settings: StreakSettings,
    score: i32,
    games: u32,
}

impl StreakTracker {
    /// Start a fresh history.
    #[must_use]
    pub const fn new(settings: StreakSettings) -> Self {
        Self {
            settings,
            score: 0,
            games: 0,
        }
    }

    /// Current streak value.
    #[must_use]
    pub const fn score(&self) -> i32 {
        self.score
    }

    /// Games counted towards burn-in so far.
    #[must_use]
    pub const fn games(&self) -> u32 {
        self.games
    }

    /// Visit the next game, returning an observation if it qualifies and burn-in is over.
    pub fn visit(&mut self, entry: &HistoryEntry) -> Option<Observation> {
        if self.settings.counting == BurnInCounting::AllMatches {
            self.games = self.games.saturating_add(1);
        }
        let won = entry.won?;
        if self.settings.counting == BurnInCounting::QualifyingMatches {
            self.games = self.games.saturating_add(1);
        }

        let observation = (self.games > self.settings.burn_in).then_some(Observation {
            timestamp: entry.timestamp,
            streak: self.score,
            won,
        });
        self.score = next_score(self.score, won);
        observation
    }
}

/// Columns read for each player row.
#[must_use]
pub fn history_request() -> DataRequest {
    DataRequest::builder()
        .max_versions(ALL_VERSIONS)
        .add(&columns::player())
        .add(&columns::radiant_win())
        .add(&columns::player_real_match())
        .build()
}

/// Extract a player's game history, most recent first.
///
/// # Errors
///
/// Returns `JobError::MalformedRow` if a qualifying game lacks its participant
/// record or result, or if any cell has an unexpected type.
pub fn player_history(row: &RowData) -> Result<Vec<HistoryEntry>> {
    let player = columns::player();
    let radiant_win = columns::radiant_win();
    let real_match = columns::player_real_match();
    let malformed = |e: CoreError| JobError::malformed(row.row_key(), e);

    row.timestamps(&player)
        .map(|timestamp| {
            let quality = row
                .value_at(&real_match, timestamp)
                .map(|v| v.require_double(&real_match))
                .transpose()
                .map_err(malformed)?;
            if !quality.is_some_and(|q| q >= QUALIFYING_QUALITY) {
                return Ok(HistoryEntry {
                    timestamp,
                    won: None,
                });
            }

            let participant = row
                .value_at(&player, timestamp)
                .ok_or_else(|| JobError::missing(row.row_key(), &player))?
                .require_participant(&player)
                .map_err(malformed)?;
            let radiant_won = row
                .value_at(&radiant_win, timestamp)
                .ok_or_else(|| {
                    JobError::malformed(
                        row.row_key(),
                        format_args!("missing {radiant_win} at {timestamp}"),
                    )
                })?
                .require_bool(&radiant_win)
                .map_err(malformed)?;
            Ok(HistoryEntry {
                timestamp,
                won: Some(radiant_won == participant.is_radiant()),
            })
        })
        .collect()
}

/// Receives streak observations.
pub trait StreakEmitter {
    /// Record one observation for a player row.
    ///
    /// # Errors
    ///
    /// Returns an error if the observation cannot be stored.
    fn emit(&mut self, row: &RowKey, observation: &Observation) -> Result<()>;
}

/// Games observed and won on one streak value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Games observed.
    pub games: u64,
    /// Games won.
    pub wins: u64,
}

impl Bucket {
    /// Count one game.
    pub fn record(&mut self, won: bool) {
        self.games += 1;
        if won {
            self.wins += 1;
        }
    }

    /// Add another bucket's counts.
    pub fn merge(&mut self, other: Bucket) {
        self.games += other.games;
        self.wins += other.wins;
    }
}

/// Unit-local streak buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreakBuckets(BTreeMap<i32, Bucket>);

impl StreakBuckets {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one game played on `streak`.
    pub fn observe(&mut self, streak: i32, won: bool) {
        self.0.entry(streak).or_default().record(won);
    }

    /// The bucket of a streak value.
    #[must_use]
    pub fn get(&self, streak: i32) -> Option<Bucket> {
        self.0.get(&streak).copied()
    }

    /// Emit the partial buckets, ascending by streak value.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(i32, Bucket)> {
        self.0.into_iter().collect()
    }
}

impl StreakEmitter for StreakBuckets {
    fn emit(&mut self, _row: &RowKey, observation: &Observation) -> Result<()> {
        self.observe(observation.streak, observation.won);
        Ok(())
    }
}

impl<S: Store + ?Sized> StreakEmitter for BufferedWriter<'_, S> {
    fn emit(&mut self, row: &RowKey, observation: &Observation) -> Result<()> {
        self.put(
            row,
            &columns::streak_all(),
            observation.timestamp,
            CellValue::Double(f64::from(observation.streak)),
        )?;
        Ok(())
    }
}

/// Win rate on one streak value, across all players.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreakStat {
    /// Streak value before the game.
    pub streak: i32,
    /// `wins / games`.
    pub mean: f64,
    /// Games observed.
    pub games: u64,
    /// Games won.
    pub wins: u64,
}

/// Sum partial buckets per streak value and compute win rates.
///
/// Streak values without any game are dropped. Output is ascending by streak value.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn reduce<I>(partials: I) -> Vec<StreakStat>
where
    I: IntoIterator<Item = (i32, Bucket)>,
{
    let mut totals: BTreeMap<i32, Bucket> = BTreeMap::new();
    for (streak, bucket) in partials {
        totals.entry(streak).or_default().merge(bucket);
    }
    totals
        .into_iter()
        .filter(|(_, bucket)| bucket.games > 0)
        .map(|(streak, bucket)| StreakStat {
            streak,
            mean: bucket.wins as f64 / bucket.games as f64,
            games: bucket.games,
            wins: bucket.wins,
        })
        .collect()
}

/// Run the state machine over one player row.
///
/// The history is validated before anything is emitted, so a malformed row emits nothing.
///
/// # Errors
///
/// Returns `JobError::MalformedRow` for malformed rows, or the emitter's error.
pub fn process_player<E: StreakEmitter + ?Sized>(
    row: &RowData,
    settings: StreakSettings,
    emitter: &mut E,
    counters: &mut Counters,
) -> Result<()> {
    let history = player_history(row)?;
    let mut tracker = StreakTracker::new(settings);
    for entry in &history {
        if let Some(observation) = tracker.visit(entry) {
            emitter.emit(row.row_key(), &observation)?;
            counters.increment(Counter::StreakObservations);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dota_streaks_core::{AccountId, Participant};
    use dota_streaks_store::Cell;

    fn settings(burn_in: u32) -> StreakSettings {
        StreakSettings {
            burn_in,
            counting: BurnInCounting::AllMatches,
        }
    }

    fn qualifying(outcomes: &[bool]) -> Vec<HistoryEntry> {
        outcomes
            .iter()
            .enumerate()
            .map(|(i, &won)| HistoryEntry {
                timestamp: Timestamp::from_millis(1_000 - i as u64),
                won: Some(won),
            })
            .collect()
    }

    #[test]
    fn pre_and_post_update_scores() {
        let mut tracker = StreakTracker::new(settings(0));
        let mut pre = Vec::new();
        let mut post = Vec::new();
        for entry in qualifying(&[true, true, false, true]) {
            let observation = tracker.visit(&entry).unwrap();
            pre.push(observation.streak);
            post.push(tracker.score());
        }
        assert_eq!(pre, vec![0, 1, 2, -1]);
        assert_eq!(post, vec![1, 2, -1, 1]);
    }

    #[test]
    fn sign_never_resets_through_zero() {
        assert_eq!(next_score(3, false), -1);
        assert_eq!(next_score(-4, true), 1);
        assert_eq!(next_score(0, true), 1);
        assert_eq!(next_score(0, false), -1);
        assert_eq!(next_score(-2, false), -3);
    }

    #[test]
    fn burn_in_skips_first_games() {
        let mut tracker = StreakTracker::new(settings(2));
        let observed: Vec<bool> = qualifying(&[true, false, true, true])
            .iter()
            .map(|e| tracker.visit(e).is_some())
            .collect();
        assert_eq!(observed, vec![false, false, true, true]);
    }

    #[test]
    fn non_qualifying_games_only_count_in_all_matches_mode() {
        let history = [
            HistoryEntry {
                timestamp: Timestamp::from_millis(3),
                won: None,
            },
            HistoryEntry {
                timestamp: Timestamp::from_millis(2),
                won: Some(true),
            },
        ];

        let mut all = StreakTracker::new(settings(1));
        let observed: Vec<_> = history.iter().filter_map(|e| all.visit(e)).collect();
        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0].streak, 0);

        let mut qualifying_only = StreakTracker::new(StreakSettings {
            burn_in: 1,
            counting: BurnInCounting::QualifyingMatches,
        });
        assert!(history
            .iter()
            .all(|e| qualifying_only.visit(e).is_none()));
        assert_eq!(qualifying_only.games(), 1);
    }

    #[test]
    fn reduce_sums_partials() {
        let stats = reduce(vec![
            (1, Bucket { games: 3, wins: 2 }),
            (1, Bucket { games: 5, wins: 1 }),
            (-2, Bucket { games: 0, wins: 0 }),
        ]);
        assert_eq!(
            stats,
            vec![StreakStat {
                streak: 1,
                mean: 0.375,
                games: 8,
                wins: 3,
            }]
        );
    }

    #[test]
    fn buckets_emit_sorted_pairs() {
        let mut buckets = StreakBuckets::new();
        buckets.observe(2, true);
        buckets.observe(-1, false);
        buckets.observe(2, false);
        assert_eq!(
            buckets.into_pairs(),
            vec![
                (-1, Bucket { games: 1, wins: 0 }),
                (2, Bucket { games: 2, wins: 1 }),
            ]
        );
    }

    fn player_row(games: &[(u64, u8, bool, Option<f64>)]) -> RowData {
        let mut row = RowData::new(RowKey::from_bytes(vec![0; 8]));
        let mut sorted = games.to_vec();
        sorted.sort_by(|a, b| b.0.cmp(&a.0));
        for (ts, slot, radiant_win, quality) in sorted {
            let timestamp = Timestamp::from_millis(ts);
            row.push_version(
                columns::player(),
                Cell {
                    timestamp,
                    value: CellValue::Participant(Participant::new(AccountId::new(5), slot, 0)),
                },
            );
            row.push_version(
                columns::radiant_win(),
                Cell {
                    timestamp,
                    value: CellValue::Bool(radiant_win),
                },
            );
            if let Some(q) = quality {
                row.push_version(
                    columns::player_real_match(),
                    Cell {
                        timestamp,
                        value: CellValue::Double(q),
                    },
                );
            }
        }
        row
    }

    #[test]
    fn history_is_most_recent_first() {
        let row = player_row(&[
            (10, 0, true, Some(3.0)),
            (30, 130, true, Some(2.0)),
            (20, 1, false, Some(1.0)),
            (40, 2, true, None),
        ]);
        let history = player_history(&row).unwrap();
        let stamps: Vec<u64> = history.iter().map(|e| e.timestamp.as_millis()).collect();
        assert_eq!(stamps, vec![40, 30, 20, 10]);
        let outcomes: Vec<Option<bool>> = history.iter().map(|e| e.won).collect();
        assert_eq!(outcomes, vec![None, Some(false), None, Some(true)]);
    }

    #[test]
    fn malformed_rows_emit_nothing() {
        let mut row = player_row(&[(10, 0, true, Some(3.0))]);
        row.push_version(
            columns::player(),
            Cell {
                timestamp: Timestamp::from_millis(5),
                value: CellValue::Participant(Participant::new(AccountId::new(5), 0, 0)),
            },
        );
        row.push_version(
            columns::player_real_match(),
            Cell {
                timestamp: Timestamp::from_millis(5),
                value: CellValue::Double(3.0),
            },
        );

        let mut buckets = StreakBuckets::new();
        let mut counters = Counters::new();
        let err = process_player(&row, settings(0), &mut buckets, &mut counters).unwrap_err();
        assert!(err.is_row_level());
        assert_eq!(buckets, StreakBuckets::new());
        assert_eq!(counters.get(Counter::StreakObservations), 0);
    }

    #[test]
    fn wrongly_typed_quality_is_malformed() {
        let mut row = player_row(&[(10, 0, true, Some(3.0))]);
        row.push_version(
            columns::player(),
            Cell {
                timestamp: Timestamp::from_millis(20),
                value: CellValue::Participant(Participant::new(AccountId::new(5), 0, 0)),
            },
        );
        row.push_version(
            columns::player_real_match(),
            Cell {
                timestamp: Timestamp::from_millis(20),
                value: CellValue::Int(3),
            },
        );

        let mut buckets = StreakBuckets::new();
        let mut counters = Counters::new();
        let err = process_player(&row, settings(0), &mut buckets, &mut counters).unwrap_err();
        assert!(err.is_row_level());
        assert_eq!(buckets, StreakBuckets::new());
    }

    #[test]
    fn burn_in_counting_parses() {
        assert_eq!(
            "qualifying_matches".parse::<BurnInCounting>().unwrap(),
            BurnInCounting::QualifyingMatches
        );
        assert!("sometimes".parse::<BurnInCounting>().is_err());
    }
}
