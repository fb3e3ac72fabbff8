//! Match quality classification.
//!
//! A match is competitive when it was played in a serious game mode, in a serious
//! lobby, with ten human players. Competitive matches get a `real_match` score
//! depending on the worst leaver among the participants; other matches get nothing.

use dota_streaks_core::{
    CellValue, ColumnName, CoreError, GameMode, LeaverClass, LobbyType, Participant, Timestamp,
};
use dota_streaks_store::schema::columns;
use dota_streaks_store::{BufferedWriter, DataRequest, RowData, Store};

use crate::counters::{Counter, Counters};
use crate::error::{JobError, Result};

/// Number of human players in a full match.
pub const FULL_MATCH_PLAYERS: i64 = 10;

/// Quality of a competitive match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchQuality {
    /// At least one participant abandoned.
    Leavers,
    /// Some participants left safely, nobody abandoned.
    SafeLeavers,
    /// Everyone stayed.
    Clean,
}

impl MatchQuality {
    /// The stored `real_match` score.
    #[must_use]
    pub const fn score(self) -> f64 {
        match self {
            Self::Clean => 3.0,
            Self::SafeLeavers => 2.0,
            Self::Leavers => 1.0,
        }
    }

    const fn from_leaver_class(class: LeaverClass) -> Self {
        match class {
            LeaverClass::Stayed => Self::Clean,
            LeaverClass::SafeLeave => Self::SafeLeavers,
            LeaverClass::OtherLeave => Self::Leavers,
        }
    }
}

/// The parts of a match row the classifier looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSnapshot {
    /// Game mode.
    pub game_mode: GameMode,
    /// Lobby type.
    pub lobby_type: LobbyType,
    /// Human players reported for the match.
    pub human_players: i64,
    /// Worst leaver status among the participants.
    pub worst_leave: LeaverClass,
    /// Timestamp of the `player_data` cell.
    pub played_at: Timestamp,
}

impl MatchSnapshot {
    /// Columns read for each match row.
    #[must_use]
    pub fn request() -> DataRequest {
        DataRequest::builder()
            .add(&columns::game_mode())
            .add(&columns::lobby_type())
            .add(&columns::human_players())
            .add(&columns::player_data())
            .build()
    }

    /// Decode the most recent values of a match row.
    ///
    /// # Errors
    ///
    /// Returns `JobError::MalformedRow` if a column is missing, has the wrong type, or
    /// holds an unknown code.
    pub fn from_row(row: &RowData) -> Result<Self> {
        let malformed = |e: CoreError| JobError::malformed(row.row_key(), e);

        let game_mode =
            GameMode::from_code(required_int(row, &columns::game_mode())?).map_err(malformed)?;
        let lobby_type =
            LobbyType::from_code(required_int(row, &columns::lobby_type())?).map_err(malformed)?;
        let human_players = required_int(row, &columns::human_players())?;

        let player_data = columns::player_data();
        let cell = row
            .most_recent_cell(&player_data)
            .ok_or_else(|| JobError::missing(row.row_key(), &player_data))?;
        let participants = cell
            .value
            .require_participants(&player_data)
            .map_err(malformed)?;

        Ok(Self {
            game_mode,
            lobby_type,
            human_players,
            worst_leave: worst_leave(participants).map_err(malformed)?,
            played_at: cell.timestamp,
        })
    }
}

fn required_int(row: &RowData, column: &ColumnName) -> Result<i64> {
    row.most_recent_value(column)
        .ok_or_else(|| JobError::missing(row.row_key(), column))?
        .require_int(column)
        .map_err(|e| JobError::malformed(row.row_key(), e))
}

/// The most severe leaver class among `participants`.
///
/// # Errors
///
/// Returns `CoreError::UnknownCode` if a leaver status is not known.
pub fn worst_leave(participants: &[Participant]) -> std::result::Result<LeaverClass, CoreError> {
    participants.iter().try_fold(LeaverClass::Stayed, |worst, p| {
        Ok(worst.max(p.leaver()?.class()))
    })
}

/// Classify a match, counting why it was or wasn't competitive.
///
/// Returns `None` for matches that are not competitive.
pub fn classify(snapshot: &MatchSnapshot, counters: &mut Counters) -> Option<MatchQuality> {
    let mut competitive = true;
    if !snapshot.game_mode.is_serious() {
        counters.increment(Counter::BadGameMode);
        competitive = false;
    }
    if !snapshot.lobby_type.is_serious() {
        counters.increment(Counter::BadLobby);
        competitive = false;
    }
    if snapshot.human_players != FULL_MATCH_PLAYERS {
        counters.increment(Counter::UnderTenPlayers);
        competitive = false;
    }

    match snapshot.worst_leave {
        LeaverClass::OtherLeave => {
            counters.increment(Counter::Leavers);
            if competitive {
                counters.increment(Counter::RealMatchWithLeavers);
            }
        }
        LeaverClass::SafeLeave => {
            counters.increment(Counter::SafeLeavers);
            if competitive {
                counters.increment(Counter::RealMatchWithSafeLeavers);
            }
        }
        LeaverClass::Stayed => {}
    }

    if competitive {
        counters.increment(Counter::GoodMatches);
        Some(MatchQuality::from_leaver_class(snapshot.worst_leave))
    } else {
        counters.increment(Counter::BadMatches);
        None
    }
}

/// Classify one match row and write its `derived_data:real_match` score.
///
/// The score is stamped with the `player_data` timestamp, so reruns overwrite it.
///
/// # Errors
///
/// Returns `JobError::MalformedRow` for undecodable rows, or the writer's error.
pub fn classify_row<S: Store + ?Sized>(
    row: &RowData,
    writer: &mut BufferedWriter<'_, S>,
    counters: &mut Counters,
) -> Result<Option<MatchQuality>> {
    let snapshot = MatchSnapshot::from_row(row)?;
    let quality = classify(&snapshot, counters);
    if let Some(quality) = quality {
        writer.put(
            row.row_key(),
            &columns::real_match(),
            snapshot.played_at,
            CellValue::Double(quality.score()),
        )?;
        counters.increment(Counter::CellsWritten);
    }
    Ok(quality)
}
