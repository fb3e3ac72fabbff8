//! Database schema definitions and column families.
//!
//! This module defines the `RocksDB` column families used by the store and the two
//! standard table layouts (`matches` and `players`).

use dota_streaks_core::{ColumnName, ValueKind};

use crate::layout::{RowKeyFormat, TableLayout};

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Table layouts, keyed by table name. Every other column family is a table.
    pub const LAYOUTS: &str = "layouts";
}

/// Table names.
pub mod tables {
    /// One row per match, keyed by match id.
    pub const MATCHES: &str = "matches";

    /// One row per non-anonymous account, keyed by account id.
    pub const PLAYERS: &str = "players";
}

/// Logical family names.
pub mod families {
    /// Ingested match or player data.
    pub const DATA: &str = "data";

    /// Scalar columns derived from a match by classifiers (match rows).
    pub const DERIVED_DATA: &str = "derived_data";

    /// Derived match columns copied into player timelines (player rows).
    pub const MATCH_DERIVED_DATA: &str = "match_derived_data";
}

/// Column qualifiers.
pub mod qualifiers {
    /// Match game mode code.
    pub const GAME_MODE: &str = "game_mode";
    /// Match lobby type code.
    pub const LOBBY_TYPE: &str = "lobby_type";
    /// Number of human players in the match.
    pub const HUMAN_PLAYERS: &str = "human_players";
    /// All participants of the match.
    pub const PLAYER_DATA: &str = "player_data";
    /// Whether the radiant side won.
    pub const RADIANT_WIN: &str = "radiant_win";
    /// The player's own participant record for a match (player rows).
    pub const PLAYER: &str = "player";
    /// Match quality score written by the match classifier.
    pub const REAL_MATCH: &str = "real_match";
    /// Pre-game streak value written by the single-row streak producer.
    pub const STREAK_ALL: &str = "streak_all";
}

/// Frequently used columns.
pub mod columns {
    use super::{families, qualifiers, ColumnName};

    /// `data:game_mode`
    #[must_use]
    pub fn game_mode() -> ColumnName {
        ColumnName::from_static(families::DATA, qualifiers::GAME_MODE)
    }

    /// `data:lobby_type`
    #[must_use]
    pub fn lobby_type() -> ColumnName {
        ColumnName::from_static(families::DATA, qualifiers::LOBBY_TYPE)
    }

    /// `data:human_players`
    #[must_use]
    pub fn human_players() -> ColumnName {
        ColumnName::from_static(families::DATA, qualifiers::HUMAN_PLAYERS)
    }

    /// `data:player_data`
    #[must_use]
    pub fn player_data() -> ColumnName {
        ColumnName::from_static(families::DATA, qualifiers::PLAYER_DATA)
    }

    /// `data:radiant_win`
    #[must_use]
    pub fn radiant_win() -> ColumnName {
        ColumnName::from_static(families::DATA, qualifiers::RADIANT_WIN)
    }

    /// `data:player`
    #[must_use]
    pub fn player() -> ColumnName {
        ColumnName::from_static(families::DATA, qualifiers::PLAYER)
    }

    /// `derived_data:real_match`
    #[must_use]
    pub fn real_match() -> ColumnName {
        ColumnName::from_static(families::DERIVED_DATA, qualifiers::REAL_MATCH)
    }

    /// `match_derived_data:real_match`
    #[must_use]
    pub fn player_real_match() -> ColumnName {
        ColumnName::from_static(families::MATCH_DERIVED_DATA, qualifiers::REAL_MATCH)
    }

    /// `match_derived_data:streak_all`
    #[must_use]
    pub fn streak_all() -> ColumnName {
        ColumnName::from_static(families::MATCH_DERIVED_DATA, qualifiers::STREAK_ALL)
    }
}

/// Hash prefix length of the standard tables.
pub const HASH_PREFIX_LEN: usize = 4;

/// Layout of the `matches` table.
#[must_use]
pub fn matches_layout() -> TableLayout {
    TableLayout::new(
        tables::MATCHES,
        RowKeyFormat {
            hash_prefix_len: HASH_PREFIX_LEN,
            component_len: 8,
        },
    )
    .with_group(
        families::DATA,
        0,
        &[
            (qualifiers::GAME_MODE, ValueKind::Int),
            (qualifiers::LOBBY_TYPE, ValueKind::Int),
            (qualifiers::HUMAN_PLAYERS, ValueKind::Int),
            (qualifiers::PLAYER_DATA, ValueKind::Participants),
            (qualifiers::RADIANT_WIN, ValueKind::Bool),
        ],
    )
    .with_map(families::DERIVED_DATA, 1, ValueKind::Double)
}

/// Layout of the `players` table.
#[must_use]
pub fn players_layout() -> TableLayout {
    TableLayout::new(
        tables::PLAYERS,
        RowKeyFormat {
            hash_prefix_len: HASH_PREFIX_LEN,
            component_len: 4,
        },
    )
    .with_group(
        families::DATA,
        0,
        &[
            (qualifiers::PLAYER, ValueKind::Participant),
            (qualifiers::RADIANT_WIN, ValueKind::Bool),
        ],
    )
    .with_map(families::MATCH_DERIVED_DATA, 1, ValueKind::Double)
}

/// Returns the standard table layouts.
#[must_use]
pub fn standard_layouts() -> Vec<TableLayout> {
    vec![matches_layout(), players_layout()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_layouts_are_valid() {
        for layout in standard_layouts() {
            layout.validate().unwrap();
        }
    }

    #[test]
    fn derived_columns_are_doubles() {
        assert_eq!(
            matches_layout().value_kind(&columns::real_match()).unwrap(),
            ValueKind::Double
        );
        assert_eq!(
            players_layout().value_kind(&columns::streak_all()).unwrap(),
            ValueKind::Double
        );
    }
}
