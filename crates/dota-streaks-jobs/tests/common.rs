//! Common test utilities for dota-streaks job integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use tempfile::TempDir;

use dota_streaks_core::{
    AccountId, CellValue, ColumnName, MatchId, Participant, Timestamp, ANONYMOUS_ACCOUNT_ID,
};
use dota_streaks_jobs::JobConfig;
use dota_streaks_store::schema::{self, columns, tables};
use dota_streaks_store::{
    Cell, DataRequest, EntityIdFactory, Mutation, RocksStore, RowKey, Store, ALL_VERSIONS,
};

/// Shorthand for the anonymous account.
pub const ANON: u32 = ANONYMOUS_ACCOUNT_ID;

/// A match as ingestion would have written it.
#[derive(Debug, Clone)]
pub struct TestMatch {
    pub match_id: u64,
    pub played_at: u64,
    pub game_mode: i64,
    pub lobby_type: i64,
    pub human_players: i64,
    pub radiant_win: bool,
    pub players: Vec<Participant>,
}

impl TestMatch {
    /// A ranked All Pick match where everybody stayed.
    ///
    /// The first five accounts play radiant, the last five dire.
    pub fn serious(match_id: u64, played_at: u64, accounts: [u32; 10], radiant_win: bool) -> Self {
        let players = accounts
            .iter()
            .enumerate()
            .map(|(i, &account)| {
                let slot = if i < 5 { i as u8 } else { 128 + (i as u8 - 5) };
                Participant::new(AccountId::new(account), slot, 0)
            })
            .collect();
        Self {
            match_id,
            played_at,
            game_mode: 1,
            lobby_type: 7,
            human_players: 10,
            radiant_win,
            players,
        }
    }

    /// Set the leaver status of one participant.
    pub fn with_leaver(mut self, index: usize, status: i64) -> Self {
        self.players[index].leaver_status = status;
        self
    }
}

/// Test harness containing a fresh store with the standard tables.
pub struct TestHarness {
    /// The store under test.
    pub store: Arc<RocksStore>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// Job configuration pointing into the temporary directory.
    pub config: JobConfig,
    /// Row keys of the `matches` table.
    pub match_ids: EntityIdFactory,
    /// Row keys of the `players` table.
    pub player_ids: EntityIdFactory,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("db");
        let store = RocksStore::open(&db_path).expect("Failed to open store");
        for layout in schema::standard_layouts() {
            store.create_table(&layout).expect("Failed to create table");
        }

        let config = JobConfig {
            data_dir: db_path.to_string_lossy().to_string(),
            bulk_output_dir: temp_dir.path().join("bulk").to_string_lossy().to_string(),
            units: 3,
            flush_threshold: 7,
            burn_in: 0,
            ..JobConfig::default()
        };

        Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
            config,
            match_ids: EntityIdFactory::from_layout(&schema::matches_layout()),
            player_ids: EntityIdFactory::from_layout(&schema::players_layout()),
        }
    }

    /// Write a match row and the participants' player rows.
    pub fn insert_match(&self, game: &TestMatch) {
        let ts = Timestamp::from_millis(game.played_at);
        let row = self.match_row(game.match_id);
        let cells = [
            (columns::game_mode(), CellValue::Int(game.game_mode)),
            (columns::lobby_type(), CellValue::Int(game.lobby_type)),
            (columns::human_players(), CellValue::Int(game.human_players)),
            (
                columns::player_data(),
                CellValue::Participants(game.players.clone()),
            ),
            (columns::radiant_win(), CellValue::Bool(game.radiant_win)),
        ];
        let mutations: Vec<Mutation> = cells
            .into_iter()
            .map(|(column, value)| Mutation {
                row_key: row.clone(),
                column,
                timestamp: ts,
                value,
            })
            .collect();
        self.store.write(tables::MATCHES, &mutations).unwrap();

        for player in &game.players {
            let Some(row) = self.player_ids.player_row_key(player.account_id).unwrap() else {
                continue;
            };
            self.store
                .put(
                    tables::PLAYERS,
                    &row,
                    &columns::player(),
                    ts,
                    CellValue::Participant(player.clone()),
                )
                .unwrap();
            self.store
                .put(
                    tables::PLAYERS,
                    &row,
                    &columns::radiant_win(),
                    ts,
                    CellValue::Bool(game.radiant_win),
                )
                .unwrap();
        }
    }

    /// Row key of a match.
    pub fn match_row(&self, match_id: u64) -> RowKey {
        self.match_ids.match_row_key(MatchId::new(match_id)).unwrap()
    }

    /// Row key of a non-anonymous player.
    pub fn player_row(&self, account: u32) -> RowKey {
        self.player_ids
            .player_row_key(AccountId::new(account))
            .unwrap()
            .unwrap()
    }

    /// Every version of a column of a row.
    pub fn cells(&self, table: &str, row: &RowKey, column: &ColumnName) -> Vec<Cell> {
        let request = DataRequest::builder()
            .max_versions(ALL_VERSIONS)
            .add(column)
            .build();
        self.store
            .get_row(table, row, &request)
            .unwrap()
            .map(|data| data.cells(column).to_vec())
            .unwrap_or_default()
    }

    /// Every version of a column of a player row.
    pub fn player_cells(&self, account: u32, column: &ColumnName) -> Vec<Cell> {
        self.cells(tables::PLAYERS, &self.player_row(account), column)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
