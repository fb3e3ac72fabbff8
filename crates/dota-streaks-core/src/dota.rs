//! Match value types as reported by the game coordinator.
//!
//! Raw enum codes are kept in the stored records; these types interpret them.
//! Unknown codes are rejected rather than mapped to a catch-all variant.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::AccountId;

/// Bit of the player slot that marks the dire team.
///
/// Slots `0..=4` are radiant, slots `128..=132` are dire.
pub const RADIANT_SLOT_MASK: u8 = 0x80;

/// Defines a fieldless enum backed by an integer code, with `from_code`/`code`.
macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Decode a raw code.
            ///
            /// # Errors
            ///
            /// Returns `CoreError::UnknownCode` for codes outside the known range.
            pub fn from_code(code: i64) -> Result<Self> {
                match code {
                    $($code => Ok(Self::$variant),)+
                    _ => Err(CoreError::UnknownCode { field: $field, code }),
                }
            }

            /// The raw code of this value.
            #[must_use]
            pub const fn code(self) -> i64 {
                match self {
                    $(Self::$variant => $code,)+
                }
            }
        }
    };
}

code_enum! {
    /// Game mode of a match.
    GameMode, "game_mode" {
        /// No mode recorded.
        None = 0,
        /// All Pick.
        AllPick = 1,
        /// Captains Mode.
        CaptainsMode = 2,
        /// Random Draft.
        RandomDraft = 3,
        /// Single Draft.
        SingleDraft = 4,
        /// All Random.
        AllRandom = 5,
        /// Intro mode.
        Intro = 6,
        /// The Diretide event.
        Diretide = 7,
        /// Reverse Captains Mode.
        ReverseCaptainsMode = 8,
        /// The Greeviling event.
        Greeviling = 9,
        /// Tutorial.
        Tutorial = 10,
        /// Mid Only.
        MidOnly = 11,
        /// Least Played.
        LeastPlayed = 12,
        /// New Player Pool.
        NewPlayerPool = 13,
        /// Compendium matchmaking.
        Compendium = 14,
        /// Custom game.
        Custom = 15,
        /// Captains Draft.
        CaptainsDraft = 16,
    }
}

impl GameMode {
    /// Whether matches of this mode are competitive drafts.
    #[must_use]
    pub const fn is_serious(self) -> bool {
        matches!(
            self,
            Self::AllPick
                | Self::CaptainsMode
                | Self::RandomDraft
                | Self::SingleDraft
                | Self::AllRandom
                | Self::LeastPlayed
                | Self::Compendium
                | Self::CaptainsDraft
        )
    }
}

code_enum! {
    /// Lobby type of a match.
    LobbyType, "lobby_type" {
        /// Invalid lobby.
        Invalid = -1,
        /// Public (unranked) matchmaking.
        PublicMatchmaking = 0,
        /// Practice lobby.
        Practice = 1,
        /// Tournament lobby.
        Tournament = 2,
        /// Tutorial.
        Tutorial = 3,
        /// Co-op with bots.
        CoopWithBots = 4,
        /// Team match.
        TeamMatch = 5,
        /// Solo queue.
        SoloQueue = 6,
        /// Ranked matchmaking.
        Ranked = 7,
    }
}

impl LobbyType {
    /// Whether matches in this lobby are played against other people for real.
    #[must_use]
    pub const fn is_serious(self) -> bool {
        matches!(
            self,
            Self::PublicMatchmaking
                | Self::Tournament
                | Self::TeamMatch
                | Self::SoloQueue
                | Self::Ranked
        )
    }
}

code_enum! {
    /// Leaver status of one participant.
    LeaverStatus, "leaver_status" {
        /// Finished the match.
        Stayed = 0,
        /// Disconnected but was not marked as abandoning.
        Disconnected = 1,
        /// Disconnected for too long and abandoned.
        DisconnectedTooLong = 2,
        /// Abandoned the match.
        Abandoned = 3,
        /// Was idle for too long.
        Afk = 4,
        /// Never connected.
        NeverConnected = 5,
        /// Never connected within the allowed time.
        NeverConnectedTooLong = 6,
    }
}

/// Severity class of a leaver status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LeaverClass {
    /// Played the match to the end.
    Stayed,
    /// Left without penalty, typically a disconnect near the end of the match.
    SafeLeave,
    /// Any form of abandon.
    OtherLeave,
}

impl LeaverStatus {
    /// Classify this status by severity.
    #[must_use]
    pub const fn class(self) -> LeaverClass {
        match self {
            Self::Stayed => LeaverClass::Stayed,
            Self::Disconnected => LeaverClass::SafeLeave,
            _ => LeaverClass::OtherLeave,
        }
    }
}

/// One participant of a match, as stored in `player_data` and in player rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// The player's account, possibly the anonymous sentinel.
    pub account_id: AccountId,

    /// Team slot; bit 7 set means dire.
    pub player_slot: u8,

    /// Raw leaver status code.
    pub leaver_status: i64,
}

impl Participant {
    /// Create a participant record.
    #[must_use]
    pub const fn new(account_id: AccountId, player_slot: u8, leaver_status: i64) -> Self {
        Self {
            account_id,
            player_slot,
            leaver_status,
        }
    }

    /// Whether this participant played on the radiant side.
    #[must_use]
    pub const fn is_radiant(&self) -> bool {
        self.player_slot & RADIANT_SLOT_MASK == 0
    }

    /// Decode the leaver status.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::UnknownCode` if the stored code is not a known status.
    pub fn leaver(&self) -> Result<LeaverStatus> {
        LeaverStatus::from_code(self.leaver_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serious_game_modes() {
        assert!(GameMode::from_code(1).unwrap().is_serious());
        assert!(GameMode::from_code(14).unwrap().is_serious());
        assert!(GameMode::SingleDraft.is_serious());
        assert!(!GameMode::Tutorial.is_serious());
        assert!(!GameMode::Custom.is_serious());
        assert!(!GameMode::Diretide.is_serious());
    }

    #[test]
    fn serious_lobbies() {
        assert!(LobbyType::from_code(0).unwrap().is_serious());
        assert!(LobbyType::Ranked.is_serious());
        assert!(!LobbyType::Practice.is_serious());
        assert!(!LobbyType::CoopWithBots.is_serious());
        assert!(!LobbyType::Invalid.is_serious());
    }

    #[test]
    fn unknown_codes_are_errors() {
        assert_eq!(
            GameMode::from_code(99),
            Err(CoreError::UnknownCode {
                field: "game_mode",
                code: 99
            })
        );
        assert!(LobbyType::from_code(-2).is_err());
        assert!(LeaverStatus::from_code(7).is_err());
    }

    #[test]
    fn codes_roundtrip() {
        for code in -1..=7 {
            assert_eq!(LobbyType::from_code(code).unwrap().code(), code);
        }
    }

    #[test]
    fn leaver_classes() {
        assert_eq!(LeaverStatus::Stayed.class(), LeaverClass::Stayed);
        assert_eq!(LeaverStatus::Disconnected.class(), LeaverClass::SafeLeave);
        assert_eq!(LeaverStatus::Abandoned.class(), LeaverClass::OtherLeave);
        assert_eq!(LeaverStatus::Afk.class(), LeaverClass::OtherLeave);
    }

    #[test]
    fn radiant_slots() {
        let radiant = Participant::new(AccountId::new(1), 4, 0);
        let dire = Participant::new(AccountId::new(2), 132, 0);
        assert!(radiant.is_radiant());
        assert!(!dire.is_radiant());
    }
}
