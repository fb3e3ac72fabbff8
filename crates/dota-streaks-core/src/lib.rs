//! Core types and utilities for dota-streaks.
//!
//! This crate provides the foundational types shared by the store and the batch jobs:
//!
//! - **Identifiers**: `AccountId`, `MatchId`
//! - **Match values**: `GameMode`, `LobbyType`, `LeaverStatus`, `Participant`
//! - **Cells**: `CellValue`, `ValueKind`, `ColumnName`, `Timestamp`
//!
//! # Timestamps
//!
//! Every versioned cell is stamped with the time the originating match was played,
//! in milliseconds since the Unix epoch. Wall-clock write time is never used, so
//! replaying a match produces the same `(timestamp, value)` pair and overwrites the
//! earlier cell instead of adding a new version.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cell;
pub mod dota;
pub mod error;
pub mod ids;

pub use cell::{CellValue, ColumnName, Timestamp, ValueKind};
pub use dota::{GameMode, LeaverClass, LeaverStatus, LobbyType, Participant, RADIANT_SLOT_MASK};
pub use error::{CoreError, Result};
pub use ids::{AccountId, IdError, MatchId, ANONYMOUS_ACCOUNT_ID};
