//! Versioned cell types.
//!
//! A row in the store holds named columns (`family:qualifier`), each an ordered history
//! of `(Timestamp, CellValue)` versions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::dota::Participant;
use crate::error::{CoreError, Result};

/// Version timestamp of a cell, in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from epoch milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Return the epoch milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Convert to a UTC date-time, if representable.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let millis = i64::try_from(self.0).ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(at) => write!(f, "{}", at.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// The declared type of a column's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Double,
    /// Boolean.
    Bool,
    /// One match participant.
    Participant,
    /// Ordered list of match participants.
    Participants,
}

impl ValueKind {
    /// Get the kind name as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::Participant => "participant",
            Self::Participants => "participants",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum CellValue {
    /// Integer value (enum codes, counts).
    Int(i64),
    /// Floating point value (derived scores).
    Double(f64),
    /// Boolean value (match result).
    Bool(bool),
    /// One participant record.
    Participant(Participant),
    /// All participant records of a match.
    Participants(Vec<Participant>),
}

impl CellValue {
    /// The kind of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Double(_) => ValueKind::Double,
            Self::Bool(_) => ValueKind::Bool,
            Self::Participant(_) => ValueKind::Participant,
            Self::Participants(_) => ValueKind::Participants,
        }
    }

    fn mismatch(&self, column: &ColumnName, expected: ValueKind) -> CoreError {
        CoreError::TypeMismatch {
            column: column.to_string(),
            expected,
            found: self.kind(),
        }
    }

    /// Read an integer, rejecting any other type.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::TypeMismatch` if the value is not an `Int`.
    pub fn require_int(&self, column: &ColumnName) -> Result<i64> {
        match self {
            Self::Int(v) => Ok(*v),
            other => Err(other.mismatch(column, ValueKind::Int)),
        }
    }

    /// Read a double, rejecting any other type.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::TypeMismatch` if the value is not a `Double`.
    pub fn require_double(&self, column: &ColumnName) -> Result<f64> {
        match self {
            Self::Double(v) => Ok(*v),
            other => Err(other.mismatch(column, ValueKind::Double)),
        }
    }

    /// Read a boolean, rejecting any other type.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::TypeMismatch` if the value is not a `Bool`.
    pub fn require_bool(&self, column: &ColumnName) -> Result<bool> {
        match self {
            Self::Bool(v) => Ok(*v),
            other => Err(other.mismatch(column, ValueKind::Bool)),
        }
    }

    /// Read a participant record, rejecting any other type.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::TypeMismatch` if the value is not a `Participant`.
    pub fn require_participant(&self, column: &ColumnName) -> Result<&Participant> {
        match self {
            Self::Participant(p) => Ok(p),
            other => Err(other.mismatch(column, ValueKind::Participant)),
        }
    }

    /// Read a participant list, rejecting any other type.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::TypeMismatch` if the value is not `Participants`.
    pub fn require_participants(&self, column: &ColumnName) -> Result<&[Participant]> {
        match self {
            Self::Participants(p) => Ok(p),
            other => Err(other.mismatch(column, ValueKind::Participants)),
        }
    }
}

/// A logical column address: `family:qualifier`.
///
/// Names are restricted to ASCII letters, digits, `_`, `-` and `.` so they can be
/// embedded in physical keys without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnName {
    family: String,
    qualifier: String,
}

impl ColumnName {
    /// Create a column name, validating both parts.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidColumnName` if either part is empty or contains
    /// characters outside `[A-Za-z0-9_.-]`.
    pub fn new(family: impl Into<String>, qualifier: impl Into<String>) -> Result<Self> {
        let family = family.into();
        let qualifier = qualifier.into();
        validate_name(&family)?;
        validate_name(&qualifier)?;
        Ok(Self { family, qualifier })
    }

    /// Create a column name from constant parts known to be valid.
    ///
    /// Intended for the fixed column names of the standard layouts; validity is only
    /// checked in debug builds.
    #[must_use]
    pub fn from_static(family: &'static str, qualifier: &'static str) -> Self {
        debug_assert!(validate_name(family).is_ok() && validate_name(qualifier).is_ok());
        Self {
            family: family.to_string(),
            qualifier: qualifier.to_string(),
        }
    }

    /// The column family.
    #[must_use]
    pub fn family(&self) -> &str {
        &self.family
    }

    /// The qualifier within the family.
    #[must_use]
    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }
}

/// Check that a family or qualifier name is usable in a physical key.
///
/// # Errors
///
/// Returns `CoreError::InvalidColumnName` for empty names or forbidden characters.
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'));
    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidColumnName(name.to_string()))
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family, self.qualifier)
    }
}

impl FromStr for ColumnName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let (family, qualifier) = s
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidColumnName(s.to_string()))?;
        Self::new(family, qualifier)
    }
}
