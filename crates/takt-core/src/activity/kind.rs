//! Activity event kind enum.
//!
//! The four kinds cover the whole worker lifecycle on a work order. The
//! string representation is the lowercase verb used wherever events are
//! serialized or displayed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ErrorCode;

/// The four activity event kinds.
///
/// `Stop` is a pause, not an end: it parks the worker in a paused state
/// and must carry a break reason code. `Finish` closes the worker's run
/// on the order; a later `Start` opens a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    /// Begin working on an order.
    Start,
    /// Pause work; requires a break reason code.
    Stop,
    /// Resume paused work.
    Resume,
    /// Close out the worker's run on the order.
    Finish,
}

/// Error returned when parsing an unknown activity kind string.
///
/// Deserialization fails closed on unknown kinds: an event log entry with
/// an unrecognized verb rejects the read instead of guessing a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind {
    /// The unrecognised input string.
    pub raw: String,
}

impl UnknownKind {
    /// Machine-readable code associated with this parse failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::UnknownEventKind
    }
}

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown activity kind '{}': expected one of start, stop, resume, finish",
            self.raw
        )
    }
}

impl std::error::Error for UnknownKind {}

impl ActivityKind {
    /// All known kinds in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Start, Self::Stop, Self::Resume, Self::Finish];

    /// Return the canonical lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Resume => "resume",
            Self::Finish => "finish",
        }
    }

    /// True for the kinds that leave the worker actively running.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Start | Self::Resume)
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "resume" => Ok(Self::Resume),
            "finish" => Ok(Self::Finish),
            _ => Err(UnknownKind { raw: s.to_string() }),
        }
    }
}

// Custom serde: serialize as the lowercase verb string.
impl Serialize for ActivityKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
