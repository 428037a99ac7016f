//! Identity newtypes, cards, and round status.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Generates a random 32-character hex token (128 bits).
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Opaque identifier for a player, assigned when they join a room.
///
/// Serialized as the bare token string so it can key a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Allocates a fresh random id.
    pub fn generate() -> Self {
        Self(generate_token())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier for a room.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Allocates a fresh random id.
    pub fn generate() -> Self {
        Self(generate_token())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Card
// ---------------------------------------------------------------------------

/// A planning-poker card.
///
/// `Unknown` is the hidden default every player holds until they vote,
/// and the value every hidden snapshot reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Card {
    #[serde(rename = "0")]
    Zero,
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "13")]
    Thirteen,
    #[serde(rename = "20")]
    Twenty,
    #[serde(rename = "40")]
    Forty,
    #[serde(rename = "100")]
    Hundred,
    #[serde(rename = "?")]
    Question,
    #[serde(rename = "coffee")]
    Coffee,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

/// Error returned when a string isn't one of the fixed card values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid card value: {0:?}")]
pub struct ParseCardError(pub String);

impl Card {
    /// Every card a player may vote with, in deck order.
    pub const DECK: [Card; 12] = [
        Card::Zero,
        Card::One,
        Card::Two,
        Card::Three,
        Card::Five,
        Card::Eight,
        Card::Thirteen,
        Card::Twenty,
        Card::Forty,
        Card::Hundred,
        Card::Question,
        Card::Coffee,
    ];

    /// The wire spelling of this card.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
            Self::Five => "5",
            Self::Eight => "8",
            Self::Thirteen => "13",
            Self::Twenty => "20",
            Self::Forty => "40",
            Self::Hundred => "100",
            Self::Question => "?",
            Self::Coffee => "coffee",
            Self::Unknown => "unknown",
        }
    }

    /// Numeric estimate, or `None` for `?`, `coffee` and `unknown`.
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Zero => Some(0.0),
            Self::One => Some(1.0),
            Self::Two => Some(2.0),
            Self::Three => Some(3.0),
            Self::Five => Some(5.0),
            Self::Eight => Some(8.0),
            Self::Thirteen => Some(13.0),
            Self::Twenty => Some(20.0),
            Self::Forty => Some(40.0),
            Self::Hundred => Some(100.0),
            Self::Question | Self::Coffee | Self::Unknown => None,
        }
    }

    /// Returns `true` for the hidden/not-yet-voted sentinel.
    pub fn is_unknown(self) -> bool {
        self == Self::Unknown
    }
}

impl FromStr for Card {
    type Err = ParseCardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::Unknown.as_str() {
            return Ok(Self::Unknown);
        }
        Self::DECK
            .iter()
            .copied()
            .find(|card| card.as_str() == s)
            .ok_or_else(|| ParseCardError(s.to_string()))
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// Where a room is in its voting round.
///
/// ```text
/// Voting ──(reveal)──→ Revealed ──(reset)──→ Voting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Cards are hidden; players may vote.
    #[default]
    Voting,
    /// Cards are face up until the next reset.
    Revealed,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Voting => write!(f, "voting"),
            Self::Revealed => write!(f, "revealed"),
        }
    }
}
