//! The player record held inside a room.

use chrono::{DateTime, Utc};
use planpoker_protocol::{Card, PlayerId, PlayerSnapshot};

use crate::RoomError;

/// One participant in a room.
///
/// Only the room mutates these, always under its lock.
#[derive(Debug, Clone)]
pub(crate) struct Player {
    pub(crate) id: PlayerId,
    pub(crate) name: String,
    pub(crate) card: Card,
    pub(crate) is_creator: bool,
    pub(crate) joined_at: DateTime<Utc>,
    /// Join order within the room. Breaks `joined_at` ties when picking
    /// a new creator.
    pub(crate) seq: u64,
}

impl Player {
    pub(crate) fn new(name: String, is_creator: bool, seq: u64) -> Self {
        Self {
            id: PlayerId::generate(),
            name,
            card: Card::Unknown,
            is_creator,
            joined_at: Utc::now(),
            seq,
        }
    }

    /// Wire view. With `revealed == false` the card is masked.
    pub(crate) fn snapshot(&self, revealed: bool) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            card: if revealed { self.card } else { Card::Unknown },
            has_voted: !self.card.is_unknown(),
            is_creator: self.is_creator,
            joined_at: self.joined_at,
        }
    }

    /// Ordering key for creator promotion: earliest join first.
    pub(crate) fn seniority(&self) -> (DateTime<Utc>, u64) {
        (self.joined_at, self.seq)
    }
}

/// Trims and checks a display name.
pub(crate) fn validate_name(name: &str, max_len: usize) -> Result<String, RoomError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RoomError::InvalidName("name must not be empty".into()));
    }
    if name.chars().count() > max_len {
        return Err(RoomError::InvalidName(format!(
            "name must be at most {max_len} characters"
        )));
    }
    Ok(name.to_string())
}
