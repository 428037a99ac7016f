//! Error types for the room layer.

use planpoker_protocol::{ErrorKind, PlayerId, RoomId};

/// Errors that can occur during room operations.
///
/// All of them describe stale or bad caller input. Each operation
/// validates before it mutates, so an `Err` always means the room is
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (or was deleted concurrently).
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// The player is not a member of the room.
    #[error("player {0} not found in room")]
    PlayerNotFound(PlayerId),

    /// Another player in the room already uses this name.
    #[error("player name {0:?} is already taken in this room")]
    NameTaken(String),

    /// The player is missing or is not the room's creator.
    #[error("only the room creator can perform this action")]
    NotCreator(PlayerId),

    /// The card is not one of the deck values.
    #[error("invalid card value: {0:?}")]
    InvalidCard(String),

    /// The display name is blank or too long.
    #[error("invalid player name: {0}")]
    InvalidName(String),
}

impl RoomError {
    /// Classifies this error for the wire.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RoomNotFound(_) | Self::PlayerNotFound(_) => ErrorKind::NotFound,
            Self::NameTaken(_) => ErrorKind::Conflict,
            Self::NotCreator(_) => ErrorKind::Forbidden,
            Self::InvalidCard(_) | Self::InvalidName(_) => ErrorKind::InvalidInput,
        }
    }
}
