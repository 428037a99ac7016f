//! Error types for the protocol layer.

use serde::{Deserialize, Serialize};

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, unknown message type,
    /// or missing fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}

/// Coarse classification of a failed room command.
///
/// Every failure is an expected outcome of stale or malformed
/// caller input, so clients only need to know which bucket it fell in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The room or player does not exist.
    NotFound,
    /// A player with that name is already in the room.
    Conflict,
    /// Only the creator may do this.
    Forbidden,
    /// Malformed card value or missing/invalid field.
    InvalidInput,
}

impl ErrorKind {
    /// HTTP-style status code carried in [`ServerMessage::Error`](crate::ServerMessage::Error).
    pub fn code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Forbidden => 403,
            Self::InvalidInput => 400,
        }
    }
}
