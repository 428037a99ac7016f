//! Unified error type for the planpoker server.

use planpoker_protocol::ProtocolError;
use planpoker_room::RoomError;
use planpoker_transport::TransportError;

/// Top-level error wrapping every layer's error.
///
/// The `#[from]` conversions let `?` lift sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum PlanPokerError {
    /// Binding, accepting, or talking to a connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room command was rejected.
    #[error(transparent)]
    Room(#[from] RoomError),
}
