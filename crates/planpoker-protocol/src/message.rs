//! Messages exchanged over a live connection.
//!
//! Both enums are internally tagged with a snake_case `type` field:
//! `{"type": "join_room", "roomId": "...", "name": "Bob"}`.

use serde::{Deserialize, Serialize};

use crate::{ErrorKind, PlayerId, RoomEvent, RoomId, RoomSnapshot};

/// Client → server commands.
///
/// Commands after `create_room`/`join_room`/`attach` act on the room and
/// player the connection is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Open a new room with the sender as creator.
    CreateRoom { name: String },
    /// Join an existing room under a new name.
    JoinRoom { room_id: RoomId, name: String },
    /// Bind this connection to a player that already joined.
    Attach { room_id: RoomId, player_id: PlayerId },
    /// Leave the bound room. The connection stays open.
    LeaveRoom,
    /// Request the current room snapshot.
    GetRoom,
    /// Vote. `card` is the wire spelling; unknown values are rejected.
    SubmitVote { card: String },
    RevealCards,
    ResetVoting,
    /// Set or clear (empty string) the round's link.
    UpdateLink { link: String },
    TransferCreator { target_id: PlayerId },
    /// Application-level ping; answered with `pong`.
    Ping { client_time: u64 },
}

impl ClientMessage {
    /// The wire tag, echoed back in `ack`.
    pub fn command(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create_room",
            Self::JoinRoom { .. } => "join_room",
            Self::Attach { .. } => "attach",
            Self::LeaveRoom => "leave_room",
            Self::GetRoom => "get_room",
            Self::SubmitVote { .. } => "submit_vote",
            Self::RevealCards => "reveal_cards",
            Self::ResetVoting => "reset_voting",
            Self::UpdateLink { .. } => "update_link",
            Self::TransferCreator { .. } => "transfer_creator",
            Self::Ping { .. } => "ping",
        }
    }
}

/// Server → client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Reply to `create_room`.
    RoomCreated { room_id: RoomId, player_id: PlayerId },
    /// Reply to `join_room` and `attach`.
    RoomJoined { room_id: RoomId, player_id: PlayerId },
    /// Reply to `get_room`.
    Room { room: RoomSnapshot },
    /// A command succeeded and has nothing else to return.
    Ack { command: String },
    /// A command failed. `code` follows HTTP conventions.
    Error {
        code: u16,
        kind: ErrorKind,
        message: String,
    },
    /// A live room event.
    Event { event: RoomEvent },
    /// Sent periodically while a connection is bound to a room.
    KeepAlive { server_time: u64 },
    /// Reply to `ping`.
    Pong { client_time: u64, server_time: u64 },
}

impl ServerMessage {
    /// Builds an `Error` reply from a failure classification.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            code: kind.code(),
            kind,
            message: message.into(),
        }
    }
}
