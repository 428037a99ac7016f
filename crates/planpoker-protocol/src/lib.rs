//! Wire protocol for planpoker.
//!
//! - **Types** ([`PlayerId`], [`RoomId`], [`Card`], [`RoomStatus`]): the
//!   vocabulary of a planning-poker session.
//! - **Snapshots** ([`RoomSnapshot`], [`PlayerSnapshot`], [`VoteSession`]):
//!   what clients are allowed to see of a room.
//! - **Events** ([`RoomEvent`]): what the per-room hub broadcasts.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): what travels
//!   over a live connection.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes in, bytes out.
//!
//! ```text
//! Transport (bytes) → Protocol (messages) → Room (state machine)
//! ```

mod codec;
mod error;
mod event;
mod message;
mod snapshot;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{ErrorKind, ProtocolError};
pub use event::RoomEvent;
pub use message::{ClientMessage, ServerMessage};
pub use snapshot::{PlayerSnapshot, RoomSnapshot, VoteSession, VoteSummary};
pub use types::{Card, ParseCardError, PlayerId, RoomId, RoomStatus};
