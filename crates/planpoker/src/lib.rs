//! # planpoker
//!
//! Planning-poker rooms with live updates over WebSocket.
//!
//! Players create or join a room, vote with hidden cards, and the room's
//! creator reveals and resets rounds. Every change is pushed to all
//! connections bound to the room as a [`RoomEvent`](planpoker_protocol::RoomEvent).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use planpoker::prelude::*;
//!
//! # async fn start() -> Result<(), PlanPokerError> {
//! let server = PlanPokerServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! let sweeper = spawn_sweeper(Arc::clone(server.service().registry()), SweepConfig::default());
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! sweeper.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::PlanPokerError;
pub use server::{PlanPokerServer, PlanPokerServerBuilder};

pub mod prelude {
    pub use crate::{PlanPokerError, PlanPokerServer, PlanPokerServerBuilder};
    pub use planpoker_protocol::{
        Card, ClientMessage, Codec, ErrorKind, JsonCodec, PlayerId, PlayerSnapshot, RoomEvent,
        RoomId, RoomSnapshot, RoomStatus, ServerMessage, VoteSession, VoteSummary,
    };
    pub use planpoker_room::{PokerService, RoomConfig, RoomError, RoomRegistry};
    pub use planpoker_sweep::{SweepConfig, SweeperHandle, spawn_sweeper};
    pub use planpoker_transport::TransportError;
}
