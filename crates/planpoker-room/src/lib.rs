//! Room state and lifecycle for planpoker.
//!
//! Each room is an independent unit of mutual exclusion: its players,
//! round status, link, history and subscribers sit behind one lock, and
//! every state change is published to the room's [`EventHub`] before
//! the lock is released.
//!
//! # Key types
//!
//! - [`Room`]: the state machine (join, leave, vote, reveal, reset, …)
//! - [`EventHub`] / [`Subscription`]: non-blocking per-room fan-out
//! - [`RoomRegistry`]: creates, finds, deletes and sweeps rooms
//! - [`PokerService`]: the command surface adapters call
//! - [`RoomConfig`]: inbox capacity and name limits

mod config;
mod error;
mod hub;
mod player;
mod registry;
mod room;
mod service;

pub use config::RoomConfig;
pub use error::RoomError;
pub use hub::{EventHub, SubscriberId, Subscription};
pub use registry::RoomRegistry;
pub use room::{LeaveOutcome, Room};
pub use service::PokerService;
