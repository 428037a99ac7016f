//! Transport layer for planpoker.
//!
//! The [`Transport`] and [`Connection`] traits keep the server's
//! per-connection loop independent of the wire. The only implementation
//! today is WebSocket.
//!
//! A connection's send and receive sides are independent: one task may
//! be parked in [`Connection::recv`] while another sends, which is what
//! lets the server push room events while waiting for client commands.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketIncoming, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Process-unique connection number, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A listener that yields client connections.
///
/// Accepting and upgrading are separate steps. [`accept`](Self::accept)
/// only takes the raw socket off the listener, so a client that stalls
/// mid-handshake costs its own task and never the accept loop.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Incoming: Incoming<Connection = Self::Connection, Error = Self::Error>;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next client socket. Does not read from it.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// The address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;

    /// Stops accepting new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// An accepted socket whose protocol handshake hasn't run yet.
pub trait Incoming: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    fn peer_addr(&self) -> SocketAddr;

    /// Runs the handshake and yields the ready connection.
    async fn handshake(self) -> Result<Self::Connection, Self::Error>;
}

/// A single client connection carrying whole messages.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one message to the peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    /// Cancel-safe: dropping the future loses no message.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Starts a clean close from the server side.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    /// The remote peer's address.
    fn peer_addr(&self) -> SocketAddr;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display_and_value() {
        let id = ConnectionId::new(31);
        assert_eq!(format!("{id}"), "conn-31");
        assert_eq!(id.into_inner(), 31);
    }

    #[test]
    fn test_connection_ids_compare_by_value() {
        let seen: std::collections::HashSet<_> =
            [1, 2, 1].into_iter().map(ConnectionId::new).collect();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&ConnectionId::new(2)));
    }
}
