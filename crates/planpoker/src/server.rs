//! `PlanPokerServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → room service. Each
//! accepted connection gets its own task running the connection
//! handler.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use planpoker_protocol::{Codec, JsonCodec};
use planpoker_room::{PokerService, RoomConfig, RoomRegistry};
use planpoker_transport::{
    Incoming, Transport, TransportError, WebSocketIncoming, WebSocketTransport,
};

use crate::PlanPokerError;
use crate::handler::handle_connection;

/// Per-connection settings shared by every handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) service: PokerService,
    pub(crate) codec: C,
    /// `None` disables keep-alive messages.
    pub(crate) keep_alive_interval: Option<Duration>,
    /// `None` never drops a silent connection.
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) handshake_timeout: Duration,
}

/// Builder for configuring and starting a planpoker server.
///
/// ```rust,no_run
/// use planpoker::prelude::*;
///
/// # async fn start() -> Result<(), PlanPokerError> {
/// let server = PlanPokerServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PlanPokerServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    keep_alive_interval: Duration,
    idle_timeout: Option<Duration>,
    handshake_timeout: Duration,
}

impl PlanPokerServerBuilder {
    pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
            keep_alive_interval: Self::DEFAULT_KEEP_ALIVE,
            idle_timeout: None,
            handshake_timeout: Self::DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sets the address to bind to. Port `0` picks a free port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// How often a connection bound to a room gets a `keep_alive`.
    /// Zero turns keep-alives off.
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Closes connections that send nothing for this long.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// How long an accepted socket gets to finish the WebSocket upgrade
    /// before it is dropped.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the transport and creates an empty room registry.
    ///
    /// Uses `JsonCodec` over `WebSocketTransport`.
    pub async fn build(self) -> Result<PlanPokerServer<JsonCodec>, PlanPokerError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let registry = Arc::new(RoomRegistry::new(self.room_config));

        let state = Arc::new(ServerState {
            service: PokerService::new(registry),
            codec: JsonCodec,
            keep_alive_interval: (!self.keep_alive_interval.is_zero())
                .then_some(self.keep_alive_interval),
            idle_timeout: self.idle_timeout,
            handshake_timeout: self.handshake_timeout,
        });

        Ok(PlanPokerServer { transport, state })
    }
}

impl Default for PlanPokerServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound planpoker server.
///
/// Call [`run`](Self::run) or [`run_until`](Self::run_until) to start
/// accepting connections.
pub struct PlanPokerServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl PlanPokerServer<JsonCodec> {
    pub fn builder() -> PlanPokerServerBuilder {
        PlanPokerServerBuilder::new()
    }
}

impl<C: Codec> PlanPokerServer<C> {
    pub fn local_addr(&self) -> Result<SocketAddr, PlanPokerError> {
        Ok(self.transport.local_addr()?)
    }

    /// The command facade the server dispatches to. Share its registry
    /// with the sweeper.
    pub fn service(&self) -> &PokerService {
        &self.state.service
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), PlanPokerError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Stops accepting new connections; connections already running
    /// keep going until their peers disconnect.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), PlanPokerError> {
        tokio::pin!(shutdown);
        tracing::info!(addr = ?self.transport.local_addr().ok(), "planpoker server running");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(incoming) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(serve(incoming, state));
                    }
                    Err(TransportError::Shutdown) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.transport.shutdown().await?;
        Ok(())
    }
}

/// Upgrades one accepted socket and runs its handler. Runs on the
/// connection's own task so a slow handshake never stalls `accept`.
async fn serve<C: Codec>(incoming: WebSocketIncoming, state: Arc<ServerState<C>>) {
    let peer = incoming.peer_addr();
    let conn = match tokio::time::timeout(state.handshake_timeout, incoming.handshake()).await {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            tracing::debug!(%peer, error = %e, "websocket handshake failed");
            return;
        }
        Err(_) => {
            tracing::debug!(%peer, "websocket handshake timed out");
            return;
        }
    };

    match handle_connection(conn, state).await {
        Ok(()) => {}
        Err(PlanPokerError::Transport(e)) if e.is_disconnect() => {
            tracing::debug!(%peer, error = %e, "peer went away");
        }
        Err(e) => tracing::warn!(%peer, error = %e, "connection ended with error"),
    }
}
