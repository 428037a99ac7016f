//! Per-connection handler: command dispatch and live-update delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Loop over inbound commands until one binds the connection to a
//!      (room, player) pair: `create_room`, `join_room` or `attach`.
//!   2. On binding, subscribe to the room's hub and send `initial_state`.
//!   3. From then on, multiplex inbound commands, hub events and
//!      keep-alive ticks with `tokio::select!`.
//!   4. On disconnect, unsubscribe and leave the room.

use std::sync::Arc;
use std::time::Duration;

use planpoker_protocol::{
    ClientMessage, Codec, ErrorKind, PlayerId, RoomEvent, RoomId, ServerMessage,
};
use planpoker_room::{PokerService, RoomError, Subscription};
use planpoker_transport::{Connection, WebSocketConnection};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::PlanPokerError;
use crate::server::ServerState;

/// The room and player a connection acts as.
struct Binding {
    room_id: RoomId,
    player_id: PlayerId,
    subscription: Subscription,
}

/// Holds the connection's binding and releases it if the handler exits
/// without doing so itself (panic or cancellation).
///
/// `Drop` is synchronous, so the release runs on a spawned task.
struct BindingGuard {
    service: PokerService,
    binding: Option<Binding>,
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        let Some(binding) = self.binding.take() else {
            return;
        };
        let service = self.service.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = release(&service, binding).await;
            });
        }
    }
}

/// Why a command produced an `error` reply.
#[derive(Debug, thiserror::Error)]
enum CommandError {
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error("connection is not in a room")]
    Unbound,
}

impl CommandError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Room(e) => e.kind(),
            Self::Unbound => ErrorKind::InvalidInput,
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), PlanPokerError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let mut guard = BindingGuard {
        service: state.service.clone(),
        binding: None,
    };
    let mut keep_alive = state.keep_alive_interval.map(|period| {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });
    let mut last_seen = Instant::now();

    let result = loop {
        tokio::select! {
            inbound = conn.recv() => match inbound {
                Ok(Some(data)) => {
                    last_seen = Instant::now();
                    if let Err(e) = handle_inbound(&conn, &state, &mut guard.binding, &data).await {
                        break Err(e);
                    }
                }
                Ok(None) => {
                    tracing::debug!(%conn_id, "connection closed cleanly");
                    break Ok(());
                }
                Err(e) => break Err(e.into()),
            },

            event = next_event(&mut guard.binding) => match event {
                Some(event) => {
                    let msg = ServerMessage::Event { event };
                    if let Err(e) = send(&conn, &state.codec, &msg).await {
                        break Err(e);
                    }
                }
                None => {
                    // The hub dropped us: the room is gone.
                    if let Some(binding) = guard.binding.take() {
                        tracing::debug!(%conn_id, room_id = %binding.room_id, "room closed under connection");
                    }
                }
            },

            _ = tick(&mut keep_alive), if guard.binding.is_some() => {
                let msg = ServerMessage::KeepAlive { server_time: now_millis() };
                if let Err(e) = send(&conn, &state.codec, &msg).await {
                    break Err(e);
                }
            }

            _ = idle(state.idle_timeout, last_seen) => {
                tracing::debug!(%conn_id, "connection idle, closing");
                let _ = conn.close().await;
                break Ok(());
            }
        }
    };

    if let Some(binding) = guard.binding.take() {
        let (room_id, player_id) = (binding.room_id.clone(), binding.player_id.clone());
        match release(&state.service, binding).await {
            Ok(()) => tracing::info!(%conn_id, %room_id, %player_id, "player disconnected"),
            Err(e) => tracing::debug!(%conn_id, %room_id, error = %e, "leave on disconnect failed"),
        }
    }

    result
}

/// Decodes one inbound message and answers it.
async fn handle_inbound<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    binding: &mut Option<Binding>,
    data: &[u8],
) -> Result<(), PlanPokerError> {
    let msg: ClientMessage = match state.codec.decode(data) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!(conn_id = %conn.id(), error = %e, "undecodable message");
            let reply = ServerMessage::error(ErrorKind::InvalidInput, e.to_string());
            return send(conn, &state.codec, &reply).await;
        }
    };

    let command = msg.command();
    match execute(&state.service, binding, msg).await {
        Ok(replies) => {
            for reply in &replies {
                send(conn, &state.codec, reply).await?;
            }
        }
        Err(e) => {
            tracing::warn!(conn_id = %conn.id(), command, error = %e, "command rejected");
            send(conn, &state.codec, &ServerMessage::error(e.kind(), e.to_string())).await?;
        }
    }
    Ok(())
}

/// Runs a command against the service and returns the replies to send,
/// in order.
async fn execute(
    service: &PokerService,
    binding: &mut Option<Binding>,
    msg: ClientMessage,
) -> Result<Vec<ServerMessage>, CommandError> {
    let command = msg.command();
    let ack = || vec![ServerMessage::Ack { command: command.to_string() }];

    match msg {
        ClientMessage::CreateRoom { name } => {
            let (room_id, player_id) = service.create_room(&name).await?;
            let reply = ServerMessage::RoomCreated {
                room_id: room_id.clone(),
                player_id: player_id.clone(),
            };
            bind(service, binding, room_id, player_id, reply).await
        }

        ClientMessage::JoinRoom { room_id, name } => {
            let player_id = service.join_room(&room_id, &name).await?;
            let reply = ServerMessage::RoomJoined {
                room_id: room_id.clone(),
                player_id: player_id.clone(),
            };
            bind(service, binding, room_id, player_id, reply).await
        }

        ClientMessage::Attach { room_id, player_id } => {
            // Membership check; the snapshot itself comes from subscribe.
            service.get_room_snapshot(&room_id, &player_id).await?;
            let reply = ServerMessage::RoomJoined {
                room_id: room_id.clone(),
                player_id: player_id.clone(),
            };
            bind(service, binding, room_id, player_id, reply).await
        }

        ClientMessage::LeaveRoom => {
            let current = binding.take().ok_or(CommandError::Unbound)?;
            release(service, current).await?;
            Ok(ack())
        }

        ClientMessage::GetRoom => {
            let b = bound(binding)?;
            let room = service.get_room_snapshot(&b.room_id, &b.player_id).await?;
            Ok(vec![ServerMessage::Room { room }])
        }

        ClientMessage::SubmitVote { card } => {
            let b = bound(binding)?;
            service.submit_vote(&b.room_id, &b.player_id, &card).await?;
            Ok(ack())
        }

        ClientMessage::RevealCards => {
            let b = bound(binding)?;
            service.reveal_cards(&b.room_id, &b.player_id).await?;
            Ok(ack())
        }

        ClientMessage::ResetVoting => {
            let b = bound(binding)?;
            service.reset_voting(&b.room_id, &b.player_id).await?;
            Ok(ack())
        }

        ClientMessage::UpdateLink { link } => {
            let b = bound(binding)?;
            service.update_link(&b.room_id, &b.player_id, link).await?;
            Ok(ack())
        }

        ClientMessage::TransferCreator { target_id } => {
            let b = bound(binding)?;
            service
                .transfer_creator(&b.room_id, &b.player_id, &target_id)
                .await?;
            Ok(ack())
        }

        ClientMessage::Ping { client_time } => Ok(vec![ServerMessage::Pong {
            client_time,
            server_time: now_millis(),
        }]),
    }
}

/// Binds the connection to `(room_id, player_id)`, releasing any
/// previous binding first, and returns `reply` followed by the
/// `initial_state` event.
async fn bind(
    service: &PokerService,
    binding: &mut Option<Binding>,
    room_id: RoomId,
    player_id: PlayerId,
    reply: ServerMessage,
) -> Result<Vec<ServerMessage>, CommandError> {
    if let Some(previous) = binding.take() {
        if let Err(e) = release(service, previous).await {
            tracing::debug!(error = %e, "releasing previous binding failed");
        }
    }

    let (subscription, snapshot) = service.subscribe(&room_id).await?;
    tracing::debug!(%room_id, %player_id, subscriber = %subscription.id(), "connection bound");
    *binding = Some(Binding {
        room_id,
        player_id,
        subscription,
    });

    Ok(vec![
        reply,
        ServerMessage::Event {
            event: RoomEvent::InitialState(snapshot),
        },
    ])
}

/// Unsubscribes and removes the bound player from its room.
async fn release(service: &PokerService, binding: Binding) -> Result<(), RoomError> {
    service
        .unsubscribe(&binding.room_id, binding.subscription.id())
        .await;
    service.leave_room(&binding.room_id, &binding.player_id).await
}

fn bound(binding: &Option<Binding>) -> Result<&Binding, CommandError> {
    binding.as_ref().ok_or(CommandError::Unbound)
}

async fn send<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    msg: &ServerMessage,
) -> Result<(), PlanPokerError> {
    let bytes = codec.encode(msg)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Next event for the bound subscription; pends while unbound.
async fn next_event(binding: &mut Option<Binding>) -> Option<RoomEvent> {
    match binding {
        Some(b) => b.subscription.recv().await,
        None => std::future::pending().await,
    }
}

async fn tick(keep_alive: &mut Option<Interval>) {
    match keep_alive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn idle(timeout: Option<Duration>, last_seen: Instant) {
    match timeout {
        Some(timeout) => time::sleep_until(last_seen + timeout).await,
        None => std::future::pending().await,
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
