//! End-to-end tests: a real server on a random port, driven by
//! tokio-tungstenite clients speaking JSON.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use planpoker::prelude::*;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server built from `builder` on a random port.
async fn start_with(builder: PlanPokerServerBuilder) -> (String, PokerService) {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let service = server.service().clone();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, service)
}

async fn start_server() -> (String, PokerService) {
    start_with(PlanPokerServerBuilder::new()).await
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, msg: &ClientMessage) {
    let json = serde_json::to_string(msg).expect("encode");
    ws.send(Message::Text(json.into())).await.expect("send");
}

/// Next server message, skipping keep-alives.
async fn recv(ws: &mut ClientWs) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for server message")
            .expect("stream ended")
            .expect("websocket error");
        let decoded: ServerMessage =
            serde_json::from_slice(&msg.into_data()).expect("decode server message");
        if !matches!(decoded, ServerMessage::KeepAlive { .. }) {
            return decoded;
        }
    }
}

async fn recv_event(ws: &mut ClientWs) -> RoomEvent {
    match recv(ws).await {
        ServerMessage::Event { event } => event,
        other => panic!("expected event, got {other:?}"),
    }
}

async fn expect_ack(ws: &mut ClientWs, command: &str) {
    match recv(ws).await {
        ServerMessage::Ack { command: got } => assert_eq!(got, command),
        other => panic!("expected ack for {command}, got {other:?}"),
    }
}

async fn expect_error(ws: &mut ClientWs, kind: ErrorKind) -> String {
    match recv(ws).await {
        ServerMessage::Error {
            code,
            kind: got,
            message,
        } => {
            assert_eq!(got, kind);
            assert_eq!(code, kind.code());
            message
        }
        other => panic!("expected {kind:?} error, got {other:?}"),
    }
}

/// Creates a room as `name`; consumes the reply and the initial state.
async fn create_room(ws: &mut ClientWs, name: &str) -> (RoomId, PlayerId) {
    send(ws, &ClientMessage::CreateRoom { name: name.into() }).await;
    let ids = match recv(ws).await {
        ServerMessage::RoomCreated { room_id, player_id } => (room_id, player_id),
        other => panic!("expected room_created, got {other:?}"),
    };
    assert!(matches!(recv_event(ws).await, RoomEvent::InitialState(_)));
    ids
}

/// Joins `room_id` as `name`; returns the player id and initial state.
async fn join_room(ws: &mut ClientWs, room_id: &RoomId, name: &str) -> (PlayerId, RoomSnapshot) {
    send(
        ws,
        &ClientMessage::JoinRoom {
            room_id: room_id.clone(),
            name: name.into(),
        },
    )
    .await;
    let player_id = match recv(ws).await {
        ServerMessage::RoomJoined { player_id, .. } => player_id,
        other => panic!("expected room_joined, got {other:?}"),
    };
    match recv_event(ws).await {
        RoomEvent::InitialState(snapshot) => (player_id, snapshot),
        other => panic!("expected initial_state, got {other:?}"),
    }
}

async fn wait_until_no_rooms(service: &PokerService) {
    for _ in 0..100 {
        if service.registry().is_empty().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("room was never deleted");
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_create_room_binds_and_sends_initial_state() {
    let (addr, service) = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, &ClientMessage::CreateRoom { name: "Alice".into() }).await;

    let (room_id, player_id) = match recv(&mut ws).await {
        ServerMessage::RoomCreated { room_id, player_id } => (room_id, player_id),
        other => panic!("expected room_created, got {other:?}"),
    };
    match recv_event(&mut ws).await {
        RoomEvent::InitialState(snapshot) => {
            assert_eq!(snapshot.id, room_id);
            assert_eq!(snapshot.players.len(), 1);
            assert_eq!(snapshot.status, RoomStatus::Voting);
            let creator = snapshot.creator().expect("room should have a creator");
            assert_eq!(creator.id, player_id);
            assert_eq!(creator.name, "Alice");
        }
        other => panic!("expected initial_state, got {other:?}"),
    }

    assert!(service.registry().get(&room_id).await.is_some());
}

#[tokio::test]
async fn test_join_notifies_existing_members() {
    let (addr, _service) = start_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;

    let (room_id, _) = create_room(&mut alice, "Alice").await;
    let (bob_id, snapshot) = join_room(&mut bob, &room_id, "Bob").await;

    assert_eq!(snapshot.players.len(), 2);
    assert!(!snapshot.players[&bob_id].is_creator);

    match recv_event(&mut alice).await {
        RoomEvent::PlayerJoined(player) => {
            assert_eq!(player.id, bob_id);
            assert_eq!(player.name, "Bob");
        }
        other => panic!("expected player_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_vote_stays_hidden_until_reveal() {
    let (addr, _service) = start_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;

    let (room_id, _) = create_room(&mut alice, "Alice").await;
    let (bob_id, _) = join_room(&mut bob, &room_id, "Bob").await;
    recv_event(&mut alice).await; // player_joined

    send(&mut bob, &ClientMessage::SubmitVote { card: "5".into() }).await;
    expect_ack(&mut bob, "submit_vote").await;

    for ws in [&mut alice, &mut bob] {
        assert_eq!(
            recv_event(ws).await,
            RoomEvent::VoteSubmitted { name: "Bob".into() }
        );
    }

    // A mid-round snapshot masks the card but shows the vote.
    send(&mut alice, &ClientMessage::GetRoom).await;
    match recv(&mut alice).await {
        ServerMessage::Room { room } => {
            let bob = &room.players[&bob_id];
            assert_eq!(bob.card, Card::Unknown);
            assert!(bob.has_voted);
        }
        other => panic!("expected room, got {other:?}"),
    }

    send(&mut alice, &ClientMessage::RevealCards).await;
    expect_ack(&mut alice, "reveal_cards").await;

    for ws in [&mut alice, &mut bob] {
        match recv_event(ws).await {
            RoomEvent::CardsRevealed(snapshot) => {
                assert_eq!(snapshot.status, RoomStatus::Revealed);
                assert_eq!(snapshot.players[&bob_id].card, Card::Five);
            }
            other => panic!("expected cards_revealed, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_reset_archives_round_and_clears_link() {
    let (addr, _service) = start_server().await;
    let mut ws = connect(&addr).await;
    create_room(&mut ws, "Alice").await;

    send(&mut ws, &ClientMessage::UpdateLink { link: "https://tracker/PP-1".into() }).await;
    expect_ack(&mut ws, "update_link").await;
    assert_eq!(
        recv_event(&mut ws).await,
        RoomEvent::LinkUpdated { link: "https://tracker/PP-1".into() }
    );

    send(&mut ws, &ClientMessage::SubmitVote { card: "8".into() }).await;
    expect_ack(&mut ws, "submit_vote").await;
    recv_event(&mut ws).await; // vote_submitted
    send(&mut ws, &ClientMessage::RevealCards).await;
    expect_ack(&mut ws, "reveal_cards").await;
    recv_event(&mut ws).await; // cards_revealed

    send(&mut ws, &ClientMessage::ResetVoting).await;
    expect_ack(&mut ws, "reset_voting").await;
    match recv_event(&mut ws).await {
        RoomEvent::VotingReset(snapshot) => {
            assert_eq!(snapshot.status, RoomStatus::Voting);
            assert_eq!(snapshot.link, "");
            assert_eq!(snapshot.vote_history.len(), 1);
            assert_eq!(snapshot.vote_history[0].link, "https://tracker/PP-1");
        }
        other => panic!("expected voting_reset, got {other:?}"),
    }
    assert_eq!(
        recv_event(&mut ws).await,
        RoomEvent::LinkUpdated { link: String::new() }
    );
}

#[tokio::test]
async fn test_non_creator_reveal_is_forbidden() {
    let (addr, _service) = start_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;

    let (room_id, _) = create_room(&mut alice, "Alice").await;
    join_room(&mut bob, &room_id, "Bob").await;

    send(&mut bob, &ClientMessage::RevealCards).await;
    expect_error(&mut bob, ErrorKind::Forbidden).await;
}

#[tokio::test]
async fn test_transfer_creator_over_the_wire() {
    let (addr, _service) = start_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;

    let (room_id, _) = create_room(&mut alice, "Alice").await;
    let (bob_id, _) = join_room(&mut bob, &room_id, "Bob").await;
    recv_event(&mut alice).await; // player_joined

    send(&mut alice, &ClientMessage::TransferCreator { target_id: bob_id }).await;
    expect_ack(&mut alice, "transfer_creator").await;
    let transferred = RoomEvent::CreatorTransferred {
        previous_creator: "Alice".into(),
        new_creator: "Bob".into(),
    };
    assert_eq!(recv_event(&mut alice).await, transferred);
    assert_eq!(recv_event(&mut bob).await, transferred);

    // Alice lost the right to reveal.
    send(&mut alice, &ClientMessage::RevealCards).await;
    expect_error(&mut alice, ErrorKind::Forbidden).await;
}

#[tokio::test]
async fn test_commands_before_binding_are_rejected() {
    let (addr, _service) = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, &ClientMessage::RevealCards).await;
    let message = expect_error(&mut ws, ErrorKind::InvalidInput).await;
    assert!(message.contains("not in a room"));

    send(&mut ws, &ClientMessage::LeaveRoom).await;
    expect_error(&mut ws, ErrorKind::InvalidInput).await;
}

#[tokio::test]
async fn test_join_unknown_room_is_not_found() {
    let (addr, _service) = start_server().await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        &ClientMessage::JoinRoom {
            room_id: RoomId::from("no-such-room"),
            name: "Bob".into(),
        },
    )
    .await;
    expect_error(&mut ws, ErrorKind::NotFound).await;
}

#[tokio::test]
async fn test_duplicate_name_is_conflict() {
    let (addr, _service) = start_server().await;
    let mut alice = connect(&addr).await;
    let mut impostor = connect(&addr).await;

    let (room_id, _) = create_room(&mut alice, "Alice").await;
    send(
        &mut impostor,
        &ClientMessage::JoinRoom {
            room_id,
            name: "Alice".into(),
        },
    )
    .await;
    expect_error(&mut impostor, ErrorKind::Conflict).await;
}

#[tokio::test]
async fn test_invalid_card_and_garbage_keep_connection_open() {
    let (addr, _service) = start_server().await;
    let mut ws = connect(&addr).await;
    create_room(&mut ws, "Alice").await;

    send(&mut ws, &ClientMessage::SubmitVote { card: "7".into() }).await;
    expect_error(&mut ws, ErrorKind::InvalidInput).await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    expect_error(&mut ws, ErrorKind::InvalidInput).await;

    send(&mut ws, &ClientMessage::Ping { client_time: 999 }).await;
    match recv(&mut ws).await {
        ServerMessage::Pong { client_time, server_time } => {
            assert_eq!(client_time, 999);
            assert!(server_time > 0);
        }
        other => panic!("expected pong, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_leaves_and_promotes() {
    let (addr, _service) = start_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;

    let (room_id, _) = create_room(&mut alice, "Alice").await;
    join_room(&mut bob, &room_id, "Bob").await;

    alice.close(None).await.unwrap();

    assert_eq!(
        recv_event(&mut bob).await,
        RoomEvent::PlayerLeft { name: "Alice".into() }
    );
    assert_eq!(
        recv_event(&mut bob).await,
        RoomEvent::CreatorChanged { name: "Bob".into() }
    );

    // Bob is creator now and may reveal.
    send(&mut bob, &ClientMessage::RevealCards).await;
    expect_ack(&mut bob, "reveal_cards").await;
}

#[tokio::test]
async fn test_last_disconnect_deletes_room() {
    let (addr, service) = start_server().await;
    let mut alice = connect(&addr).await;
    let (room_id, _) = create_room(&mut alice, "Alice").await;
    assert!(service.registry().get(&room_id).await.is_some());

    alice.close(None).await.unwrap();

    wait_until_no_rooms(&service).await;
}

#[tokio::test]
async fn test_leave_room_unbinds_but_keeps_connection() {
    let (addr, service) = start_server().await;
    let mut ws = connect(&addr).await;
    create_room(&mut ws, "Alice").await;

    send(&mut ws, &ClientMessage::LeaveRoom).await;
    expect_ack(&mut ws, "leave_room").await;
    wait_until_no_rooms(&service).await;

    send(&mut ws, &ClientMessage::GetRoom).await;
    expect_error(&mut ws, ErrorKind::InvalidInput).await;

    // Same socket can open a new room.
    create_room(&mut ws, "Alice").await;
    assert_eq!(service.registry().len().await, 1);
}

#[tokio::test]
async fn test_attach_binds_existing_member() {
    let (addr, service) = start_server().await;
    let mut alice = connect(&addr).await;
    let (room_id, _) = create_room(&mut alice, "Alice").await;

    let bob_id = service.join_room(&room_id, "Bob").await.unwrap();
    recv_event(&mut alice).await; // player_joined

    let mut bob = connect(&addr).await;
    send(
        &mut bob,
        &ClientMessage::Attach {
            room_id: room_id.clone(),
            player_id: bob_id.clone(),
        },
    )
    .await;
    match recv(&mut bob).await {
        ServerMessage::RoomJoined { player_id, .. } => assert_eq!(player_id, bob_id),
        other => panic!("expected room_joined, got {other:?}"),
    }
    match recv_event(&mut bob).await {
        RoomEvent::InitialState(snapshot) => assert_eq!(snapshot.players.len(), 2),
        other => panic!("expected initial_state, got {other:?}"),
    }

    let mut stranger = connect(&addr).await;
    send(
        &mut stranger,
        &ClientMessage::Attach {
            room_id,
            player_id: PlayerId::from("nobody"),
        },
    )
    .await;
    expect_error(&mut stranger, ErrorKind::NotFound).await;
}

#[tokio::test]
async fn test_keep_alive_sent_while_bound() {
    let (addr, _service) =
        start_with(PlanPokerServerBuilder::new().keep_alive_interval(Duration::from_millis(50)))
            .await;
    let mut ws = connect(&addr).await;
    create_room(&mut ws, "Alice").await;

    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("keep-alive should arrive")
        .unwrap()
        .unwrap();
    let decoded: ServerMessage = serde_json::from_slice(&msg.into_data()).unwrap();
    assert!(matches!(decoded, ServerMessage::KeepAlive { .. }));
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let (addr, _service) =
        start_with(PlanPokerServerBuilder::new().idle_timeout(Duration::from_millis(100))).await;
    let mut ws = connect(&addr).await;

    let result = tokio::time::timeout(Duration::from_secs(2), ws.next()).await;
    match result {
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Ok(Some(Err(_))) => {}
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_run_until_stops_on_shutdown() {
    let server = PlanPokerServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let task = tokio::spawn(server.run_until(async {
        let _ = rx.await;
    }));

    let mut ws = connect(&addr).await;
    send(&mut ws, &ClientMessage::Ping { client_time: 1 }).await;
    assert!(matches!(recv(&mut ws).await, ServerMessage::Pong { .. }));

    tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("server should stop")
        .expect("task should not panic")
        .expect("run_until should succeed");
}

#[tokio::test]
async fn test_stalled_handshake_does_not_block_other_clients() {
    let (addr, _service) = start_server().await;

    // Opens TCP but never sends the upgrade request.
    let _stalled = tokio::net::TcpStream::connect(&addr).await.unwrap();

    let mut ws = tokio::time::timeout(Duration::from_secs(2), connect(&addr))
        .await
        .expect("second client should connect while the first stalls");
    send(&mut ws, &ClientMessage::Ping { client_time: 7 }).await;
    assert!(matches!(
        recv(&mut ws).await,
        ServerMessage::Pong { client_time: 7, .. }
    ));
}

#[tokio::test]
async fn test_stalled_handshake_is_dropped_after_timeout() {
    use tokio::io::AsyncReadExt;

    let (addr, _service) = start_with(
        PlanPokerServerBuilder::new().handshake_timeout(Duration::from_millis(100)),
    )
    .await;
    let mut stalled = tokio::net::TcpStream::connect(&addr).await.unwrap();

    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(2), stalled.read(&mut buf))
        .await
        .expect("server should hang up on the stalled socket");
    assert!(matches!(read, Ok(0) | Err(_)));
}
