//! Integration tests for the Turnkeeper server, handler, and full
//! connection flow over real WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio_tungstenite::tungstenite::Message;
use turnkeeper::prelude::*;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Starts a server on a random port, driven by `clock`, and returns the
/// address.
async fn start_server(clock: Arc<ManualClock>) -> String {
    let server = TurnkeeperServer::builder()
        .bind("127.0.0.1:0")
        .clock(clock)
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

async fn recv(ws: &mut ClientWs) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("recv error");
        if msg.is_text() || msg.is_binary() {
            return serde_json::from_slice(&msg.into_data()).expect("decode");
        }
    }
}

/// Asserts nothing arrives within a short window.
async fn expect_silence(ws: &mut ClientWs) {
    let next = tokio::time::timeout(Duration::from_millis(150), ws.next()).await;
    assert!(next.is_err(), "unexpected message: {next:?}");
}

async fn create(ws: &mut ClientWs, player: &str) -> RoomId {
    send(
        ws,
        json!({"type": "create_room", "playerId": player, "playerName": player}),
    )
    .await;
    match recv(ws).await {
        ServerMessage::RoomCreated { room_id, room } => {
            assert_eq!(room.id, room_id);
            room_id
        }
        other => panic!("expected room_created, got {other:?}"),
    }
}

async fn join(ws: &mut ClientWs, room: &str, player: &str) -> Room {
    send(
        ws,
        json!({"type": "join", "roomId": room, "playerId": player, "playerName": player}),
    )
    .await;
    match recv(ws).await {
        ServerMessage::RoomState { room } => room,
        other => panic!("expected room_state, got {other:?}"),
    }
}

async fn timer(ws: &mut ClientWs, kind: &str, room: &RoomId, player: &str) {
    send(
        ws,
        json!({"type": kind, "roomId": room.as_str(), "playerId": player}),
    )
    .await;
}

/// Reads until the connection goes quiet and returns the state carried by
/// the last `timer_state_update` seen.
async fn last_timer_state(ws: &mut ClientWs) -> Option<GameState> {
    let mut last = None;
    while let Ok(Some(Ok(msg))) =
        tokio::time::timeout(Duration::from_millis(300), ws.next()).await
    {
        if !msg.is_text() {
            continue;
        }
        if let Ok(ServerMessage::TimerStateUpdate { room }) =
            serde_json::from_slice::<ServerMessage>(&msg.into_data())
        {
            last = Some(room.game_state);
        }
    }
    last
}

fn expect_timer_update(msg: ServerMessage) -> Room {
    match msg {
        ServerMessage::TimerStateUpdate { room } => room,
        other => panic!("expected timer_state_update, got {other:?}"),
    }
}

fn expect_error(msg: ServerMessage) -> String {
    match msg {
        ServerMessage::Error { message } => message,
        other => panic!("expected error, got {other:?}"),
    }
}

// =========================================================================
// Rooms
// =========================================================================

#[tokio::test]
async fn test_create_room_replies_with_fresh_room() {
    let clock = Arc::new(ManualClock::new(1_000));
    let addr = start_server(clock).await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        json!({"type": "create_room", "playerId": "a", "playerName": "Ada"}),
    )
    .await;

    match recv(&mut ws).await {
        ServerMessage::RoomCreated { room_id, room } => {
            assert_eq!(room_id.as_str().len(), 4);
            assert_eq!(room.game_state, GameState::Stopped);
            assert_eq!(room.players.len(), 1);
            assert_eq!(room.players[0].name, "Ada");
            assert_eq!(room.players[0].joined_at, 1_000);
            assert_eq!(room.total_for(&PlayerId::new("a")), Some(0));
        }
        other => panic!("expected room_created, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_replies_to_joiner_and_notifies_others() {
    let addr = start_server(Arc::new(ManualClock::new(0))).await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;

    let code = create(&mut a, "a").await;
    let lower = format!(" {} ", code.as_str().to_lowercase());
    let room = join(&mut b, &lower, "b").await;

    assert_eq!(room.id, code);
    let ids: Vec<&str> = room.players.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);

    match recv(&mut a).await {
        ServerMessage::PlayerJoined { player } => {
            assert_eq!(player.id, PlayerId::new("b"));
        }
        other => panic!("expected player_joined, got {other:?}"),
    }
    // The joiner never hears about itself.
    expect_silence(&mut b).await;
}

#[tokio::test]
async fn test_leave_and_disconnect_broadcast_player_left() {
    let addr = start_server(Arc::new(ManualClock::new(0))).await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    let mut c = connect(&addr).await;

    let code = create(&mut a, "a").await;
    join(&mut b, code.as_str(), "b").await;
    join(&mut c, code.as_str(), "c").await;
    recv(&mut a).await; // b joined
    recv(&mut a).await; // c joined
    recv(&mut b).await; // c joined

    send(
        &mut b,
        json!({"type": "leave", "roomId": code.as_str(), "playerId": "b"}),
    )
    .await;
    for ws in [&mut a, &mut c] {
        match recv(ws).await {
            ServerMessage::PlayerLeft { player_id } => {
                assert_eq!(player_id, PlayerId::new("b"));
            }
            other => panic!("expected player_left, got {other:?}"),
        }
    }

    c.close(None).await.expect("close");
    match recv(&mut a).await {
        ServerMessage::PlayerLeft { player_id } => {
            assert_eq!(player_id, PlayerId::new("c"));
        }
        other => panic!("expected player_left, got {other:?}"),
    }
}

#[tokio::test]
async fn test_switching_player_in_same_room_keeps_the_timer() {
    let clock = Arc::new(ManualClock::new(0));
    let addr = start_server(Arc::clone(&clock)).await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;

    let code = create(&mut a, "a").await;
    join(&mut b, code.as_str(), "b").await;
    recv(&mut a).await; // b joined
    timer(&mut a, "start", &code, "a").await;
    recv(&mut a).await;
    recv(&mut b).await;
    clock.set(500);
    timer(&mut a, "end_turn", &code, "a").await;
    recv(&mut a).await;
    recv(&mut b).await;

    let room = join(&mut a, code.as_str(), "a2").await;
    assert_eq!(room.game_state, GameState::Running);
    assert_eq!(room.total_for(&PlayerId::new("a")), Some(500));
    let ids: Vec<&str> = room.players.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["b", "a2"]);

    match recv(&mut b).await {
        ServerMessage::PlayerLeft { player_id } => {
            assert_eq!(player_id, PlayerId::new("a"));
        }
        other => panic!("expected player_left, got {other:?}"),
    }
    match recv(&mut b).await {
        ServerMessage::PlayerJoined { player } => {
            assert_eq!(player.id, PlayerId::new("a2"));
        }
        other => panic!("expected player_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_while_in_room_leaves_old_room() {
    let addr = start_server(Arc::new(ManualClock::new(0))).await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;

    let first = create(&mut a, "a").await;
    join(&mut b, first.as_str(), "b").await;
    recv(&mut a).await; // b joined

    let second = create(&mut b, "b").await;
    assert_ne!(first, second);
    match recv(&mut a).await {
        ServerMessage::PlayerLeft { player_id } => {
            assert_eq!(player_id, PlayerId::new("b"));
        }
        other => panic!("expected player_left, got {other:?}"),
    }
}

// =========================================================================
// Timers
// =========================================================================

#[tokio::test]
async fn test_timer_updates_reach_every_member() {
    let clock = Arc::new(ManualClock::new(0));
    let addr = start_server(Arc::clone(&clock)).await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;

    let code = create(&mut a, "a").await;
    join(&mut b, code.as_str(), "b").await;
    recv(&mut a).await; // b joined

    clock.set(1_000);
    timer(&mut a, "start", &code, "a").await;
    for ws in [&mut a, &mut b] {
        let room = expect_timer_update(recv(ws).await);
        assert_eq!(room.game_state, GameState::Running);
        assert_eq!(room.anchor_time, Some(1_000));
    }

    clock.set(3_500);
    timer(&mut b, "end_turn", &code, "a").await;
    for ws in [&mut a, &mut b] {
        let room = expect_timer_update(recv(ws).await);
        assert_eq!(room.total_for(&PlayerId::new("a")), Some(2_500));
        assert_eq!(room.anchor_time, Some(3_500));
        assert_eq!(room.accrued_paused_time, 0);
    }
}

#[tokio::test]
async fn test_pause_resume_wire_format() {
    let clock = Arc::new(ManualClock::new(0));
    let addr = start_server(Arc::clone(&clock)).await;
    let mut a = connect(&addr).await;
    let code = create(&mut a, "a").await;

    timer(&mut a, "start", &code, "a").await;
    recv(&mut a).await;
    clock.set(1_000);
    timer(&mut a, "pause", &code, "a").await;

    let frame = tokio::time::timeout(RECV_TIMEOUT, a.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let json: serde_json::Value =
        serde_json::from_slice(&frame.into_data()).unwrap();
    assert_eq!(json["type"], "timer_state_update");
    assert_eq!(json["room"]["gameState"], "PAUSED");
    assert_eq!(json["room"]["anchorTime"], serde_json::Value::Null);
    assert_eq!(json["room"]["accruedPausedTime"], 1_000);
    assert_eq!(json["room"]["playerTotals"]["a"], 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_timer_ops_leave_every_client_on_the_final_state() {
    let addr = start_server(Arc::new(ManualClock::new(0))).await;
    let mut watcher = connect(&addr).await;
    let code = create(&mut watcher, "watcher").await;

    let mut clients = Vec::new();
    for i in 0..4 {
        let mut ws = connect(&addr).await;
        join(&mut ws, code.as_str(), &format!("p{i}")).await;
        clients.push(ws);
    }

    for _round in 0..5 {
        let mut tasks = Vec::new();
        for (i, mut ws) in clients.into_iter().enumerate() {
            let code = code.clone();
            tasks.push(tokio::spawn(async move {
                for k in 0..6 {
                    let kind = if (i + k) % 2 == 0 { "start" } else { "stop" };
                    timer(&mut ws, kind, &code, "p0").await;
                }
                ws
            }));
        }
        clients = Vec::new();
        for task in tasks {
            clients.push(task.await.expect("sender task"));
        }

        let mut seen = vec![last_timer_state(&mut watcher).await];
        for ws in clients.iter_mut() {
            seen.push(last_timer_state(ws).await);
        }

        // Re-joining as the same player reads the committed state.
        let actual = join(&mut watcher, code.as_str(), "watcher").await;
        for state in seen {
            assert_eq!(state, Some(actual.game_state));
        }
    }
}

#[tokio::test]
async fn test_invalid_transition_errors_only_to_actor() {
    let addr = start_server(Arc::new(ManualClock::new(0))).await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;

    let code = create(&mut a, "a").await;
    join(&mut b, code.as_str(), "b").await;
    recv(&mut a).await; // b joined

    timer(&mut b, "pause", &code, "b").await;
    assert_eq!(
        expect_error(recv(&mut b).await),
        "cannot pause timer: current state is STOPPED"
    );
    expect_silence(&mut a).await;
}

#[tokio::test]
async fn test_timer_on_unknown_room() {
    let addr = start_server(Arc::new(ManualClock::new(0))).await;
    let mut ws = connect(&addr).await;

    timer(&mut ws, "start", &RoomId::new("zzzz"), "a").await;
    assert_eq!(expect_error(recv(&mut ws).await), "room ZZZZ not found");
}

// =========================================================================
// Malformed input
// =========================================================================

#[tokio::test]
async fn test_malformed_frames_get_error_and_keep_connection() {
    let addr = start_server(Arc::new(ManualClock::new(0))).await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Text("not json".to_string().into()))
        .await
        .unwrap();
    assert_eq!(expect_error(recv(&mut ws).await), "invalid message format");

    send(&mut ws, json!({"type": "fly", "roomId": "ABCD"})).await;
    assert_eq!(expect_error(recv(&mut ws).await), "invalid message format");

    send(&mut ws, json!({"type": "start", "roomId": "ABCD", "playerId": " "}))
        .await;
    assert_eq!(expect_error(recv(&mut ws).await), "invalid message format");

    // Still usable.
    create(&mut ws, "a").await;
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_other_paths_are_refused() {
    let addr = start_server(Arc::new(ManualClock::new(0))).await;

    let result =
        tokio_tungstenite::connect_async(format!("ws://{addr}/elsewhere")).await;
    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
            assert_eq!(resp.status(), 404);
        }
        other => panic!("expected 404, got {other:?}"),
    }

    // The listener keeps serving after a refusal.
    let mut ws = connect(&addr).await;
    create(&mut ws, "a").await;
}

#[tokio::test]
async fn test_silent_peer_does_not_block_other_clients() {
    let addr = start_server(Arc::new(ManualClock::new(0))).await;

    let _silent = tokio::net::TcpStream::connect(&addr).await.unwrap();
    let mut ws = tokio::time::timeout(RECV_TIMEOUT, connect(&addr))
        .await
        .expect("a client must connect while another peer stays silent");
    create(&mut ws, "a").await;
}

#[tokio::test]
async fn test_silent_peer_is_dropped_after_handshake_timeout() {
    let server = TurnkeeperServer::builder()
        .bind("127.0.0.1:0")
        .handshake_timeout(Duration::from_millis(100))
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let mut silent = tokio::net::TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(RECV_TIMEOUT, silent.read(&mut buf))
        .await
        .expect("server should hang up on a silent peer");
    assert_eq!(read.unwrap_or(0), 0);
}

#[tokio::test]
async fn test_run_until_stops_accepting() {
    let server = TurnkeeperServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let task = tokio::spawn(server.run_until(async move {
        let _ = stop_rx.await;
    }));
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(RECV_TIMEOUT, task)
        .await
        .expect("server should stop")
        .expect("task should not panic");
    assert!(result.is_ok());
}
