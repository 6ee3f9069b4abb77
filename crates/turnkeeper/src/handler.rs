//! Per-connection handler: decode, dispatch, reply, broadcast.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task that drains the connection's outbox. The flow is:
//!   1. Open an outbox and spawn the writer
//!   2. Loop: receive a frame → decode a `ClientMessage` → dispatch
//!   3. On stream end: implicit leave, `player_left` broadcast, close outbox
//!
//! The handler never writes to the socket directly. Successful operations
//! are announced by the broadcaster, which the room store calls while the
//! room is still locked. The handler itself only queues error replies.

use std::sync::Arc;

use turnkeeper_protocol::{ClientMessage, Codec, PlayerId, RoomId, ServerMessage};
use turnkeeper_room::{RoomError, TimerOp};
use turnkeeper_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::TurnkeeperError;
use crate::broadcast::OutboxReceiver;
use crate::server::ServerState;

/// Reply text for frames that don't decode into a known message.
pub const INVALID_MESSAGE: &str = "invalid message format";

/// Drop guard that runs the disconnect path when the handler exits.
///
/// This ensures the player leaves their room even if the handler panics.
/// Since `Drop` is synchronous, the async cleanup runs in its own task.
struct DisconnectGuard<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for DisconnectGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.store.disconnect(conn_id).await;
            state.broadcaster.unregister(conn_id);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), TurnkeeperError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let outbox = state.broadcaster.register(conn_id);
    tokio::spawn(write_loop(Arc::clone(&conn), outbox));
    let _guard = DisconnectGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "undecodable frame");
                reply(&state, conn_id, ServerMessage::error(INVALID_MESSAGE));
                continue;
            }
        };
        if let Err(e) = msg.validate() {
            tracing::debug!(%conn_id, error = %e, "rejected message");
            reply(&state, conn_id, ServerMessage::error(INVALID_MESSAGE));
            continue;
        }

        tracing::debug!(%conn_id, kind = msg.kind(), "message received");
        dispatch(&state, conn_id, msg).await;
    }

    // _guard drops here → disconnect and outbox teardown fire.
    Ok(())
}

/// Writes queued frames to the socket until the outbox closes or a write
/// fails.
async fn write_loop(conn: Arc<WebSocketConnection>, mut outbox: OutboxReceiver) {
    let conn_id = conn.id();
    while let Some(frame) = outbox.recv().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(%conn_id, error = %e, "write failed");
            break;
        }
    }
    let _ = conn.close().await;
}

/// Routes one validated message to the room store.
async fn dispatch<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    msg: ClientMessage,
) {
    let result = match msg {
        ClientMessage::CreateRoom {
            player_id,
            player_name,
        } => state
            .store
            .create_room(conn_id, player_id, player_name)
            .await
            .map(drop),
        ClientMessage::Join {
            room_id,
            player_id,
            player_name,
        } => state
            .store
            .join(conn_id, &room_id, player_id, player_name)
            .await
            .map(drop),
        ClientMessage::Leave { room_id, player_id } => state
            .store
            .leave(conn_id, &room_id, &player_id)
            .await
            .map(drop),
        ClientMessage::Start { room_id, player_id } => {
            timer(state, TimerOp::Start, room_id, player_id).await
        }
        ClientMessage::Pause { room_id, player_id } => {
            timer(state, TimerOp::Pause, room_id, player_id).await
        }
        ClientMessage::Resume { room_id, player_id } => {
            timer(state, TimerOp::Resume, room_id, player_id).await
        }
        ClientMessage::Stop { room_id, player_id } => {
            timer(state, TimerOp::Stop, room_id, player_id).await
        }
        ClientMessage::EndTurn { room_id, player_id } => {
            timer(state, TimerOp::EndTurn, room_id, player_id).await
        }
    };

    if let Err(e) = result {
        reply(state, conn_id, ServerMessage::error(e));
    }
}

async fn timer<C: Codec>(
    state: &ServerState<C>,
    op: TimerOp,
    room_id: RoomId,
    player_id: PlayerId,
) -> Result<(), RoomError> {
    state
        .store
        .apply_timer(&room_id, op, &player_id)
        .await
        .map(drop)
}

fn reply<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    msg: ServerMessage,
) {
    if !state.broadcaster.send_to(conn_id, &msg) {
        tracing::debug!(%conn_id, "reply dropped, outbox closed");
    }
}
