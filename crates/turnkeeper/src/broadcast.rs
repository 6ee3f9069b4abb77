//! Fan-out of server messages to connections.
//!
//! Every connection has one outbound queue (its "outbox"), drained by that
//! connection's writer task. Replies and broadcasts go through the same
//! queue, so a client always sees them in the order they were enqueued.
//!
//! Enqueueing never blocks and never does I/O, so the broadcaster runs as
//! the room store's observer, inside the room lock. A queue whose writer has
//! gone away is simply skipped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use turnkeeper_protocol::{Codec, ServerMessage};
use turnkeeper_room::{RoomEvent, RoomObserver};
use turnkeeper_transport::ConnectionId;

/// One encoded message, shared by every recipient.
pub type Frame = Arc<[u8]>;

/// Receiving end of a connection's outbox.
pub type OutboxReceiver = mpsc::UnboundedReceiver<Frame>;

/// Routes encoded [`ServerMessage`]s into per-connection queues.
///
/// The outbox map sits behind a `std` mutex: it is only held to push onto
/// unbounded channels, never across an `.await`.
pub struct Broadcaster<C: Codec> {
    outboxes: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<Frame>>>,
    codec: C,
}

impl<C: Codec> Broadcaster<C> {
    /// Creates a broadcaster with no connections.
    pub fn new(codec: C) -> Self {
        Self {
            outboxes: Mutex::new(HashMap::new()),
            codec,
        }
    }

    /// Opens an outbox for `conn` and returns its receiving end.
    ///
    /// Registering the same connection twice replaces the old queue.
    pub fn register(&self, conn: ConnectionId) -> OutboxReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outboxes().insert(conn, tx);
        rx
    }

    /// Closes `conn`'s outbox. The writer drains what is queued, then stops.
    pub fn unregister(&self, conn: ConnectionId) {
        self.outboxes().remove(&conn);
    }

    /// Encodes `event` once and queues it for every member except
    /// `exclude`.
    ///
    /// Best-effort: members without a live outbox are skipped. Returns
    /// how many queues accepted the frame.
    pub fn publish(
        &self,
        members: &[ConnectionId],
        event: &ServerMessage,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let Some(frame) = self.encode(event) else {
            return 0;
        };

        let outboxes = self.outboxes();
        let mut delivered = 0;
        for conn in members.iter().filter(|c| Some(**c) != exclude) {
            let sent = outboxes
                .get(conn)
                .is_some_and(|tx| tx.send(Arc::clone(&frame)).is_ok());
            if sent {
                delivered += 1;
            } else {
                tracing::debug!(%conn, "skipping closed outbox");
            }
        }
        delivered
    }

    /// Queues `event` for `conn` alone. Returns `false` if the connection
    /// has no live outbox.
    pub fn send_to(&self, conn: ConnectionId, event: &ServerMessage) -> bool {
        self.publish(&[conn], event, None) == 1
    }

    fn outboxes(
        &self,
    ) -> MutexGuard<'_, HashMap<ConnectionId, mpsc::UnboundedSender<Frame>>> {
        // Every critical section is a single map call, so a panic inside
        // one cannot leave the map half-updated.
        self.outboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn encode(&self, event: &ServerMessage) -> Option<Frame> {
        match self.codec.encode(event) {
            Ok(bytes) => Some(Frame::from(bytes)),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode server message");
                None
            }
        }
    }
}

/// Turns committed room changes into client messages.
impl<C: Codec> RoomObserver for Broadcaster<C> {
    fn committed(&self, event: RoomEvent<'_>) {
        match event {
            RoomEvent::Created { conn, created } => {
                let msg = ServerMessage::RoomCreated {
                    room_id: created.room_id.clone(),
                    room: created.room.clone(),
                };
                self.send_to(conn, &msg);
            }
            RoomEvent::Joined { conn, joined } => {
                let state = ServerMessage::RoomState {
                    room: joined.room.clone(),
                };
                self.send_to(conn, &state);
                let announce = ServerMessage::PlayerJoined {
                    player: joined.player.clone(),
                };
                self.publish(&joined.members, &announce, Some(conn));
            }
            RoomEvent::Departed(departure) => {
                let msg = ServerMessage::PlayerLeft {
                    player_id: departure.player_id.clone(),
                };
                self.publish(&departure.members, &msg, None);
            }
            RoomEvent::TimerUpdated(update) => {
                let msg = ServerMessage::TimerStateUpdate {
                    room: update.room.clone(),
                };
                self.publish(&update.members, &msg, None);
            }
        }
    }
}
