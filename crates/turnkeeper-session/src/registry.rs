//! The connection registry: which live connection speaks for which player
//! in which room.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is NOT thread-safe by itself; it is two plain
//! `HashMap`s. The room store owns it behind a mutex and only ever holds
//! that mutex for the duration of a map operation, never across I/O.
//! Keeping the type synchronous makes the two indices trivially
//! consistent: every method updates both before returning.

use std::collections::{HashMap, HashSet};

use turnkeeper_protocol::{PlayerId, RoomId};
use turnkeeper_transport::ConnectionId;

/// Where a connection is currently attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attachment {
    /// The room the connection belongs to.
    pub room_id: RoomId,
    /// The player the connection speaks for.
    pub player_id: PlayerId,
}

impl Attachment {
    /// Returns `true` if this attachment is for exactly `room_id`/`player_id`.
    pub fn is(&self, room_id: &RoomId, player_id: &PlayerId) -> bool {
        &self.room_id == room_id && &self.player_id == player_id
    }
}

/// Result of [`ConnectionRegistry::detach`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detached {
    /// The attachment that was removed.
    pub attachment: Attachment,
    /// `true` if the room has no live connections left, i.e. the room
    /// store should check whether the room can be deleted.
    pub room_vacant: bool,
}

/// Two indices over the same set of live connections.
///
/// ```text
/// by_connection:  conn-1 → (ABCD, alice)      by_room:  ABCD → {conn-1, conn-2}
///                 conn-2 → (ABCD, bob)                  WXYZ → {conn-3}
///                 conn-3 → (WXYZ, carol)
/// ```
///
/// Invariant: `c ∈ by_room[r]` ⇔ `by_connection[c].room_id == r`, and
/// `by_room` never holds an empty set.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    by_connection: HashMap<ConnectionId, Attachment>,
    by_room: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `conn` to `room_id` as `player_id`.
    ///
    /// A connection belongs to exactly one room/player at a time, so any
    /// previous attachment is replaced and returned. Callers that care
    /// about the old room becoming vacant should [`detach`](Self::detach)
    /// first.
    pub fn attach(
        &mut self,
        conn: ConnectionId,
        room_id: RoomId,
        player_id: PlayerId,
    ) -> Option<Attachment> {
        let previous = self.remove_indices(conn);

        self.by_room.entry(room_id.clone()).or_default().insert(conn);
        tracing::debug!(%conn, %room_id, %player_id, "connection attached");
        self.by_connection
            .insert(conn, Attachment { room_id, player_id });

        previous.map(|(attachment, _)| attachment)
    }

    /// Removes `conn` from both indices.
    ///
    /// Returns `None` if the connection was not attached.
    pub fn detach(&mut self, conn: ConnectionId) -> Option<Detached> {
        let (attachment, room_vacant) = self.remove_indices(conn)?;
        tracing::debug!(
            %conn,
            room_id = %attachment.room_id,
            player_id = %attachment.player_id,
            room_vacant,
            "connection detached"
        );
        Some(Detached {
            attachment,
            room_vacant,
        })
    }

    /// Current attachment for `conn`.
    pub fn attachment(&self, conn: ConnectionId) -> Option<&Attachment> {
        self.by_connection.get(&conn)
    }

    /// Live connections in `room_id`, in ascending id order (empty if the
    /// room is unknown).
    pub fn members(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        let mut members: Vec<ConnectionId> = self
            .by_room
            .get(room_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }

    /// Returns `true` if any live connection is attached to `room_id`.
    pub fn has_members(&self, room_id: &RoomId) -> bool {
        self.by_room.contains_key(room_id)
    }

    /// Number of attached connections.
    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    /// Returns `true` if no connection is attached.
    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }

    /// Drops `conn` from both maps. The boolean is `true` when that left
    /// its room without connections.
    fn remove_indices(
        &mut self,
        conn: ConnectionId,
    ) -> Option<(Attachment, bool)> {
        let attachment = self.by_connection.remove(&conn)?;
        let mut vacant = true;
        if let Some(set) = self.by_room.get_mut(&attachment.room_id) {
            set.remove(&conn);
            vacant = set.is_empty();
            if vacant {
                self.by_room.remove(&attachment.room_id);
            }
        }
        Some((attachment, vacant))
    }
}

// =========================================================================
// Tests
// =========================================================================
