//! Notifications for committed room changes.

use turnkeeper_transport::ConnectionId;

use crate::{Created, Departure, Joined, TimerUpdate};

/// A change the store has just committed.
///
/// Observers see it while the room is still locked, so two events for the
/// same room always arrive in the order they were committed.
#[derive(Debug, Clone, Copy)]
pub enum RoomEvent<'a> {
    /// `conn` created a room and is its first member.
    Created {
        conn: ConnectionId,
        created: &'a Created,
    },
    /// `conn` joined a room.
    Joined {
        conn: ConnectionId,
        joined: &'a Joined,
    },
    /// A player left, explicitly or by disconnecting.
    Departed(&'a Departure),
    /// A timer op was applied.
    TimerUpdated(&'a TimerUpdate),
}

/// Receives [`RoomEvent`]s from a [`RoomStore`](crate::RoomStore).
///
/// Called with the room lock held. Implementations must not block and must
/// not call back into the store.
pub trait RoomObserver: Send + Sync + 'static {
    fn committed(&self, event: RoomEvent<'_>);
}

impl RoomObserver for () {
    fn committed(&self, _event: RoomEvent<'_>) {}
}
