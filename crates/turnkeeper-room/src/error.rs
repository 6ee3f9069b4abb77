//! Error types for the room layer.

use turnkeeper_protocol::{GameState, RoomId};

use crate::TimerOp;

/// Errors that can occur during room operations.
///
/// Every variant is reported to the originating connection only, as an
/// `error` message carrying the `Display` text. None of them leave a room
/// partially mutated: preconditions are checked before any field is
/// written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (never created, or deleted once empty).
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The timer operation is illegal in the room's current state,
    /// e.g. `start` while already running.
    #[error("cannot {op}: current state is {state}")]
    InvalidTransition {
        /// The rejected operation.
        op: TimerOp,
        /// The state it was attempted in.
        state: GameState,
    },

    /// Every freshly drawn room code collided with a live room.
    #[error("no free room code after {0} attempts")]
    IdSpaceExhausted(usize),
}
