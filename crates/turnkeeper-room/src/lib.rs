//! Rooms and turn timers for Turnkeeper.
//!
//! A room is a small shared stopwatch: players join by code, and any of
//! them can start, pause, resume or stop the clock, or end the current
//! turn to credit its elapsed time to a player.
//!
//! # Key types
//!
//! - [`RoomStore`]: owns every live room, one lock per room
//! - [`TimerEngine`] / [`TimerOp`]: the timer state machine
//! - [`RoomObserver`]: hears every committed change, in commit order
//! - [`RoomIdGenerator`]: where new room codes come from
//! - [`Clock`]: the single source of "now"

mod clock;
mod error;
mod events;
mod id;
mod membership;
mod store;
mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::RoomError;
pub use events::{RoomEvent, RoomObserver};
pub use id::{
    ROOM_ID_ALPHABET, ROOM_ID_LEN, RandomRoomIds, RoomIdGenerator,
    generate_room_id,
};
pub use store::{
    Created, Departure, Joined, MAX_ID_ATTEMPTS, RoomStore, TimerUpdate,
};
pub use timer::{TimerEngine, TimerOp};
