//! Live session tracking for Turnkeeper.
//!
//! One WebSocket connection is one participant's live session. This crate
//! records which room and player each connection speaks for, and the
//! reverse view the broadcaster needs: every connection in a room.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)      ← owns the registry, consults it for deletion
//!     ↕
//! Session Layer (this crate)  ← connection ⇄ (room, player)
//!     ↕
//! Protocol / Transport (below) ← RoomId, PlayerId, ConnectionId
//! ```

mod registry;

pub use registry::{Attachment, ConnectionRegistry, Detached};
