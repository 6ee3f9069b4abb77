//! Wire protocol for Turnkeeper.
//!
//! This crate defines the "language" that browser clients and the server
//! speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`Room`], [`Player`],
//!   [`GameState`]): the JSON shapes that travel on the wire.
//! - **Identifiers** ([`RoomId`], [`PlayerId`]): newtypes that keep room
//!   codes and player ids apart, with room codes normalized on the way in.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the room
//! layer. It knows nothing about connections or locking, only how rooms
//! look on the wire.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Room store / timer
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, GameState, Player, PlayerId, Room, RoomId, ServerMessage,
    normalize_room_id,
};
