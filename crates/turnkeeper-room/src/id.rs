//! Room code generation.
//!
//! Codes are four characters from an alphabet with the easily misread
//! symbols removed (`I`, `L`, `O`, `0`, `1`), so a code read aloud or
//! copied by hand lands on the right room.

use rand::Rng;
use turnkeeper_protocol::RoomId;

/// Symbols a room code may contain.
pub const ROOM_ID_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Length of a generated room code.
pub const ROOM_ID_LEN: usize = 4;

/// Produces candidate room codes.
///
/// Implementations make no uniqueness promise; the room store checks each
/// candidate against the live rooms and draws again on a collision.
pub trait RoomIdGenerator: Send + Sync + 'static {
    /// Draws the next candidate code.
    fn generate(&self) -> RoomId;
}

/// Uniform random codes from the thread-local CSPRNG.
///
/// `rand::rng()` is a ChaCha-based generator seeded from the OS, so codes
/// can't be predicted from earlier ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomRoomIds;

impl RoomIdGenerator for RandomRoomIds {
    fn generate(&self) -> RoomId {
        generate_room_id()
    }
}

/// Draws one random room code.
pub fn generate_room_id() -> RoomId {
    let mut rng = rand::rng();
    let code: String = (0..ROOM_ID_LEN)
        .map(|_| {
            let idx = rng.random_range(0..ROOM_ID_ALPHABET.len());
            char::from(ROOM_ID_ALPHABET[idx])
        })
        .collect();
    RoomId::new(code)
}
