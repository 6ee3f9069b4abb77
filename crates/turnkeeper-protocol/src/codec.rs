//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The server is generic over [`Codec`] so the wire format is a single
//! swap point; today the only implementation is [`JsonCodec`], which is
//! what browser clients parse.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds
///
/// - `Send + Sync` → one codec instance is shared by every connection
///   task, which Tokio may run on any worker thread.
/// - `'static` → the codec lives as long as the server.
///
/// `decode` asks for `DeserializeOwned` rather than `Deserialize<'de>`:
/// decoded messages outlive the frame buffer they came from.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Browser clients call `JSON.parse` on every frame, so this is the
/// production format, not just a debugging aid. It sits behind the
/// `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use turnkeeper_protocol::{ClientMessage, Codec, JsonCodec, RoomId};
///
/// let codec = JsonCodec;
/// let msg: ClientMessage = codec
///     .decode(br#"{"type":"start","roomId":" abcd ","playerId":"p1"}"#)
///     .unwrap();
///
/// assert_eq!(msg.room_id(), Some(&RoomId::new("ABCD")));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{GameState, Room, RoomId, ServerMessage};

    #[test]
    fn test_json_codec_encodes_server_message_as_json_text() {
        let msg = ServerMessage::Error {
            message: "room ABCD not found".into(),
        };
        let bytes = JsonCodec.encode(&msg).unwrap();
        let text = std::str::from_utf8(&bytes).expect("json is utf-8");
        assert_eq!(text, r#"{"type":"error","message":"room ABCD not found"}"#);
    }

    #[test]
    fn test_json_codec_decode_garbage_is_decode_error() {
        let result: Result<ServerMessage, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_decodes_room_snapshot() {
        let room = Room::new(RoomId::new("wxyz"));
        let bytes = JsonCodec.encode(&room).unwrap();
        let decoded: Room = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(decoded.id.as_str(), "WXYZ");
        assert_eq!(decoded.game_state, GameState::Stopped);
    }
}
