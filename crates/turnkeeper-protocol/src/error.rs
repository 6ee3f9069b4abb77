//! Error types for the protocol layer.
//!
//! Each crate in Turnkeeper defines its own error enum. A `ProtocolError`
//! always means the bytes could not be turned into (or produced from) a
//! message, never that the message itself was rejected by the room layer.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, an unknown `type` tag, missing
    /// required fields, or wrong data types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message is invalid at the protocol level even though it parsed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
