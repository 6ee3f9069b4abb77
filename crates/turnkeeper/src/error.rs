//! Unified error type for Turnkeeper.

use turnkeeper_protocol::ProtocolError;
use turnkeeper_room::RoomError;
use turnkeeper_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TurnkeeperError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (not found, invalid transition).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Bad configuration, e.g. an unparsable `PORT`.
    #[error("invalid configuration: {0}")]
    Config(String),
}
