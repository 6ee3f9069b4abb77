//! Transport abstraction layer for Turnkeeper.
//!
//! Provides the [`Transport`] and [`Connection`] traits that the server is
//! written against, plus a WebSocket implementation. Everything above this
//! crate only ever sees whole messages as byte slices and a stable
//! [`ConnectionId`] per peer.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport, WebSocketUpgrade};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
///
/// Ids are allocated from a process-wide counter and never reused, so a
/// `ConnectionId` seen after a peer disconnects can never alias a newer
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// A peer that has connected but not finished its handshake.
    type Incoming: Incoming<Connection = Self::Connection, Error = Self::Error>;
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer.
    ///
    /// Only the socket-level accept happens here. The protocol handshake is
    /// left to [`Incoming::establish`], so a peer that never speaks cannot
    /// hold up the listener.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// Stops accepting new connections. Connections already handed out
    /// are unaffected.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A freshly accepted peer, waiting for its handshake.
pub trait Incoming: Send + 'static {
    /// The connection type produced by a successful handshake.
    type Connection: Connection;
    /// The error type for a failed handshake.
    type Error: std::error::Error + Send + Sync;

    /// Address of the remote peer.
    fn peer_addr(&self) -> SocketAddr;

    /// Runs the handshake and returns the ready connection.
    ///
    /// No deadline is applied here; callers wrap this in a timeout.
    async fn establish(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive whole messages.
///
/// `send` and `recv` may be called concurrently from different tasks:
/// implementations keep the read and write halves independent so a reader
/// parked in `recv` never delays an outbound message.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one message to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
