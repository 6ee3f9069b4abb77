//! # Turnkeeper
//!
//! Shared turn timers for tabletop games, served over WebSocket.
//!
//! Players join a room by its four-character code. Anyone in the room can
//! start, pause, resume or stop the clock, or end the current turn, which
//! credits the turn's elapsed time to a player. Every change is pushed to
//! all members as a full room snapshot.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use turnkeeper::prelude::*;
//!
//! # async fn demo() -> Result<(), TurnkeeperError> {
//! let server = TurnkeeperServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await
//! # }
//! ```

mod broadcast;
mod config;
mod error;
mod handler;
mod server;

pub use broadcast::{Broadcaster, Frame, OutboxReceiver};
pub use config::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_WS_PATH, ServerConfig};
pub use error::TurnkeeperError;
pub use handler::INVALID_MESSAGE;
pub use server::{
    DEFAULT_HANDSHAKE_TIMEOUT, TurnkeeperServer, TurnkeeperServerBuilder,
};

/// Everything needed to embed a server or drive one from tests.
pub mod prelude {
    pub use crate::{
        ServerConfig, TurnkeeperError, TurnkeeperServer,
        TurnkeeperServerBuilder,
    };
    pub use turnkeeper_protocol::{
        ClientMessage, GameState, Player, PlayerId, Room, RoomId,
        ServerMessage,
    };
    pub use turnkeeper_room::{Clock, ManualClock, SystemClock};
    pub use turnkeeper_session::Attachment;
}
