//! Core protocol types for Turnkeeper's wire format.
//!
//! Every type in this module is something that gets serialized to JSON,
//! sent over a WebSocket, and parsed by a browser on the other side. The
//! serde attributes therefore pin down the exact JSON shape: camelCase
//! field names, a `type` discriminator on messages, and upper-case game
//! states.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Canonical form of an externally supplied room code: trimmed and
/// upper-cased, so `" wxyz "` and `"WXYZ"` name the same room.
pub fn normalize_room_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// A room code, always stored in normalized form.
///
/// The only ways to build a `RoomId` ([`RoomId::new`], `From<String>`, and
/// deserialization, which goes through `From<String>`) all normalize, so two
/// `RoomId`s compare equal exactly when players would consider the codes
/// the same.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Normalizes `raw` and wraps it.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize_room_id(raw.as_ref()))
    }

    /// Returns the normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the code is empty after normalization.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for RoomId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for RoomId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque, client-chosen player identifier.
///
/// The server never interprets it beyond equality. `#[serde(transparent)]`
/// keeps it a plain JSON string, which also lets it be a JSON object key
/// inside [`Room::player_totals`].
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wraps a raw id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Room model
// ---------------------------------------------------------------------------

/// A participant in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Client-supplied identity.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Server clock reading (ms since the Unix epoch) at join time.
    pub joined_at: u64,
}

/// The turn timer's state.
///
/// ```text
///            start              pause
///   STOPPED ───────→ RUNNING ───────→ PAUSED
///      ↑              │  ↑ end_turn      │
///      │     stop     │  └──┘            │ resume
///      └──────────────┴──────────────────┘ (stop from any state)
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    /// No turn is open. Initial state.
    #[default]
    Stopped,
    /// A turn is open and time is accruing from `anchor_time`.
    Running,
    /// A turn is open but time is frozen in `accrued_paused_time`.
    Paused,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "STOPPED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Paused => write!(f, "PAUSED"),
        }
    }
}

/// Full public snapshot of a room, as broadcast to every member.
///
/// All times are milliseconds. The server never stores "elapsed" while
/// running: clients (and the server) reconstruct the open turn's duration
/// as `accrued_paused_time + (now - anchor_time)` when `anchor_time` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Normalized room code.
    pub id: RoomId,
    /// Players in join order, unique by id.
    pub players: Vec<Player>,
    /// Timer state.
    pub game_state: GameState,
    /// Accumulated turn time per player, for every player that has joined
    /// during this room's lifetime.
    pub player_totals: BTreeMap<PlayerId, u64>,
    /// Start of the current running interval. `Some` iff `Running`.
    pub anchor_time: Option<u64>,
    /// Time already banked for the current open turn.
    pub accrued_paused_time: u64,
}

impl Room {
    /// A fresh, empty, stopped room.
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            players: Vec::new(),
            game_state: GameState::Stopped,
            player_totals: BTreeMap::new(),
            anchor_time: None,
            accrued_paused_time: 0,
        }
    }

    /// Accumulated total for `id`, if the player has ever joined.
    pub fn total_for(&self, id: &PlayerId) -> Option<u64> {
        self.player_totals.get(id).copied()
    }
}

// ---------------------------------------------------------------------------
// ClientMessage: browser → server
// ---------------------------------------------------------------------------

/// Every message a client may send.
///
/// Internally tagged on `type` with snake_case tags and camelCase fields,
/// so `ClientMessage::EndTurn { .. }` is
/// `{ "type": "end_turn", "roomId": "ABCD", "playerId": "p1" }`.
/// Anything that does not match one of these shapes is rejected by the
/// codec as malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Allocate a brand-new room and join it.
    CreateRoom {
        player_id: PlayerId,
        player_name: String,
    },
    /// Join (creating if needed) the named room.
    Join {
        room_id: RoomId,
        player_id: PlayerId,
        player_name: String,
    },
    /// Leave the named room.
    Leave { room_id: RoomId, player_id: PlayerId },
    /// STOPPED → RUNNING.
    Start { room_id: RoomId, player_id: PlayerId },
    /// RUNNING → PAUSED.
    Pause { room_id: RoomId, player_id: PlayerId },
    /// PAUSED → RUNNING.
    Resume { room_id: RoomId, player_id: PlayerId },
    /// Any → STOPPED.
    Stop { room_id: RoomId, player_id: PlayerId },
    /// Close the current turn, credit it to `player_id`, stay RUNNING.
    EndTurn { room_id: RoomId, player_id: PlayerId },
}

impl ClientMessage {
    /// The wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create_room",
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::Start { .. } => "start",
            Self::Pause { .. } => "pause",
            Self::Resume { .. } => "resume",
            Self::Stop { .. } => "stop",
            Self::EndTurn { .. } => "end_turn",
        }
    }

    /// The room this message targets. `None` only for `create_room`.
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Self::CreateRoom { .. } => None,
            Self::Join { room_id, .. }
            | Self::Leave { room_id, .. }
            | Self::Start { room_id, .. }
            | Self::Pause { room_id, .. }
            | Self::Resume { room_id, .. }
            | Self::Stop { room_id, .. }
            | Self::EndTurn { room_id, .. } => Some(room_id),
        }
    }

    /// The acting player.
    pub fn player_id(&self) -> &PlayerId {
        match self {
            Self::CreateRoom { player_id, .. }
            | Self::Join { player_id, .. }
            | Self::Leave { player_id, .. }
            | Self::Start { player_id, .. }
            | Self::Pause { player_id, .. }
            | Self::Resume { player_id, .. }
            | Self::Stop { player_id, .. }
            | Self::EndTurn { player_id, .. } => player_id,
        }
    }

    /// Rejects messages that parsed but carry blank identifiers.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] naming the blank field.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.player_id().as_str().trim().is_empty() {
            return Err(ProtocolError::InvalidMessage(format!(
                "{}: playerId must not be empty",
                self.kind()
            )));
        }
        if self.room_id().is_some_and(RoomId::is_empty) {
            return Err(ProtocolError::InvalidMessage(format!(
                "{}: roomId must not be empty",
                self.kind()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ServerMessage: server → browser
// ---------------------------------------------------------------------------

/// Every message the server sends.
///
/// | variant              | delivery                              |
/// |----------------------|---------------------------------------|
/// | `RoomCreated`        | reply to the creator                  |
/// | `RoomState`          | reply to the joiner                   |
/// | `PlayerJoined`       | broadcast, joiner excluded            |
/// | `PlayerLeft`         | broadcast                             |
/// | `TimerStateUpdate`   | broadcast, actor included             |
/// | `Error`              | reply to the originating connection   |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    RoomCreated { room_id: RoomId, room: Room },
    RoomState { room: Room },
    PlayerJoined { player: Player },
    PlayerLeft { player_id: PlayerId },
    TimerStateUpdate { room: Room },
    Error { message: String },
}

impl ServerMessage {
    /// Builds an `error` reply from anything displayable.
    pub fn error(reason: impl fmt::Display) -> Self {
        Self::Error {
            message: reason.to_string(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
