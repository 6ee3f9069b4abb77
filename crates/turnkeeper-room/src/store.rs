//! Room store: owns every live room and the connection registry.
//!
//! # Locking
//!
//! Each room sits in its own slot behind a `tokio::sync::Mutex`, so rooms
//! never wait on each other. Three kinds of lock exist and are always taken
//! in this order:
//!
//! ```text
//! room slot  →  sessions (ConnectionRegistry)  →  room map
//! ```
//!
//! The room map lock is only ever held for a lookup, insert or remove, and
//! never while waiting on another lock. A room is deleted while its slot is
//! locked: the slot is marked `retired` and then dropped from the map. Any
//! task that was already queued on that slot sees the mark after acquiring
//! it and goes back to the map, where it finds either nothing or a fresh
//! room.
//!
//! Every committed change is handed to the store's [`RoomObserver`] before
//! the room lock is released, so the observer sees one room's changes in
//! commit order.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use turnkeeper_protocol::{Player, PlayerId, Room, RoomId};
use turnkeeper_session::{Attachment, ConnectionRegistry};
use turnkeeper_transport::ConnectionId;

use crate::membership::{remove_player, upsert_player};
use crate::{
    Clock, RandomRoomIds, RoomError, RoomEvent, RoomIdGenerator,
    RoomObserver, SystemClock, TimerEngine, TimerOp,
};

/// How many fresh codes `create_room` draws before giving up.
pub const MAX_ID_ATTEMPTS: usize = 64;

type SharedSlot = Arc<Mutex<RoomSlot>>;
type SlotGuard = OwnedMutexGuard<RoomSlot>;

struct RoomSlot {
    room: Room,
    /// Set once the room has been removed from the map.
    retired: bool,
}

impl RoomSlot {
    fn shared(id: RoomId) -> SharedSlot {
        Arc::new(Mutex::new(Self {
            room: Room::new(id),
            retired: false,
        }))
    }
}

/// Result of [`RoomStore::create_room`].
#[derive(Debug, Clone)]
pub struct Created {
    pub room_id: RoomId,
    pub room: Room,
    pub player: Player,
    /// The connection's previous room, if creating moved it out of one.
    pub departure: Option<Departure>,
}

/// Result of [`RoomStore::join`].
#[derive(Debug, Clone)]
pub struct Joined {
    pub room: Room,
    pub player: Player,
    /// Connections in the room after the join, joiner included.
    pub members: Vec<ConnectionId>,
    pub departure: Option<Departure>,
}

/// A player leaving a room, explicitly or by disconnecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    /// Connections still in the room, who should hear about it.
    pub members: Vec<ConnectionId>,
    /// `true` if the room was empty afterwards and got deleted.
    pub room_deleted: bool,
}

/// Result of [`RoomStore::apply_timer`].
#[derive(Debug, Clone)]
pub struct TimerUpdate {
    pub room: Room,
    pub members: Vec<ConnectionId>,
}

/// All live rooms, their per-room locks, and who is connected to each.
///
/// Shared between connection tasks behind an `Arc`. Every operation
/// returns owned snapshots and no lock outlives the call.
pub struct RoomStore {
    rooms: Mutex<HashMap<RoomId, SharedSlot>>,
    sessions: Mutex<ConnectionRegistry>,
    clock: Arc<dyn Clock>,
    ids: Box<dyn RoomIdGenerator>,
    observer: Arc<dyn RoomObserver>,
}

impl RoomStore {
    /// An empty store on the system clock with random room codes.
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            sessions: Mutex::new(ConnectionRegistry::new()),
            clock: Arc::new(SystemClock::new()),
            ids: Box::new(RandomRoomIds),
            observer: Arc::new(()),
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the room code generator.
    pub fn id_generator(mut self, ids: impl RoomIdGenerator) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Sends every committed change to `observer`.
    pub fn observer(mut self, observer: Arc<dyn RoomObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Creates a new, empty room and puts the caller in it.
    ///
    /// The code is always fresh: candidates that name a live room are
    /// discarded. If `conn` was attached elsewhere it is released first.
    pub async fn create_room(
        &self,
        conn: ConnectionId,
        player_id: PlayerId,
        player_name: String,
    ) -> Result<Created, RoomError> {
        let departure = self.release_previous(conn, None).await;

        let mut slot = self.allocate().await?;
        let room_id = slot.room.id.clone();
        tracing::info!(%room_id, %conn, %player_id, "room created");

        let (player, _members) =
            self.admit(&mut slot, conn, player_id, player_name).await;

        let created = Created {
            room_id,
            room: slot.room.clone(),
            player,
            departure,
        };
        self.observer.committed(RoomEvent::Created {
            conn,
            created: &created,
        });
        Ok(created)
    }

    /// Adds the caller to `room_id`, creating the room if it isn't live.
    ///
    /// Re-joining with a known player id replaces that player's entry.
    /// If `conn` was attached to a different room, that attachment is
    /// released first, exactly as a disconnect would. If it spoke for a
    /// different player in this same room, that player is removed and the
    /// room keeps its timer and totals.
    pub async fn join(
        &self,
        conn: ConnectionId,
        room_id: &RoomId,
        player_id: PlayerId,
        player_name: String,
    ) -> Result<Joined, RoomError> {
        let departure = self.release_previous(conn, Some(room_id)).await;

        let mut slot = self.open_or_create(room_id).await;
        let departure = match departure {
            Some(departure) => Some(departure),
            None => self.replace_speaker(&mut slot, conn, &player_id).await,
        };
        let (player, members) =
            self.admit(&mut slot, conn, player_id, player_name).await;
        tracing::info!(
            %room_id,
            %conn,
            player_id = %player.id,
            players = slot.room.players.len(),
            "player joined"
        );

        let joined = Joined {
            room: slot.room.clone(),
            player,
            members,
            departure,
        };
        self.observer.committed(RoomEvent::Joined {
            conn,
            joined: &joined,
        });
        Ok(joined)
    }

    /// Removes `player_id` from `room_id`.
    ///
    /// `conn` is detached only if it is attached as that very player in
    /// that very room; a leave on someone else's behalf edits the player
    /// list and nothing more.
    pub async fn leave(
        &self,
        conn: ConnectionId,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Result<Departure, RoomError> {
        let mut slot = self.lock_existing(room_id).await?;
        remove_player(&mut slot.room, player_id);

        let mut sessions = self.sessions.lock().await;
        if sessions
            .attachment(conn)
            .is_some_and(|a| a.is(room_id, player_id))
        {
            sessions.detach(conn);
        }
        let members = sessions.members(room_id);
        let room_deleted = self.settle(&mut slot, &sessions).await;
        drop(sessions);
        tracing::info!(%room_id, %conn, %player_id, room_deleted, "player left");

        let departure = Departure {
            room_id: room_id.clone(),
            player_id: player_id.clone(),
            members,
            room_deleted,
        };
        self.observer.committed(RoomEvent::Departed(&departure));
        Ok(departure)
    }

    /// Implicit leave for a connection that has gone away.
    ///
    /// Returns `None` if the connection wasn't attached anywhere.
    pub async fn disconnect(&self, conn: ConnectionId) -> Option<Departure> {
        loop {
            let attachment = self.attachment(conn).await?;
            let Attachment { room_id, player_id } = &attachment;

            let Ok(mut slot) = self.lock_existing(room_id).await else {
                // Room already gone: only the registry entry is left.
                let mut sessions = self.sessions.lock().await;
                if sessions.attachment(conn) == Some(&attachment) {
                    sessions.detach(conn);
                    return None;
                }
                continue;
            };

            let mut sessions = self.sessions.lock().await;
            if sessions.attachment(conn) != Some(&attachment) {
                continue;
            }
            sessions.detach(conn);
            remove_player(&mut slot.room, player_id);
            let members = sessions.members(room_id);
            let room_deleted = self.settle(&mut slot, &sessions).await;
            drop(sessions);
            tracing::info!(
                %room_id,
                %conn,
                %player_id,
                room_deleted,
                "player disconnected"
            );

            let departure = Departure {
                room_id: room_id.clone(),
                player_id: player_id.clone(),
                members,
                room_deleted,
            };
            self.observer.committed(RoomEvent::Departed(&departure));
            return Some(departure);
        }
    }

    /// Runs a timer transition on `room_id`, reading the clock once.
    pub async fn apply_timer(
        &self,
        room_id: &RoomId,
        op: TimerOp,
        player_id: &PlayerId,
    ) -> Result<TimerUpdate, RoomError> {
        let mut slot = self.lock_existing(room_id).await?;
        let now = self.clock.now_ms();

        if let Err(e) = TimerEngine::apply(&mut slot.room, op, player_id, now)
        {
            tracing::debug!(%room_id, %player_id, error = %e, "timer op rejected");
            return Err(e);
        }
        tracing::info!(
            %room_id,
            %player_id,
            %op,
            state = %slot.room.game_state,
            "timer updated"
        );

        let members = self.sessions.lock().await.members(room_id);
        let update = TimerUpdate {
            room: slot.room.clone(),
            members,
        };
        self.observer.committed(RoomEvent::TimerUpdated(&update));
        Ok(update)
    }

    /// Snapshot of a live room.
    pub async fn room(&self, room_id: &RoomId) -> Option<Room> {
        let slot = self.lock_existing(room_id).await.ok()?;
        Some(slot.room.clone())
    }

    /// Connections currently in `room_id`.
    pub async fn members(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.sessions.lock().await.members(room_id)
    }

    /// Where `conn` is attached, if anywhere.
    pub async fn attachment(&self, conn: ConnectionId) -> Option<Attachment> {
        self.sessions.lock().await.attachment(conn).cloned()
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Codes of all live rooms, sorted.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> =
            self.rooms.lock().await.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Locks a live room, following retirements until it finds one.
    async fn lock_existing(
        &self,
        room_id: &RoomId,
    ) -> Result<SlotGuard, RoomError> {
        loop {
            let slot = self.rooms.lock().await.get(room_id).cloned();
            let slot = slot.ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
            let guard = slot.lock_owned().await;
            if !guard.retired {
                return Ok(guard);
            }
        }
    }

    /// Locks `room_id`, inserting a fresh room if none is live.
    async fn open_or_create(&self, room_id: &RoomId) -> SlotGuard {
        loop {
            let slot = {
                let mut rooms = self.rooms.lock().await;
                let slot = rooms.entry(room_id.clone()).or_insert_with(|| {
                    tracing::info!(%room_id, "room opened by join");
                    RoomSlot::shared(room_id.clone())
                });
                Arc::clone(slot)
            };
            let guard = slot.lock_owned().await;
            if !guard.retired {
                return guard;
            }
        }
    }

    /// Draws codes until one is free and inserts a new room under it,
    /// already locked, so nobody can see it half-initialised.
    async fn allocate(&self) -> Result<SlotGuard, RoomError> {
        let mut rooms = self.rooms.lock().await;
        for _ in 0..MAX_ID_ATTEMPTS {
            let room_id = self.ids.generate();
            if room_id.is_empty() || rooms.contains_key(&room_id) {
                tracing::debug!(%room_id, "room code unavailable, redrawing");
                continue;
            }
            let slot = RoomSlot::shared(room_id.clone());
            // A brand-new mutex is always free.
            let Ok(guard) = Arc::clone(&slot).try_lock_owned() else {
                continue;
            };
            rooms.insert(room_id, slot);
            return Ok(guard);
        }
        tracing::warn!(attempts = MAX_ID_ATTEMPTS, "room code space exhausted");
        Err(RoomError::IdSpaceExhausted(MAX_ID_ATTEMPTS))
    }

    /// Puts the player in the locked room and attaches `conn` to them.
    async fn admit(
        &self,
        slot: &mut SlotGuard,
        conn: ConnectionId,
        player_id: PlayerId,
        player_name: String,
    ) -> (Player, Vec<ConnectionId>) {
        let player = Player {
            id: player_id,
            name: player_name,
            joined_at: self.clock.now_ms(),
        };
        upsert_player(&mut slot.room, player.clone());

        let room_id = slot.room.id.clone();
        let mut sessions = self.sessions.lock().await;
        sessions.attach(conn, room_id.clone(), player.id.clone());
        (player, sessions.members(&room_id))
    }

    /// Moves `conn` off another player in the locked room, if it speaks for
    /// one. Never deletes the room: `conn` is re-attached right after.
    async fn replace_speaker(
        &self,
        slot: &mut SlotGuard,
        conn: ConnectionId,
        player_id: &PlayerId,
    ) -> Option<Departure> {
        let room_id = slot.room.id.clone();
        let mut sessions = self.sessions.lock().await;
        let previous = sessions
            .attachment(conn)
            .filter(|a| a.room_id == room_id && &a.player_id != player_id)?
            .player_id
            .clone();
        sessions.detach(conn);
        let members = sessions.members(&room_id);
        drop(sessions);

        remove_player(&mut slot.room, &previous);
        tracing::info!(
            %room_id,
            %conn,
            from = %previous,
            to = %player_id,
            "connection switched player"
        );

        let departure = Departure {
            room_id,
            player_id: previous,
            members,
            room_deleted: false,
        };
        self.observer.committed(RoomEvent::Departed(&departure));
        Some(departure)
    }

    /// Deletes the locked room if it has neither players nor connections.
    async fn settle(
        &self,
        slot: &mut SlotGuard,
        sessions: &ConnectionRegistry,
    ) -> bool {
        let room_id = &slot.room.id;
        if !slot.room.players.is_empty() || sessions.has_members(room_id) {
            return false;
        }
        self.rooms.lock().await.remove(room_id);
        tracing::info!(%room_id, "room deleted");
        slot.retired = true;
        true
    }

    /// Releases `conn`'s current attachment unless it is in `target`.
    async fn release_previous(
        &self,
        conn: ConnectionId,
        target: Option<&RoomId>,
    ) -> Option<Departure> {
        let current = self.attachment(conn).await?;
        if target.is_some_and(|room_id| current.room_id == *room_id) {
            return None;
        }
        self.disconnect(conn).await
    }
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new()
    }
}
