//! Player-list mutations on a [`Room`].
//!
//! These never touch the timer fields, apart from seeding a newcomer's
//! total at zero. They are legal in every game state.

use turnkeeper_protocol::{Player, PlayerId, Room};

/// Adds `player`, replacing any entry with the same id.
///
/// The replacement goes to the end of the list, exactly like a fresh
/// join. An existing total is kept; a new player's total starts at 0.
pub(crate) fn upsert_player(room: &mut Room, player: Player) {
    room.players.retain(|p| p.id != player.id);
    room.player_totals.entry(player.id.clone()).or_insert(0);
    room.players.push(player);
}

/// Removes the player with `id`. Returns `false` if there was none.
///
/// The player's total stays in `player_totals` for the rest of the
/// room's lifetime.
pub(crate) fn remove_player(room: &mut Room, id: &PlayerId) -> bool {
    let before = room.players.len();
    room.players.retain(|p| &p.id != id);
    room.players.len() != before
}
