//! The turn-timer state machine.
//!
//! Time is never ticked. A running turn is represented by the instant it
//! (re)started, `anchor_time`, plus whatever was banked before the last
//! pause, `accrued_paused_time`. Each transition reads "now" once and folds
//! the open interval into the right field.
//!
//! | Op        | Legal from | Result  |
//! |-----------|------------|---------|
//! | `start`   | STOPPED    | RUNNING |
//! | `pause`   | RUNNING    | PAUSED  |
//! | `resume`  | PAUSED     | RUNNING |
//! | `stop`    | any        | STOPPED |
//! | `end_turn`| RUNNING    | RUNNING |

use std::fmt;

use turnkeeper_protocol::{GameState, PlayerId, Room};

use crate::RoomError;

/// A timer command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerOp {
    Start,
    Pause,
    Resume,
    Stop,
    EndTurn,
}

impl TimerOp {
    /// Returns `true` if this op may be applied in `state`.
    pub fn permits(self, state: GameState) -> bool {
        match self {
            Self::Start => state == GameState::Stopped,
            Self::Pause | Self::EndTurn => state == GameState::Running,
            Self::Resume => state == GameState::Paused,
            Self::Stop => true,
        }
    }
}

impl fmt::Display for TimerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Start => "start timer",
            Self::Pause => "pause timer",
            Self::Resume => "resume timer",
            Self::Stop => "stop timer",
            Self::EndTurn => "end turn",
        };
        f.write_str(text)
    }
}

/// Applies [`TimerOp`]s to a [`Room`].
///
/// Stateless: everything lives in the room's fields. The caller holds the
/// room's lock and supplies `now` from its clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerEngine;

impl TimerEngine {
    /// Checks that `op` is legal for the room's current state.
    pub fn validate(room: &Room, op: TimerOp) -> Result<(), RoomError> {
        if op.permits(room.game_state) {
            Ok(())
        } else {
            Err(RoomError::InvalidTransition {
                op,
                state: room.game_state,
            })
        }
    }

    /// Applies `op` at time `now`.
    ///
    /// `player_id` is only read by `end_turn`, which credits the closed
    /// turn to that player. On error the room is untouched.
    pub fn apply(
        room: &mut Room,
        op: TimerOp,
        player_id: &PlayerId,
        now: u64,
    ) -> Result<(), RoomError> {
        Self::validate(room, op)?;

        match op {
            TimerOp::Start => {
                room.anchor_time = Some(now);
                room.accrued_paused_time = 0;
                room.game_state = GameState::Running;
            }
            TimerOp::Pause => {
                let open = Self::running_interval(room, now);
                room.accrued_paused_time =
                    room.accrued_paused_time.saturating_add(open);
                room.anchor_time = None;
                room.game_state = GameState::Paused;
            }
            TimerOp::Resume => {
                room.anchor_time = Some(now);
                room.game_state = GameState::Running;
            }
            TimerOp::Stop => {
                room.anchor_time = None;
                room.accrued_paused_time = 0;
                room.game_state = GameState::Stopped;
            }
            TimerOp::EndTurn => {
                let turn = Self::open_turn_elapsed(room, now);
                let total = room
                    .player_totals
                    .entry(player_id.clone())
                    .or_insert(0);
                *total = total.saturating_add(turn);
                room.accrued_paused_time = 0;
                room.anchor_time = Some(now);
            }
        }
        Ok(())
    }

    /// Duration of the open turn at `now`: banked time plus the current
    /// running interval, if any.
    pub fn open_turn_elapsed(room: &Room, now: u64) -> u64 {
        room.accrued_paused_time
            .saturating_add(Self::running_interval(room, now))
    }

    // A clock that stepped backwards yields zero, not an underflow.
    fn running_interval(room: &Room, now: u64) -> u64 {
        room.anchor_time
            .map(|anchor| now.saturating_sub(anchor))
            .unwrap_or(0)
    }
}
