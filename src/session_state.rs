//! The authoritative record for one room.
//!
//! A [`SessionState`] is exclusively owned and mutated by the
//! [`RoomAuthority`](crate::RoomAuthority); clients only ever hold read-only snapshots
//! received over the wire. The player registry is a real map in memory and a plain
//! JSON object on the wire/in storage; serde is the single canonical boundary between
//! the two forms, so no ad hoc reconstruction happens anywhere else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Board, ConnectionId, Difficulty, GameMode};

/// One registered player: their working board and score.
///
/// The board is seeded as a deep copy of the room's puzzle at join time and is the only
/// piece of per-player state the room tracks. Boards and scores are public within a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    /// The player's identity, duplicated from the registry key for wire compatibility.
    pub id: ConnectionId,
    /// The player's mutable working copy of the puzzle.
    pub board: Board,
    /// The player's score.
    pub score: u32,
}

impl PlayerEntry {
    /// Creates a fresh entry with a working board seeded from the puzzle.
    #[must_use]
    pub fn new(id: ConnectionId, puzzle: Board) -> Self {
        Self {
            id,
            board: puzzle,
            score: 0,
        }
    }
}

/// The authoritative state of one room, alive for the room's lifetime.
///
/// Field names serialize in the wire's camelCase form; the whole struct *is* the
/// `state` payload of `GAME_CREATED` / `PLAYER_JOINED` / `GAME_STATE` messages and the
/// value persisted to the [`SessionStore`](crate::SessionStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// The original puzzle, produced at room creation and never mutated afterwards.
    /// (In a `GAME_STATE` reply to a rejoining player this field carries that player's
    /// current board instead; see [`SessionState::snapshot_for`].)
    pub puzzle: Board,
    /// Registry of players keyed by connection identity. Unique keys, no ordering
    /// guarantee on the wire.
    pub players: BTreeMap<ConnectionId, PlayerEntry>,
    /// Milliseconds since the Unix epoch at room creation.
    pub start_time: u64,
    /// How moves propagate between boards; fixed at creation.
    pub game_mode: GameMode,
    /// Whether the game has completed. Transitions false to true exactly once.
    pub is_complete: bool,
    /// The winner, set exactly once together with `is_complete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<ConnectionId>,
    /// The difficulty label the room was created with.
    pub difficulty: Difficulty,
}

impl SessionState {
    /// Creates the state for a freshly generated puzzle with an empty player registry.
    #[must_use]
    pub fn new(puzzle: Board, difficulty: Difficulty, game_mode: GameMode) -> Self {
        Self {
            puzzle,
            players: BTreeMap::new(),
            start_time: millis_since_epoch(),
            game_mode,
            is_complete: false,
            winner: None,
            difficulty,
        }
    }

    /// Returns `true` if the given identity is registered in this room.
    #[must_use]
    pub fn is_registered(&self, id: &ConnectionId) -> bool {
        self.players.contains_key(id)
    }

    /// Registers a new player with a working board seeded from the puzzle.
    ///
    /// Callers must have checked [`is_registered`](Self::is_registered) first; join is
    /// idempotent at the [`RoomAuthority`](crate::RoomAuthority) layer, which routes a
    /// second join to the rejoin path instead of calling this.
    pub fn register_player(&mut self, id: ConnectionId) {
        self.players
            .insert(id.clone(), PlayerEntry::new(id, self.puzzle));
    }

    /// Produces the wire snapshot for a specific recipient.
    ///
    /// For a registered player the `puzzle` field is overridden with that player's
    /// current board, so a reconnecting client resumes exactly where it left off rather
    /// than at the blank puzzle. Unregistered recipients get the state as-is.
    #[must_use]
    pub fn snapshot_for(&self, recipient: &ConnectionId) -> SessionState {
        let mut snapshot = self.clone();
        if let Some(entry) = self.players.get(recipient) {
            snapshot.puzzle = entry.board;
        }
        snapshot
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub(crate) fn millis_since_epoch() -> u64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::GridroomError;

    fn sample_state() -> SessionState {
        let mut puzzle = Board::empty();
        puzzle.set(0, 0, 5).unwrap();
        SessionState::new(puzzle, Difficulty::Easy, GameMode::Blind)
    }

    #[test]
    fn new_state_starts_incomplete_with_empty_registry() {
        let state = sample_state();
        assert!(state.players.is_empty());
        assert!(!state.is_complete);
        assert!(state.winner.is_none());
        assert!(state.start_time > 0);
    }

    #[test]
    fn registering_seeds_board_from_puzzle() {
        let mut state = sample_state();
        state.register_player(ConnectionId::new("p1"));
        let entry = state.players.get(&ConnectionId::new("p1")).unwrap();
        assert_eq!(entry.board, state.puzzle);
        assert_eq!(entry.score, 0);
        assert_eq!(entry.id, ConnectionId::new("p1"));
    }

    #[test]
    fn player_board_is_a_deep_copy() -> Result<(), GridroomError> {
        let mut state = sample_state();
        state.register_player(ConnectionId::new("p1"));
        let entry = state
            .players
            .get_mut(&ConnectionId::new("p1"))
            .ok_or(GridroomError::NoSession)?;
        entry.board.set(1, 1, 9)?;
        // Mutating the player's board must never touch the origin puzzle.
        assert_eq!(state.puzzle.cell(1, 1), Some(0));
        Ok(())
    }

    #[test]
    fn snapshot_overrides_puzzle_for_registered_player() {
        let mut state = sample_state();
        state.register_player(ConnectionId::new("p1"));
        state
            .players
            .get_mut(&ConnectionId::new("p1"))
            .unwrap()
            .board
            .set(2, 2, 7)
            .unwrap();

        let snapshot = state.snapshot_for(&ConnectionId::new("p1"));
        assert_eq!(snapshot.puzzle.cell(2, 2), Some(7));

        // A stranger gets the shared origin puzzle.
        let stranger = state.snapshot_for(&ConnectionId::new("nobody"));
        assert_eq!(stranger.puzzle.cell(2, 2), Some(0));
    }

    #[test]
    fn wire_form_uses_camel_case_and_object_registry() {
        let mut state = sample_state();
        state.register_player(ConnectionId::new("p1"));
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("startTime").is_some());
        assert!(json.get("gameMode").is_some());
        assert!(json.get("isComplete").is_some());
        // Registry travels as a plain object keyed by connection id.
        assert!(json["players"].is_object());
        assert!(json["players"].get("p1").is_some());
        // winner is omitted until set.
        assert!(json.get("winner").is_none());
    }

    #[test]
    fn registry_round_trips_keys_and_values() {
        let mut state = sample_state();
        state.register_player(ConnectionId::new("a"));
        state.register_player(ConnectionId::new("b"));
        state
            .players
            .get_mut(&ConnectionId::new("b"))
            .unwrap()
            .board
            .set(4, 4, 3)
            .unwrap();

        let json = serde_json::to_string(&state).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.players.len(), 2);
        assert_eq!(back, state);
    }

    #[test]
    fn winner_survives_round_trip_once_set() {
        let mut state = sample_state();
        state.is_complete = true;
        state.winner = Some(ConnectionId::new("p2"));
        let json = serde_json::to_string(&state).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.winner, Some(ConnectionId::new("p2")));
        assert!(back.is_complete);
    }
}
