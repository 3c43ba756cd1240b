//! Two-layer client state: authoritative snapshots plus an optimistic overlay.
//!
//! The authoritative layer is the last full [`SessionState`] received from the room.
//! The overlay is the list of local moves sent but not yet confirmed; it is applied on
//! top of the player's board for display and discarded wholesale whenever a fresh
//! authoritative snapshot arrives. Confirmed moves mutate the authoritative layer
//! directly, so the overlay only ever holds in-flight placements.

use crate::net::wire::StateSnapshot;
use crate::{Board, ConnectionId, GameMode};

/// A locally issued placement awaiting server confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingMove {
    row: u8,
    col: u8,
    value: u8,
}

/// Client-side session view: the last authoritative snapshot with unconfirmed local
/// moves layered on top.
#[derive(Debug, Clone, Default)]
pub struct OptimisticOverlay {
    authoritative: Option<StateSnapshot>,
    pending: Vec<PendingMove>,
}

impl OptimisticOverlay {
    /// Creates an empty view with no session.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            authoritative: None,
            pending: Vec::new(),
        }
    }

    /// The last authoritative snapshot, if any has arrived.
    #[must_use]
    pub const fn authoritative(&self) -> Option<&StateSnapshot> {
        self.authoritative.as_ref()
    }

    /// Number of unconfirmed local moves.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Replaces the authoritative layer and discards the overlay.
    ///
    /// Full snapshots already reflect every move the server accepted, so any local
    /// moves still pending are either included or were rejected; keeping them layered
    /// on top would resurrect rejected placements.
    pub fn replace_authoritative(&mut self, state: StateSnapshot) {
        self.authoritative = Some(state);
        self.pending.clear();
    }

    /// Records a local placement as pending confirmation.
    pub fn push_pending(&mut self, row: u8, col: u8, value: u8) {
        self.pending.push(PendingMove { row, col, value });
    }

    /// Applies a confirmed move to the authoritative layer.
    ///
    /// The mover's board is always updated. In collaborative mode the placement also
    /// lands on every other board and the shared puzzle, matching what the room did
    /// server-side. A matching pending entry (same cell and value) is confirmed and
    /// removed from the overlay.
    pub fn apply_move(
        &mut self,
        player_id: &ConnectionId,
        row: u8,
        col: u8,
        value: u8,
        game_mode: GameMode,
    ) {
        let Some(state) = self.authoritative.as_mut() else {
            return;
        };
        let (r, c) = (usize::from(row), usize::from(col));
        match game_mode {
            GameMode::Collaborative => {
                let _ = state.puzzle.set(r, c, value);
                for entry in state.players.values_mut() {
                    let _ = entry.board.set(r, c, value);
                }
            }
            GameMode::Blind => {
                if let Some(entry) = state.players.get_mut(player_id) {
                    let _ = entry.board.set(r, c, value);
                }
            }
        }
        if let Some(index) = self
            .pending
            .iter()
            .position(|m| m.row == row && m.col == col && m.value == value)
        {
            self.pending.remove(index);
        }
    }

    /// Marks the session complete with the given winner.
    pub fn set_complete(&mut self, winner: ConnectionId) {
        if let Some(state) = self.authoritative.as_mut() {
            state.is_complete = true;
            state.winner = Some(winner);
        }
        self.pending.clear();
    }

    /// The board to display for the given identity: their registered board (or the
    /// shared puzzle if unregistered) with pending moves applied on top.
    #[must_use]
    pub fn effective_board(&self, id: &ConnectionId) -> Option<Board> {
        let state = self.authoritative.as_ref()?;
        let mut board = state
            .players
            .get(id)
            .map_or(state.puzzle, |entry| entry.board);
        for m in &self.pending {
            let _ = board.set(usize::from(m.row), usize::from(m.col), m.value);
        }
        Some(board)
    }

    /// Drops all client-side session state.
    pub fn clear(&mut self) {
        self.authoritative = None;
        self.pending.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::{Difficulty, SessionState};

    fn snapshot_with_players(mode: GameMode, ids: &[&str]) -> StateSnapshot {
        let mut state = SessionState::new(Board::empty(), Difficulty::Easy, mode);
        for id in ids {
            state.register_player(ConnectionId::new(*id));
        }
        state
    }

    #[test]
    fn no_board_before_first_snapshot() {
        let overlay = OptimisticOverlay::new();
        assert!(overlay.effective_board(&ConnectionId::new("p1")).is_none());
    }

    #[test]
    fn pending_moves_show_on_the_effective_board() {
        let mut overlay = OptimisticOverlay::new();
        overlay.replace_authoritative(snapshot_with_players(GameMode::Blind, &["p1"]));
        overlay.push_pending(3, 4, 7);

        let board = overlay.effective_board(&ConnectionId::new("p1")).unwrap();
        assert_eq!(board.cell(3, 4), Some(7));
        // The authoritative layer itself is untouched.
        let entry = &overlay.authoritative().unwrap().players[&ConnectionId::new("p1")];
        assert_eq!(entry.board.cell(3, 4), Some(0));
    }

    #[test]
    fn fresh_snapshot_discards_the_overlay() {
        let mut overlay = OptimisticOverlay::new();
        overlay.replace_authoritative(snapshot_with_players(GameMode::Blind, &["p1"]));
        overlay.push_pending(0, 0, 9);
        assert_eq!(overlay.pending_len(), 1);

        overlay.replace_authoritative(snapshot_with_players(GameMode::Blind, &["p1"]));
        assert_eq!(overlay.pending_len(), 0);
        let board = overlay.effective_board(&ConnectionId::new("p1")).unwrap();
        assert_eq!(board.cell(0, 0), Some(0));
    }

    #[test]
    fn confirmed_move_lands_on_the_authoritative_layer() {
        let mut overlay = OptimisticOverlay::new();
        overlay.replace_authoritative(snapshot_with_players(GameMode::Blind, &["p1", "p2"]));
        overlay.push_pending(2, 2, 5);

        overlay.apply_move(&ConnectionId::new("p1"), 2, 2, 5, GameMode::Blind);
        assert_eq!(overlay.pending_len(), 0);
        let state = overlay.authoritative().unwrap();
        assert_eq!(
            state.players[&ConnectionId::new("p1")].board.cell(2, 2),
            Some(5)
        );
        // Blind mode: the other board is untouched.
        assert_eq!(
            state.players[&ConnectionId::new("p2")].board.cell(2, 2),
            Some(0)
        );
    }

    #[test]
    fn collaborative_move_lands_on_every_board() {
        let mut overlay = OptimisticOverlay::new();
        overlay.replace_authoritative(snapshot_with_players(
            GameMode::Collaborative,
            &["p1", "p2"],
        ));

        overlay.apply_move(&ConnectionId::new("p2"), 6, 1, 4, GameMode::Collaborative);
        let state = overlay.authoritative().unwrap();
        assert_eq!(state.puzzle.cell(6, 1), Some(4));
        assert_eq!(
            state.players[&ConnectionId::new("p1")].board.cell(6, 1),
            Some(4)
        );
        assert_eq!(
            state.players[&ConnectionId::new("p2")].board.cell(6, 1),
            Some(4)
        );
    }

    #[test]
    fn unregistered_viewer_sees_the_shared_puzzle() {
        let mut overlay = OptimisticOverlay::new();
        let mut state = snapshot_with_players(GameMode::Blind, &["p1"]);
        state.puzzle.set(8, 8, 1).unwrap();
        overlay.replace_authoritative(state);

        let board = overlay.effective_board(&ConnectionId::new("stranger")).unwrap();
        assert_eq!(board.cell(8, 8), Some(1));
    }

    #[test]
    fn completion_records_the_winner_and_clears_pending() {
        let mut overlay = OptimisticOverlay::new();
        overlay.replace_authoritative(snapshot_with_players(GameMode::Blind, &["p1"]));
        overlay.push_pending(0, 0, 2);

        overlay.set_complete(ConnectionId::new("p1"));
        let state = overlay.authoritative().unwrap();
        assert!(state.is_complete);
        assert_eq!(state.winner, Some(ConnectionId::new("p1")));
        assert_eq!(overlay.pending_len(), 0);
    }
}
