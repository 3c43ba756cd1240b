//! # Gridroom
//!
//! Gridroom is a session synchronization engine for multiplayer Sudoku rooms, written in
//! 100% safe Rust. It provides the authoritative per-room state machine
//! ([`RoomAuthority`]) that owns puzzle/player/move state, and the client-side connection
//! protocol ([`ConnectionManager`]) that reconciles local optimistic edits against
//! authoritative broadcasts across disconnect/reconnect cycles.
//!
//! The crate is transport-agnostic: servers plug channels in behind [`RoomChannel`],
//! clients plug sockets in behind [`ClientTransport`], and persistence sits behind
//! [`SessionStore`]. In-memory implementations of all three ship with the crate, along
//! with a fault-injecting [`ChaosTransport`] for resilience testing.
//!
//! Both state machines are poll-driven: the caller pumps [`ConnectionManager::poll`]
//! from its own event loop and drains resulting [`RoomEvent`]s, while every
//! [`RoomAuthority`] mutation runs to completion on `&mut self`, so per-room writes are
//! serialized without explicit locks.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use serde::{Deserialize, Serialize};

pub use authority::RoomAuthority;
pub use board::Board;
pub use client::backoff::{Backoff, ReconnectPolicy};
pub use client::overlay::OptimisticOverlay;
pub use client::{ConnectionManager, ConnectionState, RoomEvent, PLAYER_COLORS};
pub use error::GridroomError;
pub use generator::{BacktrackingGenerator, GeneratedPuzzle, PuzzleSource};
pub use net::chaos::{ChaosConfig, ChaosTransport};
pub use net::transport::{
    ClientTransport, Connector, MemoryEndpoint, MemoryTransport, RoomChannel, TransportEvent,
};
pub use net::wire::{ClientMessage, ServerMessage, StateSnapshot};
pub use session_state::{PlayerEntry, SessionState};
pub use storage::{MemoryStore, SessionStore};

pub mod authority;
pub mod board;
pub mod client;
pub mod error;
pub mod generator;
/// Wire schema, codec, and transport abstractions.
pub mod net {
    pub mod chaos;
    /// JSON codec for wire message serialization.
    ///
    /// Provides centralized encoding and decoding of wire messages using serde_json.
    pub mod codec;
    pub mod transport;
    pub mod wire;
}
pub mod rng;
pub mod session_state;
pub mod storage;

// #############
// # CONSTANTS #
// #############

/// Side length of the Sudoku grid.
pub const GRID_SIZE: usize = 9;

/// Side length of one 3x3 constraint box.
pub const BOX_SIZE: usize = 3;

/// The cell value denoting an empty cell.
pub const EMPTY_CELL: u8 = 0;

/// Identity of one transport connection, used as the player registry key.
///
/// The identifier is assigned by the transport at connect time and is *not* stable
/// storage: a reconnect yields a new identifier. Identity continuity across reconnects
/// is therefore a protocol concern (the [`ConnectionManager`] re-joins and re-checks the
/// broadcast registry), not a transport guarantee.
///
/// # Type Safety
///
/// `ConnectionId` is a newtype wrapper around `String` that keeps connection identifiers
/// from being mixed up with other strings (room names, wire payloads) at compile time.
///
/// # Examples
///
/// ```
/// use gridroom::ConnectionId;
///
/// let id = ConnectionId::new("conn-1");
/// assert_eq!(id.as_str(), "conn-1");
/// assert_eq!(id.to_string(), "conn-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Creates a new `ConnectionId` from anything string-like.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        ConnectionId(id.into())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        ConnectionId::new(value)
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        ConnectionId(value)
    }
}

/// How moves propagate between player boards, fixed at room creation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Each player solves an independent copy of the puzzle; moves are broadcast for
    /// display but do not alter other players' boards.
    Blind,
    /// All players share one logical board; every move is replicated to every player's
    /// board copy.
    Collaborative,
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameMode::Blind => write!(f, "blind"),
            GameMode::Collaborative => write!(f, "collaborative"),
        }
    }
}

/// Difficulty label requested at room creation and passed to the puzzle generator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    /// Roughly a third of the cells removed.
    Easy,
    /// Roughly 44% of the cells removed.
    Medium,
    /// Roughly 55% of the cells removed.
    Hard,
    /// Roughly two thirds of the cells removed.
    Diabolical,
}

impl Difficulty {
    /// Number of cells the generator blanks out for this difficulty.
    #[must_use]
    pub const fn cells_to_remove(self) -> usize {
        match self {
            Difficulty::Easy => 30,
            Difficulty::Medium => 40,
            Difficulty::Hard => 50,
            Difficulty::Diabolical => 60,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "Easy"),
            Difficulty::Medium => write!(f, "Medium"),
            Difficulty::Hard => write!(f, "Hard"),
            Difficulty::Diabolical => write!(f, "Diabolical"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_round_trips_through_serde() {
        let id = ConnectionId::new("abc-123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc-123\"");
        let back: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn game_mode_uses_lowercase_wire_names() {
        assert_eq!(serde_json::to_string(&GameMode::Blind).unwrap(), "\"blind\"");
        assert_eq!(
            serde_json::to_string(&GameMode::Collaborative).unwrap(),
            "\"collaborative\""
        );
    }

    #[test]
    fn difficulty_uses_capitalized_wire_names() {
        assert_eq!(serde_json::to_string(&Difficulty::Easy).unwrap(), "\"Easy\"");
        assert_eq!(
            serde_json::to_string(&Difficulty::Diabolical).unwrap(),
            "\"Diabolical\""
        );
    }

    #[test]
    fn removal_counts_scale_with_difficulty() {
        assert!(Difficulty::Easy.cells_to_remove() < Difficulty::Medium.cells_to_remove());
        assert!(Difficulty::Medium.cells_to_remove() < Difficulty::Hard.cells_to_remove());
        assert!(Difficulty::Hard.cells_to_remove() < Difficulty::Diabolical.cells_to_remove());
    }
}
