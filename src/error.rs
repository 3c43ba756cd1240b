//! Error types for the whole crate.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::ConnectionId;

/// This enum contains all error messages this library can return. Most fallible API functions
/// will generally return a [`Result<(), GridroomError>`].
///
/// Protocol errors (the first group of variants) are the ones a [`RoomAuthority`] reports back
/// to the offending channel as an `ERROR{message}` wire message; the message text is the
/// [`Display`] rendering of the variant.
///
/// [`Result<(), GridroomError>`]: std::result::Result
/// [`RoomAuthority`]: crate::RoomAuthority
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GridroomError {
    /// A request arrived for a room in which no game has been created yet.
    NoSession,
    /// A move was submitted by a connection that never joined the game.
    PlayerNotRegistered {
        /// The connection that sent the move.
        player: ConnectionId,
    },
    /// A move was submitted after the game already completed. Completion is terminal;
    /// the session is never mutated again.
    GameAlreadyComplete,
    /// A move referenced a cell outside the 9x9 grid.
    CellOutOfBounds {
        /// The row that was requested.
        row: u8,
        /// The column that was requested.
        col: u8,
    },
    /// A move carried a value outside the valid digit range.
    InvalidDigit {
        /// The value that was requested. Valid digits are 1 through 9.
        value: u8,
    },
    /// The client-side advisory legality check rejected a placement before sending it.
    /// The authority itself never enforces Sudoku legality.
    IllegalPlacement {
        /// The row of the rejected placement.
        row: u8,
        /// The column of the rejected placement.
        col: u8,
        /// The digit of the rejected placement.
        value: u8,
    },
    /// Serialization or deserialization of a wire message or stored snapshot failed.
    Serialization {
        /// A description of what failed to serialize/deserialize.
        context: String,
    },
    /// The room-scoped session store failed to read or write.
    Storage {
        /// A description of the storage failure.
        context: String,
    },
    /// A transport channel operation failed.
    Transport {
        /// A description of the transport failure.
        context: String,
    },
}

impl Display for GridroomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridroomError::NoSession => {
                write!(f, "No game in progress")
            }
            GridroomError::PlayerNotRegistered { player } => {
                write!(f, "Player {} not in game", player)
            }
            GridroomError::GameAlreadyComplete => {
                write!(f, "Game is already complete")
            }
            GridroomError::CellOutOfBounds { row, col } => {
                write!(f, "Cell ({}, {}) is outside the 9x9 grid", row, col)
            }
            GridroomError::InvalidDigit { value } => {
                write!(f, "Invalid digit {}: must be between 1 and 9", value)
            }
            GridroomError::IllegalPlacement { row, col, value } => {
                write!(
                    f,
                    "Placing {} at ({}, {}) conflicts with the current board",
                    value, row, col
                )
            }
            GridroomError::Serialization { context } => {
                write!(f, "Serialization error: {}", context)
            }
            GridroomError::Storage { context } => {
                write!(f, "Storage error: {}", context)
            }
            GridroomError::Transport { context } => {
                write!(f, "Transport error: {}", context)
            }
        }
    }
}

impl Error for GridroomError {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_server_wire_text() {
        // The two protocol errors the server emits verbatim on the wire.
        assert_eq!(GridroomError::NoSession.to_string(), "No game in progress");
        let err = GridroomError::PlayerNotRegistered {
            player: ConnectionId::new("conn-7"),
        };
        assert_eq!(err.to_string(), "Player conn-7 not in game");
    }

    #[test]
    fn display_mentions_offending_values() {
        let err = GridroomError::IllegalPlacement {
            row: 3,
            col: 4,
            value: 5,
        };
        let text = err.to_string();
        assert!(text.contains('3'));
        assert!(text.contains('4'));
        assert!(text.contains('5'));
    }

    #[test]
    fn errors_are_comparable_and_hashable() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(GridroomError::NoSession);
        set.insert(GridroomError::NoSession);
        assert_eq!(set.len(), 1);
    }
}
