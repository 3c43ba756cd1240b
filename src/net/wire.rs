//! Wire message schema: room-scoped JSON envelopes with a `type` discriminator.
//!
//! These enums serialize to exactly the envelopes in the protocol tables: a
//! SCREAMING_SNAKE `type` field plus camelCase payload fields. The player registry
//! inside a state payload crosses the wire as a plain JSON object and is rebuilt into
//! map form by serde on receipt; see [`SessionState`].

use serde::{Deserialize, Serialize};

use crate::{ConnectionId, Difficulty, GameMode, SessionState};

/// Messages a client sends to the room authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Request a new game; replaces any existing session in the room.
    #[serde(rename = "CREATE_GAME")]
    CreateGame {
        /// Difficulty label passed through to the puzzle generator.
        difficulty: Difficulty,
        /// Propagation mode, fixed for the room's lifetime.
        #[serde(rename = "gameMode")]
        game_mode: GameMode,
    },
    /// Request registration in the current game. Carries no fields; identity is the
    /// transport-assigned connection id.
    #[serde(rename = "JOIN_GAME")]
    JoinGame,
    /// Place a value on the sender's board.
    #[serde(rename = "MAKE_MOVE")]
    MakeMove {
        /// Target row, `0..=8`.
        row: u8,
        /// Target column, `0..=8`.
        col: u8,
        /// Digit to place, `1..=9`.
        value: u8,
        /// The sender's claimed identity. The authority trusts the channel it arrived
        /// on, so this field is informational.
        #[serde(rename = "playerId")]
        player_id: ConnectionId,
    },
}

/// Messages the room authority sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A new game was created; carries the full session snapshot.
    #[serde(rename = "GAME_CREATED")]
    GameCreated {
        /// Full session snapshot.
        state: SessionState,
    },
    /// A player joined; carries the full updated snapshot (boards and scores are
    /// public within a room).
    #[serde(rename = "PLAYER_JOINED")]
    PlayerJoined {
        /// Full session snapshot.
        state: SessionState,
    },
    /// Current state, sent to a single channel on connect or rejoin. For a registered
    /// recipient `state.puzzle` is overridden with that player's current board.
    #[serde(rename = "GAME_STATE")]
    GameState {
        /// Session snapshot, possibly recipient-specific.
        state: SessionState,
    },
    /// A move was applied and broadcast to every channel in the room.
    #[serde(rename = "MOVE_MADE")]
    MoveMade {
        /// Who moved.
        #[serde(rename = "playerId")]
        player_id: ConnectionId,
        /// Target row.
        row: u8,
        /// Target column.
        col: u8,
        /// Placed digit.
        value: u8,
        /// The room's mode, so receivers know whether to apply the move to their own
        /// board as well.
        #[serde(rename = "gameMode")]
        game_mode: GameMode,
    },
    /// The game completed. Broadcast instead of (not in addition to) the final
    /// `MOVE_MADE`.
    #[serde(rename = "GAME_COMPLETE")]
    GameComplete {
        /// The player whose board completed first.
        winner: ConnectionId,
    },
    /// A request failed; sent only to the offending channel.
    #[serde(rename = "ERROR")]
    Error {
        /// Human-readable description, surfaced by view layers as a toast/log line.
        message: String,
    },
}

/// Alias kept for API clarity: the `state` payload of state-bearing server messages is
/// the full [`SessionState`] in wire form.
pub type StateSnapshot = SessionState;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::Board;

    #[test]
    fn create_game_envelope_matches_wire_shape() {
        let msg = ClientMessage::CreateGame {
            difficulty: Difficulty::Medium,
            game_mode: GameMode::Collaborative,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "CREATE_GAME");
        assert_eq!(json["difficulty"], "Medium");
        assert_eq!(json["gameMode"], "collaborative");
    }

    #[test]
    fn join_game_envelope_is_type_only() {
        let json = serde_json::to_value(&ClientMessage::JoinGame).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "JOIN_GAME" }));
    }

    #[test]
    fn make_move_envelope_uses_camel_case_player_id() {
        let msg = ClientMessage::MakeMove {
            row: 2,
            col: 3,
            value: 4,
            player_id: ConnectionId::new("c9"),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "MAKE_MOVE");
        assert_eq!(json["playerId"], "c9");
        assert_eq!(json["row"], 2);
        assert_eq!(json["col"], 3);
        assert_eq!(json["value"], 4);
    }

    #[test]
    fn client_messages_parse_from_raw_wire_text() {
        let parsed: ClientMessage = serde_json::from_str(
            r#"{"type":"MAKE_MOVE","row":1,"col":8,"value":9,"playerId":"abc"}"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            ClientMessage::MakeMove {
                row: 1,
                col: 8,
                value: 9,
                player_id: ConnectionId::new("abc"),
            }
        );
    }

    #[test]
    fn server_state_messages_wrap_a_state_field() {
        let state = SessionState::new(Board::empty(), Difficulty::Easy, GameMode::Blind);
        let json = serde_json::to_value(&ServerMessage::GameCreated {
            state: state.clone(),
        })
        .unwrap();
        assert_eq!(json["type"], "GAME_CREATED");
        assert!(json["state"]["puzzle"].is_array());
        assert!(json["state"]["players"].is_object());

        let json = serde_json::to_value(&ServerMessage::PlayerJoined { state }).unwrap();
        assert_eq!(json["type"], "PLAYER_JOINED");
    }

    #[test]
    fn game_complete_carries_only_the_winner() {
        let json = serde_json::to_value(&ServerMessage::GameComplete {
            winner: ConnectionId::new("w"),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "type": "GAME_COMPLETE", "winner": "w" }));
    }

    #[test]
    fn error_envelope_carries_a_message() {
        let json = serde_json::to_value(&ServerMessage::Error {
            message: "No game in progress".to_owned(),
        })
        .unwrap();
        assert_eq!(json["type"], "ERROR");
        assert_eq!(json["message"], "No game in progress");
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"HACK_THE_ROOM"}"#);
        assert!(result.is_err());
    }
}
