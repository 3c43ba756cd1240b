//! The authoritative per-room state machine.
//!
//! A [`RoomAuthority`] is the single writer of one room's [`SessionState`]. Every
//! mutating operation takes `&mut self` and runs to completion, so requests for one
//! room are serialized structurally, without locks. Persistence to the
//! [`SessionStore`] is the only fallible suspension point; broadcasting is
//! fire-and-forget per channel, and a slow or broken channel never blocks delivery to
//! the others.
//!
//! Sudoku legality is deliberately *not* enforced here. The authority accepts
//! placements as sent and defers puzzle-validity judgement to the completion check;
//! legality is an advisory client-side pre-check. Only structural bounds (grid
//! coordinates, digit range) are validated, to keep state mutation well-defined.

use std::collections::BTreeMap;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::net::codec;
use crate::net::transport::RoomChannel;
use crate::net::wire::{ClientMessage, ServerMessage};
use crate::{
    ConnectionId, Difficulty, GameMode, GridroomError, PuzzleSource, SessionState, SessionStore,
    GRID_SIZE,
};

/// The server-side owner of one room.
///
/// Channels register via [`on_connect`](Self::on_connect) and feed inbound wire text
/// through [`on_message`](Self::on_message); resulting events fan out to every
/// currently connected channel. Protocol errors are answered on the offending channel
/// only and never mutate state.
pub struct RoomAuthority<S, P>
where
    S: SessionStore,
    P: PuzzleSource,
{
    store: S,
    source: P,
    session: Option<SessionState>,
    channels: BTreeMap<ConnectionId, Box<dyn RoomChannel>>,
}

impl<S, P> std::fmt::Debug for RoomAuthority<S, P>
where
    S: SessionStore,
    P: PuzzleSource,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomAuthority")
            .field("session", &self.session.is_some())
            .field("channels", &self.channels.keys())
            .finish()
    }
}

impl<S, P> RoomAuthority<S, P>
where
    S: SessionStore,
    P: PuzzleSource,
{
    /// Creates an authority over an empty room.
    ///
    /// Any previously stored session is rehydrated lazily when the first channel
    /// connects, not here.
    #[must_use]
    pub const fn new(store: S, source: P) -> Self {
        Self {
            store,
            source,
            session: None,
            channels: BTreeMap::new(),
        }
    }

    /// Registers a freshly connected channel and sends it the current session state,
    /// if one exists. A connected-but-silent channel receives state only here, never
    /// proactively afterwards.
    ///
    /// Rejoining players (already present in the registry) get a snapshot whose
    /// `puzzle` field carries their current board, so they resume where they left off.
    ///
    /// # Errors
    ///
    /// Returns [`GridroomError::Storage`] if rehydrating a stored session fails. The
    /// channel is registered either way.
    pub fn on_connect(
        &mut self,
        id: ConnectionId,
        channel: Box<dyn RoomChannel>,
    ) -> Result<(), GridroomError> {
        debug!(%id, "channel connected");
        self.channels.insert(id.clone(), channel);

        if self.session.is_none() {
            self.session = self.store.get()?;
            if self.session.is_some() {
                debug!("rehydrated session state from storage");
            }
        }

        let snapshot = self.session.as_ref().map(|s| s.snapshot_for(&id));
        if let Some(state) = snapshot {
            self.send_to(&id, &ServerMessage::GameState { state });
        }
        Ok(())
    }

    /// Removes a channel from the fan-out set. The player's registry entry (if any)
    /// stays, so the same identity can resume via rejoin.
    pub fn on_disconnect(&mut self, id: &ConnectionId) {
        if self.channels.remove(id).is_some() {
            debug!(%id, "channel disconnected");
        }
    }

    /// Decodes and dispatches one inbound wire message from `sender`.
    ///
    /// Malformed text and protocol violations are answered with an `ERROR` on the
    /// sender's channel and reported as `Ok(())` here: they are fatal only to the
    /// intent that failed, never to the room.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures (storage, puzzle generation) propagate.
    pub fn on_message(&mut self, sender: &ConnectionId, text: &str) -> Result<(), GridroomError> {
        let message = match codec::decode::<ClientMessage>(text) {
            Ok(message) => message,
            Err(err) => {
                warn!(%sender, %err, "malformed message");
                self.send_to(
                    sender,
                    &ServerMessage::Error {
                        message: "Malformed message".to_owned(),
                    },
                );
                return Ok(());
            }
        };
        trace!(%sender, ?message, "handling message");

        let result = match message {
            ClientMessage::CreateGame {
                difficulty,
                game_mode,
            } => self.create_game(difficulty, game_mode),
            ClientMessage::JoinGame => self.join_game(sender),
            // Identity is the channel the move arrived on; the playerId field in the
            // payload is informational only.
            ClientMessage::MakeMove {
                row, col, value, ..
            } => self.make_move(sender, row, col, value),
        };

        match result {
            Err(err) if is_protocol_error(&err) => {
                debug!(%sender, %err, "rejecting request");
                self.send_to(
                    sender,
                    &ServerMessage::Error {
                        message: err.to_string(),
                    },
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Creates a new game, replacing any existing session in this room.
    ///
    /// Generates a puzzle, initializes the session with an empty player registry,
    /// persists it, and broadcasts `GAME_CREATED` with the full state to every
    /// connected channel.
    ///
    /// # Errors
    ///
    /// Propagates generator and storage failures; no state change in that case.
    pub fn create_game(
        &mut self,
        difficulty: Difficulty,
        game_mode: GameMode,
    ) -> Result<(), GridroomError> {
        let generated = self.source.generate(difficulty)?;
        debug!(
            %difficulty,
            %game_mode,
            rating = generated.rating,
            "creating game"
        );
        let state = SessionState::new(generated.puzzle, difficulty, game_mode);
        self.store.put(&state)?;
        let message = ServerMessage::GameCreated {
            state: state.clone(),
        };
        self.session = Some(state);
        self.broadcast(&message);
        Ok(())
    }

    /// Registers `sender` in the current game.
    ///
    /// A second join with the same identity is a **rejoin**: the player's registry
    /// entry is left untouched and only that channel receives a `GAME_STATE` carrying
    /// their current board, so a reconnecting client resumes rather than resets.
    ///
    /// # Errors
    ///
    /// - [`GridroomError::NoSession`] if no game was created yet.
    /// - [`GridroomError::Storage`] if persisting the updated registry fails.
    pub fn join_game(&mut self, sender: &ConnectionId) -> Result<(), GridroomError> {
        let session = self.session.as_mut().ok_or(GridroomError::NoSession)?;

        if session.is_registered(sender) {
            debug!(%sender, "player rejoining, sending current board");
            let state = session.snapshot_for(sender);
            self.send_to(sender, &ServerMessage::GameState { state });
            return Ok(());
        }

        debug!(%sender, "registering new player");
        session.register_player(sender.clone());
        self.store.put(session)?;
        let message = ServerMessage::PlayerJoined {
            state: session.clone(),
        };
        self.broadcast(&message);
        Ok(())
    }

    /// Applies a move from `sender` at `(row, col)`.
    ///
    /// The placement is applied unconditionally to the mover's board (no Sudoku
    /// legality re-check); in collaborative mode it is replicated to every registered
    /// board. If the mover's board has no empty cell left afterwards, the game
    /// completes: `is_complete`/`winner` are set exactly once and `GAME_COMPLETE` is
    /// broadcast *instead of* `MOVE_MADE`.
    ///
    /// # Errors
    ///
    /// - [`GridroomError::NoSession`] if no game exists.
    /// - [`GridroomError::PlayerNotRegistered`] if `sender` never joined.
    /// - [`GridroomError::GameAlreadyComplete`] once the game has ended.
    /// - [`GridroomError::CellOutOfBounds`] / [`GridroomError::InvalidDigit`] for
    ///   structurally invalid coordinates.
    /// - [`GridroomError::Storage`] if persisting fails.
    pub fn make_move(
        &mut self,
        sender: &ConnectionId,
        row: u8,
        col: u8,
        value: u8,
    ) -> Result<(), GridroomError> {
        let session = self.session.as_mut().ok_or(GridroomError::NoSession)?;
        if !session.is_registered(sender) {
            return Err(GridroomError::PlayerNotRegistered {
                player: sender.clone(),
            });
        }
        if session.is_complete {
            return Err(GridroomError::GameAlreadyComplete);
        }
        if !(1..=9).contains(&value) {
            return Err(GridroomError::InvalidDigit { value });
        }
        let (r, c) = (usize::from(row), usize::from(col));
        if r >= GRID_SIZE || c >= GRID_SIZE {
            return Err(GridroomError::CellOutOfBounds { row, col });
        }

        trace!(%sender, row, col, value, mode = %session.game_mode, "applying move");
        match session.game_mode {
            // Collaborative mode means one shared board replicated per player; the
            // wire protocol always ships "the" board keyed by recipient.
            GameMode::Collaborative => {
                for entry in session.players.values_mut() {
                    entry.board.set(r, c, value)?;
                }
            }
            GameMode::Blind => {
                if let Some(entry) = session.players.get_mut(sender) {
                    entry.board.set(r, c, value)?;
                }
            }
        }
        self.store.put(session)?;

        let completed = session
            .players
            .get(sender)
            .is_some_and(|entry| entry.board.is_complete());
        let message = if completed {
            session.is_complete = true;
            session.winner = Some(sender.clone());
            self.store.put(session)?;
            debug!(winner = %sender, "game complete");
            ServerMessage::GameComplete {
                winner: sender.clone(),
            }
        } else {
            ServerMessage::MoveMade {
                player_id: sender.clone(),
                row,
                col,
                value,
                game_mode: session.game_mode,
            }
        };
        self.broadcast(&message);
        Ok(())
    }

    /// Read-only view of the current session, if one exists.
    #[must_use]
    pub const fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    /// Number of currently connected channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Whether the given connection currently has a registered channel.
    #[must_use]
    pub fn has_channel(&self, id: &ConnectionId) -> bool {
        self.channels.contains_key(id)
    }

    /// Sends one message to every connected channel. Each send is independent;
    /// failures are logged, the dead channel is culled, and delivery to the remaining
    /// channels proceeds.
    fn broadcast(&mut self, message: &ServerMessage) {
        let text = match codec::encode(message) {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "failed to encode broadcast");
                return;
            }
        };
        let mut dead: SmallVec<[ConnectionId; 4]> = SmallVec::new();
        for (id, channel) in self.channels.iter_mut() {
            trace!(%id, "broadcasting");
            if let Err(err) = channel.send(&text) {
                warn!(%id, %err, "dropping channel after failed send");
                dead.push(id.clone());
            }
        }
        for id in dead {
            self.channels.remove(&id);
        }
    }

    /// Sends one message to a single channel, culling it on failure.
    fn send_to(&mut self, id: &ConnectionId, message: &ServerMessage) {
        let text = match codec::encode(message) {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "failed to encode reply");
                return;
            }
        };
        let Some(channel) = self.channels.get_mut(id) else {
            trace!(%id, "reply target has no channel");
            return;
        };
        if let Err(err) = channel.send(&text) {
            warn!(%id, %err, "dropping channel after failed send");
            self.channels.remove(id);
        }
    }
}

/// Protocol errors are reported to the offending channel; anything else is an
/// infrastructure failure the host must see.
const fn is_protocol_error(err: &GridroomError) -> bool {
    matches!(
        err,
        GridroomError::NoSession
            | GridroomError::PlayerNotRegistered { .. }
            | GridroomError::GameAlreadyComplete
            | GridroomError::CellOutOfBounds { .. }
            | GridroomError::InvalidDigit { .. }
    )
}
