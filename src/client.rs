//! The client-side connection protocol: reconnects, registration, and reconciliation.
//!
//! A [`ConnectionManager`] wraps a [`Connector`] and drives one logical membership in a
//! room across any number of physical connections. It is poll-driven and owns no
//! threads or timers: the caller pumps [`ConnectionManager::poll`] with the current
//! time from its own event loop, then drains the resulting [`RoomEvent`]s.
//!
//! Identity is the transport-assigned connection id, which changes on every reconnect.
//! The manager therefore never assumes it is registered: after each full state
//! broadcast it re-checks whether its current id appears in the player registry, and
//! re-issues `JOIN_GAME` when a join is wanted but not yet reflected. Outbound intents
//! issued while disconnected or unregistered are queued FIFO and flushed once the
//! registry confirms the new identity, so no move is lost within the retry budget.

pub mod backoff;
pub mod overlay;

use std::collections::{BTreeMap, VecDeque};

use web_time::{Duration, Instant};

use crate::client::backoff::{Backoff, ReconnectPolicy};
use crate::client::overlay::OptimisticOverlay;
use crate::net::codec;
use crate::net::transport::{ClientTransport, Connector, TransportEvent};
use crate::net::wire::{ClientMessage, ServerMessage, StateSnapshot};
use crate::{Board, ConnectionId, Difficulty, GameMode, GridroomError};

/// Display palette assigned to players in registry order, cycling when a room holds
/// more players than colors.
pub const PLAYER_COLORS: [&str; 9] = [
    "#3B82F6", // blue
    "#EF4444", // red
    "#10B981", // green
    "#F59E0B", // yellow
    "#8B5CF6", // purple
    "#EC4899", // pink
    "#06B6D4", // cyan
    "#F97316", // orange
    "#6366F1", // indigo
];

/// Fallback color for identities the palette was never assigned to.
const DEFAULT_PLAYER_COLOR: &str = "#111";

/// Wait before the single delayed `JOIN_GAME` retry after an `ERROR` reply.
const JOIN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Where the manager currently stands in the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport and no reconnect scheduled; the initial and post-teardown state.
    Disconnected,
    /// A transport is opening, or a reconnect is scheduled.
    Connecting,
    /// The transport is open but this identity is not in the player registry.
    Connected,
    /// The transport is open and the player registry contains this identity.
    Registered,
    /// The retry budget is exhausted. Only an explicit [`ConnectionManager::connect`]
    /// leaves this state.
    Failed,
}

/// Events surfaced to the caller, drained via [`ConnectionManager::events`].
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// A transport opened and assigned this connection id.
    Connected {
        /// The new provisional identity.
        id: ConnectionId,
    },
    /// The player registry now contains this identity.
    Registered {
        /// The confirmed identity.
        id: ConnectionId,
    },
    /// A full authoritative snapshot replaced the local session view.
    StateUpdated,
    /// Another accepted move was broadcast and applied to the local view.
    MoveMade {
        /// Who moved.
        player_id: ConnectionId,
        /// Target row.
        row: u8,
        /// Target column.
        col: u8,
        /// Placed digit.
        value: u8,
        /// The room's propagation mode.
        game_mode: GameMode,
    },
    /// The game completed.
    GameComplete {
        /// The player whose board filled first.
        winner: ConnectionId,
    },
    /// The server rejected a request.
    ErrorMessage {
        /// Human-readable description from the `ERROR` envelope.
        message: String,
    },
    /// The transport was lost; a reconnect attempt is scheduled.
    Reconnecting {
        /// Which attempt this is, starting at 1.
        attempt: u32,
        /// How long the manager waits before it.
        delay: Duration,
    },
    /// The transport was lost mid-session.
    ConnectionLost,
    /// The retry budget is exhausted; the manager is terminally [`ConnectionState::Failed`].
    RetriesExhausted,
}

/// An outbound request waiting for a usable, confirmed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    CreateGame {
        difficulty: Difficulty,
        game_mode: GameMode,
    },
    Move {
        row: u8,
        col: u8,
        value: u8,
    },
}

/// Client-side state machine for one room membership.
///
/// Generic over the [`Connector`] so tests drive it with in-memory channels and real
/// deployments plug in a socket factory. All methods are non-blocking.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    transport: Option<C::Transport>,
    state: ConnectionState,
    /// Identity assigned by the current transport; cleared whenever it closes.
    player_id: Option<ConnectionId>,
    /// The caller wants to be registered; survives reconnects.
    join_pending: bool,
    /// A `JOIN_GAME` was sent and no registry confirmation has arrived yet.
    join_in_flight: bool,
    /// The one delayed join retry for the current attempt was already spent.
    join_retried: bool,
    join_retry_at: Option<Instant>,
    reconnect_at: Option<Instant>,
    backoff: Backoff,
    overlay: OptimisticOverlay,
    colors: BTreeMap<ConnectionId, &'static str>,
    pending: VecDeque<Intent>,
    events: VecDeque<RoomEvent>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a manager with the default reconnect policy. No connection is attempted
    /// until [`connect`](Self::connect).
    #[must_use]
    pub fn new(connector: C) -> Self {
        Self::with_policy(connector, ReconnectPolicy::default())
    }

    /// Creates a manager with a custom reconnect policy.
    #[must_use]
    pub fn with_policy(connector: C, policy: ReconnectPolicy) -> Self {
        Self {
            connector,
            transport: None,
            state: ConnectionState::Disconnected,
            player_id: None,
            join_pending: false,
            join_in_flight: false,
            join_retried: false,
            join_retry_at: None,
            reconnect_at: None,
            backoff: Backoff::new(policy),
            overlay: OptimisticOverlay::new(),
            colors: BTreeMap::new(),
            pending: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// The identity assigned by the current transport, if one is open.
    #[must_use]
    pub const fn player_id(&self) -> Option<&ConnectionId> {
        self.player_id.as_ref()
    }

    /// Whether the last state broadcast confirmed this identity in the registry.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.state == ConnectionState::Registered
    }

    /// The display color assigned to the given player, or a neutral default.
    #[must_use]
    pub fn player_color(&self, id: &ConnectionId) -> &'static str {
        self.colors.get(id).copied().unwrap_or(DEFAULT_PLAYER_COLOR)
    }

    /// The last authoritative session snapshot, if any has arrived.
    #[must_use]
    pub fn session(&self) -> Option<&StateSnapshot> {
        self.overlay.authoritative()
    }

    /// The board to display: this player's board with unconfirmed local moves on top.
    #[must_use]
    pub fn board(&self) -> Option<Board> {
        let id = self.player_id.as_ref()?;
        self.overlay.effective_board(id)
    }

    /// Number of outbound intents still waiting for a confirmed connection.
    #[must_use]
    pub fn queued_intents(&self) -> usize {
        self.pending.len()
    }

    /// Drains the events produced since the last call, in occurrence order.
    pub fn events(&mut self) -> std::collections::vec_deque::Drain<'_, RoomEvent> {
        self.events.drain(..)
    }

    /// Opens the initial connection (or restarts after [`ConnectionState::Failed`])
    /// with a fresh retry budget.
    pub fn connect(&mut self, now: Instant) {
        self.backoff.reset();
        self.reconnect_at = None;
        self.open_transport(now);
    }

    /// Advances the state machine: fires due timers, drains the transport, and
    /// processes every event that has arrived.
    pub fn poll(&mut self, now: Instant) {
        if self.state == ConnectionState::Failed {
            return;
        }
        if let Some(at) = self.reconnect_at {
            if now >= at {
                self.reconnect_at = None;
                self.open_transport(now);
            }
        }
        if let Some(at) = self.join_retry_at {
            if now >= at {
                self.join_retry_at = None;
                if self.join_pending && self.transport.is_some() {
                    tracing::debug!("retrying join after rejected attempt");
                    self.send_join();
                }
            }
        }
        let drained = match self.transport.as_mut() {
            Some(transport) => transport.poll(),
            None => Vec::new(),
        };
        for event in drained {
            self.handle_transport_event(event, now);
        }
    }

    /// Requests a new game, replacing any existing session in the room. Queued if no
    /// confirmed connection is available yet.
    pub fn create_game(&mut self, difficulty: Difficulty, game_mode: GameMode) {
        tracing::info!(%difficulty, %game_mode, "requesting game creation");
        self.pending.push_back(Intent::CreateGame {
            difficulty,
            game_mode,
        });
        self.flush_ready();
    }

    /// Requests registration in the current game. The wish persists across
    /// reconnects: after every new transport and every state broadcast that does not
    /// list this identity, the manager re-issues `JOIN_GAME`.
    pub fn join_game(&mut self) {
        self.join_pending = true;
        self.join_retried = false;
        if self.transport.is_some() && !self.join_in_flight {
            self.send_join();
        }
    }

    /// Places a digit on this player's board.
    ///
    /// The placement is checked against the local view first; a conflicting or
    /// out-of-range placement is rejected here and never sent. Legal moves are applied
    /// optimistically and queued until a confirmed connection can carry them.
    ///
    /// # Errors
    ///
    /// Returns [`GridroomError::IllegalPlacement`] if the placement conflicts with the
    /// locally visible board, and [`GridroomError::InvalidDigit`] /
    /// [`GridroomError::CellOutOfBounds`] for out-of-range arguments.
    pub fn make_move(&mut self, row: u8, col: u8, value: u8) -> Result<(), GridroomError> {
        if !(1..=9).contains(&value) {
            return Err(GridroomError::InvalidDigit { value });
        }
        if usize::from(row) >= crate::GRID_SIZE || usize::from(col) >= crate::GRID_SIZE {
            return Err(GridroomError::CellOutOfBounds { row, col });
        }
        if let Some(board) = self.board() {
            if !board.is_legal_placement(usize::from(row), usize::from(col), value) {
                return Err(GridroomError::IllegalPlacement { row, col, value });
            }
        }
        self.overlay.push_pending(row, col, value);
        self.pending.push_back(Intent::Move { row, col, value });
        self.flush_ready();
        Ok(())
    }

    /// Tears the connection down deliberately: cancels timers, closes the transport,
    /// and clears identity. The session view and queued intents are kept so a later
    /// [`connect`](Self::connect) can resume.
    pub fn disconnect(&mut self) {
        self.reconnect_at = None;
        self.join_retry_at = None;
        self.join_in_flight = false;
        self.join_pending = false;
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.player_id = None;
        self.state = ConnectionState::Disconnected;
        self.backoff.reset();
    }

    fn open_transport(&mut self, now: Instant) {
        self.state = ConnectionState::Connecting;
        match self.connector.connect() {
            Ok(transport) => {
                self.transport = Some(transport);
            }
            Err(err) => {
                tracing::warn!(error = %err, "connection attempt failed");
                self.schedule_reconnect(now);
            }
        }
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        if let Some(delay) = self.backoff.next_delay() {
            let attempt = self.backoff.attempt();
            tracing::debug!(attempt, ?delay, "scheduling reconnect");
            self.reconnect_at = Some(now + delay);
            self.state = ConnectionState::Connecting;
            self.events.push_back(RoomEvent::Reconnecting { attempt, delay });
        } else {
            tracing::warn!("reconnect budget exhausted, giving up");
            self.reconnect_at = None;
            self.state = ConnectionState::Failed;
            self.events.push_back(RoomEvent::RetriesExhausted);
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Opened { id } => {
                tracing::debug!(%id, "transport opened");
                self.state = ConnectionState::Connected;
                self.player_id = Some(id.clone());
                self.join_in_flight = false;
                self.backoff.reset();
                self.events.push_back(RoomEvent::Connected { id });
                if self.join_pending {
                    self.send_join();
                }
                self.flush_ready();
            }
            TransportEvent::Message { text } => self.handle_server_message(&text, now),
            TransportEvent::Closed => {
                self.transport = None;
                self.player_id = None;
                self.join_in_flight = false;
                self.join_retry_at = None;
                self.events.push_back(RoomEvent::ConnectionLost);
                self.schedule_reconnect(now);
            }
            TransportEvent::Error { context } => {
                // A Closed event follows from well-behaved transports; reconnect
                // scheduling happens there to avoid double-spending attempts.
                tracing::warn!(%context, "transport error");
            }
        }
    }

    fn handle_server_message(&mut self, text: &str, now: Instant) {
        let message: ServerMessage = match codec::decode(text) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, "discarding malformed server frame");
                return;
            }
        };
        match message {
            ServerMessage::GameCreated { state }
            | ServerMessage::PlayerJoined { state }
            | ServerMessage::GameState { state } => self.reconcile(state),
            ServerMessage::MoveMade {
                player_id,
                row,
                col,
                value,
                game_mode,
            } => {
                self.overlay
                    .apply_move(&player_id, row, col, value, game_mode);
                self.events.push_back(RoomEvent::MoveMade {
                    player_id,
                    row,
                    col,
                    value,
                    game_mode,
                });
            }
            ServerMessage::GameComplete { winner } => {
                self.overlay.set_complete(winner.clone());
                self.events.push_back(RoomEvent::GameComplete { winner });
            }
            ServerMessage::Error { message } => {
                if self.join_in_flight && !self.join_retried {
                    tracing::debug!(%message, "join rejected, scheduling one retry");
                    self.join_in_flight = false;
                    self.join_retried = true;
                    self.join_retry_at = Some(now + JOIN_RETRY_DELAY);
                } else {
                    tracing::debug!(%message, "request rejected");
                }
                self.events.push_back(RoomEvent::ErrorMessage { message });
            }
        }
    }

    /// Folds a full authoritative snapshot into local state: colors, registration,
    /// pending join, and the session view.
    fn reconcile(&mut self, snapshot: StateSnapshot) {
        for (id, color) in snapshot.players.keys().zip(PLAYER_COLORS.iter().copied().cycle()) {
            self.colors.entry(id.clone()).or_insert(color);
        }

        let registered = self
            .player_id
            .as_ref()
            .is_some_and(|id| snapshot.is_registered(id));
        if registered {
            self.join_in_flight = false;
            self.join_retried = false;
            self.join_retry_at = None;
            if self.state != ConnectionState::Registered {
                self.state = ConnectionState::Registered;
                if let Some(id) = self.player_id.clone() {
                    tracing::debug!(%id, "registration confirmed by registry");
                    self.events.push_back(RoomEvent::Registered { id });
                }
            }
        } else {
            if self.state == ConnectionState::Registered {
                self.state = ConnectionState::Connected;
            }
            if self.join_pending && !self.join_in_flight && self.join_retry_at.is_none() {
                self.send_join();
            }
        }

        self.overlay.replace_authoritative(snapshot);
        self.events.push_back(RoomEvent::StateUpdated);
        self.flush_ready();
    }

    fn send_join(&mut self) {
        match self.send_message(&ClientMessage::JoinGame) {
            Ok(()) => self.join_in_flight = true,
            Err(err) => tracing::warn!(error = %err, "failed to send join"),
        }
    }

    /// Flushes queued intents in FIFO order once the connection is usable: moves need
    /// a registry-confirmed identity, so the queue waits for registration whenever a
    /// join is wanted.
    fn flush_ready(&mut self) {
        let ready = self.transport.is_some()
            && (self.state == ConnectionState::Registered
                || (self.state == ConnectionState::Connected && !self.join_pending));
        if !ready {
            return;
        }
        while let Some(intent) = self.pending.pop_front() {
            let message = match intent {
                Intent::CreateGame {
                    difficulty,
                    game_mode,
                } => ClientMessage::CreateGame {
                    difficulty,
                    game_mode,
                },
                Intent::Move { row, col, value } => {
                    let Some(player_id) = self.player_id.clone() else {
                        self.pending.push_front(intent);
                        return;
                    };
                    ClientMessage::MakeMove {
                        row,
                        col,
                        value,
                        player_id,
                    }
                }
            };
            if let Err(err) = self.send_message(&message) {
                tracing::warn!(error = %err, "flush interrupted, requeueing intent");
                self.pending.push_front(intent);
                return;
            }
        }
    }

    fn send_message(&mut self, message: &ClientMessage) -> Result<(), GridroomError> {
        let text = codec::encode(message)?;
        match self.transport.as_mut() {
            Some(transport) => transport.send(&text),
            None => Err(GridroomError::Transport {
                context: "no open transport".to_owned(),
            }),
        }
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state)
            .field("player_id", &self.player_id)
            .field("join_pending", &self.join_pending)
            .field("queued_intents", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
