//! Transport abstractions for both ends of a room connection.
//!
//! The engine is transport-agnostic. A server host adapts each live channel (a
//! websocket, a pipe, a test queue) into a [`RoomChannel`] and hands it to the
//! [`RoomAuthority`](crate::RoomAuthority); a client adapts its socket into a
//! [`ClientTransport`] polled by the [`ConnectionManager`](crate::ConnectionManager).
//! Reconnection creates a *new* transport, so clients also supply a [`Connector`].
//!
//! [`MemoryTransport`] / [`MemoryEndpoint`] are the in-process implementation used for
//! local play and throughout the test suites.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{ConnectionId, GridroomError};

/// Events a [`ClientTransport`] surfaces when polled, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The channel finished opening and the transport assigned this connection id.
    Opened {
        /// The transport-assigned identifier; adopted as the provisional player identity.
        id: ConnectionId,
    },
    /// A text frame arrived from the server.
    Message {
        /// Raw JSON wire text.
        text: String,
    },
    /// The channel closed (either side).
    Closed,
    /// The channel failed. The connection is unusable afterwards.
    Error {
        /// A description of the failure.
        context: String,
    },
}

/// Client side of one transport channel to one room.
///
/// Implementations must be non-blocking: [`poll`](Self::poll) drains whatever events
/// have arrived and returns immediately.
pub trait ClientTransport {
    /// Sends a text frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`GridroomError::Transport`] if the channel is closed or the send fails.
    fn send(&mut self, text: &str) -> Result<(), GridroomError>;

    /// Drains pending events in arrival order. Never blocks.
    fn poll(&mut self) -> Vec<TransportEvent>;

    /// Closes the channel. Further sends fail; a final [`TransportEvent::Closed`] may
    /// still be observed by the peer.
    fn close(&mut self);
}

/// Factory for transports, invoked on every (re)connect attempt.
pub trait Connector {
    /// The transport type this connector produces.
    type Transport: ClientTransport;

    /// Opens a fresh channel to the room.
    ///
    /// # Errors
    ///
    /// Returns [`GridroomError::Transport`] if the channel cannot be opened; the
    /// [`ConnectionManager`](crate::ConnectionManager) treats this like a failed
    /// connection attempt and schedules a retry.
    fn connect(&mut self) -> Result<Self::Transport, GridroomError>;
}

/// Server side of one connected channel, as seen by the room authority.
///
/// Sends are fire-and-forget from the room's perspective: a failure affects only this
/// channel and is never retried inline.
pub trait RoomChannel {
    /// Sends a text frame to this client.
    ///
    /// # Errors
    ///
    /// Returns [`GridroomError::Transport`] if the channel is no longer usable.
    fn send(&mut self, text: &str) -> Result<(), GridroomError>;
}

/// State shared between the two halves of an in-memory channel.
#[derive(Debug)]
struct Shared {
    to_client: VecDeque<TransportEvent>,
    to_server: VecDeque<String>,
    open: bool,
}

/// Client half of an in-process channel pair.
///
/// Created via [`MemoryTransport::pair`]; the first poll yields
/// [`TransportEvent::Opened`] with the id the pair was created with, mirroring how a
/// real socket reports its assigned identifier only once the handshake completes.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    shared: Arc<Mutex<Shared>>,
}

/// Server half of an in-process channel pair.
///
/// Cloneable so one clone can be handed to the authority as a boxed [`RoomChannel`]
/// while a test harness keeps another to pump and inspect traffic.
#[derive(Debug, Clone)]
pub struct MemoryEndpoint {
    shared: Arc<Mutex<Shared>>,
    id: ConnectionId,
}

impl MemoryTransport {
    /// Creates a connected transport/endpoint pair with the given connection id.
    #[must_use]
    pub fn pair(id: ConnectionId) -> (MemoryTransport, MemoryEndpoint) {
        let shared = Arc::new(Mutex::new(Shared {
            to_client: VecDeque::from([TransportEvent::Opened { id: id.clone() }]),
            to_server: VecDeque::new(),
            open: true,
        }));
        (
            MemoryTransport {
                shared: Arc::clone(&shared),
            },
            MemoryEndpoint { shared, id },
        )
    }
}

impl ClientTransport for MemoryTransport {
    fn send(&mut self, text: &str) -> Result<(), GridroomError> {
        let mut shared = self.shared.lock();
        if !shared.open {
            return Err(GridroomError::Transport {
                context: "channel is closed".to_owned(),
            });
        }
        shared.to_server.push_back(text.to_owned());
        Ok(())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let mut shared = self.shared.lock();
        shared.to_client.drain(..).collect()
    }

    fn close(&mut self) {
        self.shared.lock().open = false;
    }
}

impl MemoryEndpoint {
    /// The connection id this pair was created with.
    #[must_use]
    pub const fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Whether the channel is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared.lock().open
    }

    /// Drains the frames the client has sent so far, in send order.
    #[must_use]
    pub fn take_outgoing(&self) -> Vec<String> {
        self.shared.lock().to_server.drain(..).collect()
    }

    /// Drains the text frames queued toward the client that no transport has polled
    /// yet, discarding any lifecycle events in between.
    ///
    /// Intended for server-side tests that have no live client half; with a client
    /// actively polling its [`MemoryTransport`], use that instead.
    #[must_use]
    pub fn drain_client_frames(&self) -> Vec<String> {
        self.shared
            .lock()
            .to_client
            .drain(..)
            .filter_map(|event| match event {
                TransportEvent::Message { text } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Closes the channel from the server side; the client observes
    /// [`TransportEvent::Closed`] on its next poll.
    pub fn close(&self) {
        let mut shared = self.shared.lock();
        if shared.open {
            shared.open = false;
            shared.to_client.push_back(TransportEvent::Closed);
        }
    }

    /// Injects a transport fault; the client observes [`TransportEvent::Error`] and
    /// then [`TransportEvent::Closed`] on its next poll.
    pub fn fail(&self, context: &str) {
        let mut shared = self.shared.lock();
        if shared.open {
            shared.open = false;
            shared.to_client.push_back(TransportEvent::Error {
                context: context.to_owned(),
            });
            shared.to_client.push_back(TransportEvent::Closed);
        }
    }
}

impl RoomChannel for MemoryEndpoint {
    fn send(&mut self, text: &str) -> Result<(), GridroomError> {
        let mut shared = self.shared.lock();
        if !shared.open {
            return Err(GridroomError::Transport {
                context: format!("channel {} is closed", self.id),
            });
        }
        shared.to_client.push_back(TransportEvent::Message {
            text: text.to_owned(),
        });
        Ok(())
    }
}
