//! Room-scoped durable storage for session state.
//!
//! The [`RoomAuthority`](crate::RoomAuthority) persists the full [`SessionState`] after
//! every mutation and rehydrates it lazily when the first channel connects, so a room
//! survives its host process being recycled between connections.
//!
//! [`MemoryStore`] keeps the *serialized* form, not the live struct. Rehydration
//! therefore always passes through the serde boundary that rebuilds the plain-object
//! player registry into map form, the same path a networked store would exercise.

use crate::net::codec;
use crate::{GridroomError, SessionState};

/// Durable store for one room's session state.
pub trait SessionStore {
    /// Persists the session, replacing any previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`GridroomError::Storage`] (or [`GridroomError::Serialization`]) if the
    /// snapshot cannot be written.
    fn put(&mut self, state: &SessionState) -> Result<(), GridroomError>;

    /// Loads the most recent snapshot, or `None` if nothing was ever stored.
    ///
    /// # Errors
    ///
    /// Returns [`GridroomError::Storage`] (or [`GridroomError::Serialization`]) if a
    /// stored snapshot exists but cannot be read back.
    fn get(&self) -> Result<Option<SessionState>, GridroomError>;
}

/// In-memory [`SessionStore`] holding the JSON-serialized snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    raw: Option<String>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self { raw: None }
    }

    /// The raw serialized snapshot, mainly for test assertions.
    #[must_use]
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

impl SessionStore for MemoryStore {
    fn put(&mut self, state: &SessionState) -> Result<(), GridroomError> {
        self.raw = Some(codec::encode(state)?);
        Ok(())
    }

    fn get(&self) -> Result<Option<SessionState>, GridroomError> {
        self.raw.as_deref().map(codec::decode).transpose()
    }
}
