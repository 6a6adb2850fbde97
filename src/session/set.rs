//! Active session bookkeeping

use dashmap::DashMap;

use crate::registry::RoomId;

/// Live listener sessions, keyed by session id
///
/// Membership mirrors sessions whose peer connection has not been closed.
/// Used for accounting only; sessions are never looked up through it.
#[derive(Debug, Default)]
pub struct ActiveSessionSet {
    sessions: DashMap<u64, RoomId>,
}

impl ActiveSessionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session, returning `false` if the id was already present
    pub fn insert(&self, id: u64, room: RoomId) -> bool {
        self.sessions.insert(id, room).is_none()
    }

    /// Remove a session, returning whether it was present
    pub fn remove(&self, id: u64) -> bool {
        self.sessions.remove(&id).is_some()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of live sessions in `room`
    pub fn listeners_in(&self, room: &RoomId) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value() == room)
            .count()
    }
}
