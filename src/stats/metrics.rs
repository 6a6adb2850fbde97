//! Statistics for the relay

use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters shared by the relay and its sessions
#[derive(Debug, Default)]
pub struct RelayCounters {
    sessions_opened: AtomicU64,
    sessions_failed: AtomicU64,
    sources_unavailable: AtomicU64,
    offers_answered: AtomicU64,
}

impl RelayCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn session_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn source_unavailable(&self) {
        self.sources_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn offer_answered(&self) {
        self.offers_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Total sessions ever opened
    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened.load(Ordering::Relaxed)
    }

    /// Sessions that ended through a connection failure
    pub fn sessions_failed(&self) -> u64 {
        self.sessions_failed.load(Ordering::Relaxed)
    }

    /// Connection attempts rejected because the room's origin couldn't be opened
    pub fn sources_unavailable(&self) -> u64 {
        self.sources_unavailable.load(Ordering::Relaxed)
    }

    /// Offers that produced an answer
    pub fn offers_answered(&self) -> u64 {
        self.offers_answered.load(Ordering::Relaxed)
    }
}

/// Relay-wide statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Sessions currently in the active set
    pub active_sessions: usize,
    /// Rooms with a live source
    pub active_rooms: usize,
    /// Total sessions ever opened
    pub sessions_opened: u64,
    /// Sessions that ended through a connection failure
    pub sessions_failed: u64,
    /// Connection attempts rejected for an unavailable source
    pub sources_unavailable: u64,
    /// Offers that produced an answer
    pub offers_answered: u64,
}

impl RelayStats {
    pub(crate) fn new(
        active_sessions: usize,
        active_rooms: usize,
        counters: &RelayCounters,
    ) -> Self {
        Self {
            active_sessions,
            active_rooms,
            sessions_opened: counters.sessions_opened(),
            sessions_failed: counters.sessions_failed(),
            sources_unavailable: counters.sources_unavailable(),
            offers_answered: counters.offers_answered(),
        }
    }
}
