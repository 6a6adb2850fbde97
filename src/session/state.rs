//! Session state machine
//!
//! Tracks a listener session from construction to teardown. Transitions only
//! move forward; `Failed` and `Closed` are terminal.

use std::time::{Duration, Instant};

use super::error::SignalingError;
use crate::registry::RoomId;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Peer connection created, no offer yet
    New,
    /// Offer received, answer being produced
    Negotiating,
    /// Answer returned to the listener
    Connected,
    /// Peer connection reported failure and was torn down
    Failed,
    /// Stopped explicitly
    Closed,
}

impl SessionPhase {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Failed | SessionPhase::Closed)
    }

    /// Lowercase name used in logs and errors
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::New => "new",
            SessionPhase::Negotiating => "negotiating",
            SessionPhase::Connected => "connected",
            SessionPhase::Failed => "failed",
            SessionPhase::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionOutcome {
    /// Stopped by the listener, the host or the hosting process
    Stopped,
    /// The peer connection failed after negotiation
    ConnectionFailed,
}

impl SessionOutcome {
    /// Terminal phase this outcome leads to
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionOutcome::Stopped => SessionPhase::Closed,
            SessionOutcome::ConnectionFailed => SessionPhase::Failed,
        }
    }
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Room the listener joined
    pub room: RoomId,

    /// Current phase
    pub phase: SessionPhase,

    /// Session creation time
    pub created_at: Instant,

    /// Time the offer arrived
    pub offer_received_at: Option<Instant>,

    /// Time the answer was produced
    pub connected_at: Option<Instant>,

    /// Time the session reached a terminal phase
    pub ended_at: Option<Instant>,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: u64, room: RoomId) -> Self {
        Self {
            id,
            room,
            phase: SessionPhase::New,
            created_at: Instant::now(),
            offer_received_at: None,
            connected_at: None,
            ended_at: None,
        }
    }

    /// Accept the session's one offer
    pub fn begin_negotiation(&mut self) -> Result<(), SignalingError> {
        match self.phase {
            SessionPhase::New => {
                self.phase = SessionPhase::Negotiating;
                self.offer_received_at = Some(Instant::now());
                Ok(())
            }
            SessionPhase::Negotiating | SessionPhase::Connected => {
                Err(SignalingError::AlreadyNegotiated)
            }
            phase => Err(SignalingError::SessionTerminated(phase)),
        }
    }

    /// Record that the answer was produced
    pub fn complete_negotiation(&mut self) -> Result<(), SignalingError> {
        match self.phase {
            SessionPhase::Negotiating => {
                self.phase = SessionPhase::Connected;
                self.connected_at = Some(Instant::now());
                Ok(())
            }
            SessionPhase::New | SessionPhase::Connected => Err(SignalingError::OutOfSequence),
            phase => Err(SignalingError::SessionTerminated(phase)),
        }
    }

    /// Move to the terminal phase for `outcome`
    ///
    /// Returns `false` if the session was already terminal, in which case
    /// nothing changes.
    pub fn terminate(&mut self, outcome: SessionOutcome) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = outcome.phase();
        self.ended_at = Some(Instant::now());
        true
    }

    /// Check if the session reached a terminal phase
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        match self.ended_at {
            Some(ended) => ended.duration_since(self.created_at),
            None => self.created_at.elapsed(),
        }
    }
}
