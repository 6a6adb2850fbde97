//! Session error types

use std::time::Duration;

use thiserror::Error;

use super::peer::PeerError;
use super::state::SessionPhase;

/// Errors surfaced by `handle_offer`
///
/// A signaling error only affects the session it was raised on.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Message type wasn't `offer`
    #[error("expected an offer, got {0:?}")]
    UnexpectedType(String),

    /// Offer SDP failed validation
    #[error("malformed session description: {0}")]
    MalformedSdp(String),

    /// The session already accepted its one offer
    #[error("session already negotiated")]
    AlreadyNegotiated,

    /// Transition attempted out of order
    #[error("signaling step out of sequence")]
    OutOfSequence,

    /// Session is failed or closed
    #[error("session is {0}")]
    SessionTerminated(SessionPhase),

    /// Negotiation didn't finish in time
    #[error("negotiation timed out after {0:?}")]
    Timeout(Duration),

    /// The media engine rejected a step
    #[error("peer connection error: {0}")]
    Peer(#[from] PeerError),
}
