//! Listener session management
//!
//! A session pairs one listener's peer connection with one subscription to
//! its room's source. Sessions move through [`SessionPhase`] states:
//!
//! ```text
//! New ──offer──► Negotiating ──answer──► Connected
//!  │                  │                      │
//!  └──────────────────┴───stop / failure─────┴──► Closed | Failed
//! ```

pub mod error;
pub mod listener;
pub mod peer;
pub mod set;
pub mod state;

pub use error::SignalingError;
pub use listener::SessionHandle;
pub use peer::{
    PeerConnection, PeerConnector, PeerError, PeerLink, PeerState, SdpType, SessionDescription,
};
pub use set::ActiveSessionSet;
pub use state::{SessionOutcome, SessionPhase, SessionState};
