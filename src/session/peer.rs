//! Peer connection seam
//!
//! The relay never speaks ICE, DTLS or RTP itself. A [`PeerConnector`] builds
//! peer connections and a [`PeerConnection`] exposes the handful of
//! operations a listener session needs. Connection state changes are not
//! callbacks: they arrive as [`PeerState`] events on the channel returned in
//! [`PeerLink`], consumed by the session's monitor task.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::media::AudioFormat;
use crate::registry::Subscription;

/// SDP message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

impl SdpType {
    /// Wire name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            SdpType::Offer => "offer",
            SdpType::Answer => "answer",
            SdpType::Pranswer => "pranswer",
            SdpType::Rollback => "rollback",
        }
    }
}

impl std::str::FromStr for SdpType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offer" => Ok(SdpType::Offer),
            "answer" => Ok(SdpType::Answer),
            "pranswer" => Ok(SdpType::Pranswer),
            "rollback" => Ok(SdpType::Rollback),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for SdpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session description and its type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    /// Create an offer
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    /// Create an answer
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Connection state reported by the media engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Errors reported by the media engine
#[derive(Debug, Error)]
pub enum PeerError {
    /// Operation on a closed peer connection
    #[error("peer connection is closed")]
    Closed,

    /// The engine can't carry this audio format
    #[error("unsupported outbound audio format: {0}")]
    UnsupportedFormat(AudioFormat),

    /// Engine-specific failure
    #[error("media engine error: {0}")]
    Engine(String),
}

/// One negotiated transport to a listener
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Apply the listener's description
    async fn set_remote_description(&self, description: SessionDescription)
        -> Result<(), PeerError>;

    /// Attach a subscription as the outbound audio track
    ///
    /// The connection takes ownership of the reader and forwards its frames
    /// until the source ends or the connection closes.
    async fn add_audio_track(&self, track: Subscription) -> Result<(), PeerError>;

    /// Produce an answer to the applied offer
    async fn create_answer(&self) -> Result<SessionDescription, PeerError>;

    /// Apply the local answer
    ///
    /// Returns the description to send to the listener, which may differ
    /// from the input once candidates are gathered.
    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<SessionDescription, PeerError>;

    /// Close the connection and stop forwarding media
    async fn close(&self) -> Result<(), PeerError>;
}

/// A new peer connection and its state-change events
pub struct PeerLink {
    pub connection: Arc<dyn PeerConnection>,
    pub events: mpsc::UnboundedReceiver<PeerState>,
}

impl std::fmt::Debug for PeerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerLink").finish_non_exhaustive()
    }
}

/// Builds peer connections
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Create a peer connection with its state observer registered
    async fn connect(&self) -> Result<PeerLink, PeerError>;
}
