//! Live audio relay for Baraza rooms
//!
//! Each room's audio origin is decoded once and fanned out to every
//! listener in the room over its own WebRTC peer connection.
//!
//! - [`registry`]: one shared decoded source per room, with independent
//!   subscriptions and reference-counted teardown
//! - [`session`]: per-listener offer/answer negotiation and lifecycle
//! - [`signaling`]: the JSON message loop that drives a session
//! - [`server`]: [`BarazaRelay`], configuration and origin lookup
//! - `rtc` (feature `webrtc`): a media engine built on the `webrtc` crate
//!
//! # Example
//!
//! ```no_run
//! use baraza_relay::{serve_signaling, BarazaRelay};
//! use tokio::sync::mpsc;
//!
//! async fn listener(
//!     relay: &BarazaRelay,
//!     room: &str,
//!     inbound: mpsc::Receiver<String>,
//!     outbound: mpsc::Sender<String>,
//! ) -> baraza_relay::Result<()> {
//!     let session = relay.open_session(room).await?;
//!     let outcome = serve_signaling(session, inbound, outbound).await;
//!     tracing::info!(?outcome, "listener left");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod media;
pub mod registry;
#[cfg(feature = "webrtc")]
pub mod rtc;
pub mod server;
pub mod session;
pub mod signaling;
pub mod stats;

pub use error::{Error, Result};
pub use media::{AudioCodec, AudioFormat, AudioFrame, OriginRef};
pub use registry::{RegistryConfig, RoomId, SourceRegistry, Subscription};
pub use server::{BarazaRelay, DirectoryResolver, OriginResolver, OriginTable, RelayConfig};
pub use session::{
    ActiveSessionSet, PeerConnection, PeerConnector, PeerLink, PeerState, SessionHandle,
    SessionOutcome, SessionPhase, SignalingError,
};
pub use signaling::serve_signaling;
pub use stats::RelayStats;
