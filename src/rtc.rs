//! WebRTC media engine backed by the `webrtc` crate
//!
//! Each listener gets its own `RTCPeerConnection` carrying a single G.711
//! audio track. Frames from the room subscription are written to the track
//! as samples at the pace the room's pump publishes them.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_PCMA, MIME_TYPE_PCMU};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use crate::media::g711::encode_pcm16;
use crate::media::{AudioCodec, AudioFormat};
use crate::registry::Subscription;
use crate::session::{
    PeerConnection, PeerConnector, PeerError, PeerLink, PeerState, SdpType, SessionDescription,
};

/// G.711 clock rate
const CLOCK_RATE: u32 = 8000;

impl From<webrtc::Error> for PeerError {
    fn from(e: webrtc::Error) -> Self {
        PeerError::Engine(e.to_string())
    }
}

impl From<RTCPeerConnectionState> for PeerState {
    fn from(state: RTCPeerConnectionState) -> Self {
        match state {
            RTCPeerConnectionState::Connecting => PeerState::Connecting,
            RTCPeerConnectionState::Connected => PeerState::Connected,
            RTCPeerConnectionState::Disconnected => PeerState::Disconnected,
            RTCPeerConnectionState::Failed => PeerState::Failed,
            RTCPeerConnectionState::Closed => PeerState::Closed,
            _ => PeerState::New,
        }
    }
}

/// ICE settings for new peer connections
#[derive(Debug, Clone)]
pub struct WebRtcConfig {
    /// STUN/TURN server URLs
    pub ice_servers: Vec<String>,
}

impl Default for WebRtcConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
        }
    }
}

impl WebRtcConfig {
    /// Replace the ICE server list
    pub fn ice_servers(mut self, servers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ice_servers = servers.into_iter().map(Into::into).collect();
        self
    }
}

/// Builds `webrtc` peer connections
#[derive(Debug, Clone, Default)]
pub struct WebRtcConnector {
    config: WebRtcConfig,
}

impl WebRtcConnector {
    pub fn new(config: WebRtcConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(&self) -> Result<PeerLink, PeerError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = self
            .config
            .ice_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        let pc = Arc::new(
            api.new_peer_connection(RTCConfiguration {
                ice_servers,
                ..Default::default()
            })
            .await?,
        );

        let (state_tx, events) = mpsc::unbounded_channel();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let _ = state_tx.send(PeerState::from(state));
            Box::pin(async {})
        }));

        Ok(PeerLink {
            connection: Arc::new(WebRtcPeer {
                pc,
                writer: Mutex::new(None),
            }),
            events,
        })
    }
}

/// A listener's `RTCPeerConnection`
pub struct WebRtcPeer {
    pc: Arc<RTCPeerConnection>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl WebRtcPeer {
    fn stop_writer(&self) {
        let handle = match self.writer.lock() {
            Ok(mut writer) => writer.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

#[async_trait]
impl PeerConnection for WebRtcPeer {
    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), PeerError> {
        let remote = match description.sdp_type {
            SdpType::Offer => RTCSessionDescription::offer(description.sdp)?,
            SdpType::Answer => RTCSessionDescription::answer(description.sdp)?,
            SdpType::Pranswer => RTCSessionDescription::pranswer(description.sdp)?,
            SdpType::Rollback => {
                return Err(PeerError::Engine("rollback is not supported".into()));
            }
        };
        self.pc.set_remote_description(remote).await?;
        Ok(())
    }

    async fn add_audio_track(&self, track: Subscription) -> Result<(), PeerError> {
        let format = track.format();
        let (mime_type, transcode) = outbound_codec(format)?;

        let local = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                clock_rate: CLOCK_RATE,
                channels: 1,
                ..Default::default()
            },
            "audio".to_owned(),
            format!("baraza-{}", track.handle().room()),
        ));

        let sender = self
            .pc
            .add_track(Arc::clone(&local) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        // Drain RTCP so interceptors keep running
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });

        let writer = tokio::spawn(forward_frames(track, local, transcode));
        let previous = match self.writer.lock() {
            Ok(mut slot) => slot.replace(writer),
            Err(poisoned) => poisoned.into_inner().replace(writer),
        };
        if let Some(previous) = previous {
            previous.abort();
        }

        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerError> {
        let answer = self.pc.create_answer(None).await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<SessionDescription, PeerError> {
        let local = RTCSessionDescription::answer(description.sdp)?;

        // Listeners get a complete answer instead of trickled candidates
        let mut gathered = self.pc.gathering_complete_promise().await;
        self.pc.set_local_description(local).await?;
        let _ = gathered.recv().await;

        self.pc
            .local_description()
            .await
            .map(|d| SessionDescription::answer(d.sdp))
            .ok_or_else(|| PeerError::Engine("local description missing after gathering".into()))
    }

    async fn close(&self) -> Result<(), PeerError> {
        self.stop_writer();
        self.pc.close().await?;
        Ok(())
    }
}

/// Pick the track codec for a room format, and the encoding to apply to
/// each frame if the room isn't already G.711
fn outbound_codec(format: AudioFormat) -> Result<(&'static str, Option<AudioCodec>), PeerError> {
    if format.sample_rate != CLOCK_RATE || format.channels != 1 {
        return Err(PeerError::UnsupportedFormat(format));
    }
    match format.codec {
        AudioCodec::Pcmu => Ok((MIME_TYPE_PCMU, None)),
        AudioCodec::Pcma => Ok((MIME_TYPE_PCMA, None)),
        AudioCodec::LinearPcm16 => Ok((MIME_TYPE_PCMU, Some(AudioCodec::Pcmu))),
    }
}

async fn forward_frames(
    mut track: Subscription,
    local: Arc<TrackLocalStaticSample>,
    transcode: Option<AudioCodec>,
) {
    while let Some(frame) = track.recv().await {
        let data = match transcode {
            Some(codec) => match encode_pcm16(&frame.data, codec) {
                Some(data) => data,
                None => continue,
            },
            None => frame.data,
        };

        let sample = Sample {
            data,
            duration: frame.duration,
            ..Default::default()
        };
        if let Err(e) = local.write_sample(&sample).await {
            tracing::debug!(room = %track.handle().room(), error = %e, "Track write failed");
            break;
        }
    }

    tracing::debug!(
        room = %track.handle().room(),
        lagged = track.lagged_frames(),
        "Outbound audio ended"
    );
}
