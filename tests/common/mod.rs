//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use baraza_relay::media::{AudioDecoder, FileOpener, MediaError, SourceOpener};
use baraza_relay::session::{PeerError, SessionDescription};
use baraza_relay::{
    BarazaRelay, DirectoryResolver, OriginRef, PeerConnection, PeerConnector, PeerLink, PeerState,
    RegistryConfig, RelayConfig, Subscription,
};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Minimal listener offer with one receive-only audio section
pub const OFFER: &str = "v=0\r\n\
o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 0 8\r\n\
c=IN IP4 0.0.0.0\r\n\
a=recvonly\r\n\
a=rtpmap:0 PCMU/8000\r\n\
a=rtpmap:8 PCMA/8000\r\n";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Write one second of 16-bit WAV named after the room, like an upload
pub fn write_room(dir: &Path, room: &str, sample_rate: u32, channels: u16) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(dir.join(room), spec).unwrap();
    for i in 0..sample_rate * channels as u32 {
        writer.write_sample(((i % 251) as i16 - 125) * 100).unwrap();
    }
    writer.finalize().unwrap();
}

/// File opener that counts how often an origin is opened
#[derive(Default)]
pub struct CountingOpener {
    inner: FileOpener,
    opens: AtomicUsize,
}

impl CountingOpener {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceOpener for CountingOpener {
    async fn open(
        &self,
        origin: &OriginRef,
        frame_duration: Duration,
    ) -> Result<Box<dyn AudioDecoder>, MediaError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open(origin, frame_duration).await
    }
}

/// Scripted peer connection
pub struct MockPeer {
    events: mpsc::UnboundedSender<PeerState>,
    closes: AtomicUsize,
    track: Mutex<Option<Subscription>>,
}

impl MockPeer {
    /// Simulate the media engine reporting a state change
    pub fn report(&self, state: PeerState) {
        let _ = self.events.send(state);
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn has_track(&self) -> bool {
        self.track.lock().unwrap().is_some()
    }

    /// Take the attached subscription to inspect the audio it carries
    pub fn take_track(&self) -> Option<Subscription> {
        self.track.lock().unwrap().take()
    }
}

#[async_trait]
impl PeerConnection for MockPeer {
    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), PeerError> {
        if self.closes() > 0 {
            return Err(PeerError::Closed);
        }
        assert!(description.sdp.starts_with("v=0"));
        Ok(())
    }

    async fn add_audio_track(&self, track: Subscription) -> Result<(), PeerError> {
        *self.track.lock().unwrap() = Some(track);
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerError> {
        Ok(SessionDescription::answer(
            "v=0\r\ns=baraza\r\nm=audio 9 UDP/TLS/RTP/SAVPF 0\r\na=sendonly\r\n",
        ))
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<SessionDescription, PeerError> {
        Ok(description)
    }

    async fn close(&self) -> Result<(), PeerError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.track.lock().unwrap().take();
        Ok(())
    }
}

/// Connector handing out [`MockPeer`]s and remembering them
#[derive(Default)]
pub struct MockConnector {
    peers: Mutex<Vec<Arc<MockPeer>>>,
    fail: AtomicBool,
}

impl MockConnector {
    pub fn fail_connects(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// The n-th peer created
    pub fn peer(&self, n: usize) -> Arc<MockPeer> {
        Arc::clone(&self.peers.lock().unwrap()[n])
    }

    pub fn created(&self) -> usize {
        self.peers.lock().unwrap().len()
    }
}

#[async_trait]
impl PeerConnector for MockConnector {
    async fn connect(&self) -> Result<PeerLink, PeerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PeerError::Engine("engine unavailable".into()));
        }
        let (events, rx) = mpsc::unbounded_channel();
        let peer = Arc::new(MockPeer {
            events,
            closes: AtomicUsize::new(0),
            track: Mutex::new(None),
        });
        self.peers.lock().unwrap().push(Arc::clone(&peer));
        Ok(PeerLink {
            connection: peer,
            events: rx,
        })
    }
}

/// A relay serving rooms out of a temporary upload directory
pub struct Harness {
    pub relay: BarazaRelay,
    pub opener: Arc<CountingOpener>,
    pub connector: Arc<MockConnector>,
    pub uploads: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    pub fn with_config(config: RelayConfig) -> Self {
        init_tracing();

        let uploads = tempfile::tempdir().unwrap();
        let opener = Arc::new(CountingOpener::default());
        let connector = Arc::new(MockConnector::default());

        let config = config
            .upload_dir(uploads.path())
            .registry(RegistryConfig::default().frame_duration(Duration::from_millis(10)));

        let relay = BarazaRelay::with_parts(
            config,
            Arc::clone(&opener) as Arc<dyn SourceOpener>,
            Arc::new(DirectoryResolver::new(uploads.path())),
            Arc::clone(&connector) as Arc<dyn PeerConnector>,
        );

        Self {
            relay,
            opener,
            connector,
            uploads,
        }
    }

    /// Upload narrowband mono audio for a room
    pub fn upload(&self, room: &str) {
        write_room(self.uploads.path(), room, 8000, 1);
    }

    /// Upload audio recorded at another rate or channel layout
    pub fn upload_as(&self, room: &str, sample_rate: u32, channels: u16) {
        write_room(self.uploads.path(), room, sample_rate, channels);
    }
}
