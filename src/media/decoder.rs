//! Origin decoding seam
//!
//! The registry never decodes audio itself. It asks a [`SourceOpener`] to turn
//! an [`OriginRef`] into an [`AudioDecoder`] and then drives that decoder from
//! the room's pump task.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::error::MediaError;
use super::frame::{AudioFormat, AudioFrame};
use super::pcm::PcmDecoder;
use super::transcode::{decode_to_voice, VOICE_FORMAT};

/// Reference to the audio input a room is decoded from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginRef {
    location: String,
}

impl OriginRef {
    /// Create an origin from a path or stream locator
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Create an origin pointing at a file
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::new(path.as_ref().to_string_lossy().into_owned())
    }

    /// The raw location string
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The location interpreted as a filesystem path
    pub fn as_path(&self) -> &Path {
        Path::new(&self.location)
    }
}

impl std::fmt::Display for OriginRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.location)
    }
}

/// A decoded, frame-at-a-time audio stream
#[async_trait]
pub trait AudioDecoder: Send {
    /// Format of every frame this decoder produces
    fn format(&self) -> AudioFormat;

    /// Decode the next frame, or `None` at end of stream
    async fn next_frame(&mut self) -> Result<Option<AudioFrame>, MediaError>;

    /// Restart from the beginning of the origin
    fn rewind(&mut self) -> Result<(), MediaError>;
}

/// Opens origins into decoders
#[async_trait]
pub trait SourceOpener: Send + Sync {
    /// Open `origin`, producing frames of roughly `frame_duration`
    async fn open(
        &self,
        origin: &OriginRef,
        frame_duration: Duration,
    ) -> Result<Box<dyn AudioDecoder>, MediaError>;
}

/// Opens file origins, detecting the container from its contents
///
/// Room uploads are stored under the room id without an extension, so the
/// file name is never consulted. Whatever the upload's rate and channel
/// layout, the decoder produces [`VOICE_FORMAT`] frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileOpener;

impl FileOpener {
    /// Create a new file opener
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceOpener for FileOpener {
    async fn open(
        &self,
        origin: &OriginRef,
        frame_duration: Duration,
    ) -> Result<Box<dyn AudioDecoder>, MediaError> {
        let path = origin.as_path();

        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MediaError::NotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(MediaError::Io {
                    path: PathBuf::from(path),
                    source: e,
                });
            }
        };

        let voice = tokio::task::spawn_blocking(move || decode_to_voice(data))
            .await
            .map_err(|e| MediaError::Conversion(format!("decode task failed: {}", e)))??;

        let decoder = PcmDecoder::new(voice.samples, VOICE_FORMAT, frame_duration)?;
        tracing::debug!(
            origin = %origin,
            source_rate = voice.source_rate,
            source_channels = voice.source_channels,
            duration_ms = decoder.duration().as_millis() as u64,
            "Opened origin"
        );

        Ok(Box::new(decoder))
    }
}
