//! In-memory PCM decoder
//!
//! Holds a room's fully decoded sample payload and hands out fixed-duration
//! frames that borrow from it. Sequence numbers and timestamps keep running
//! across rewinds so a looping room looks like one continuous stream.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::decoder::AudioDecoder;
use super::error::MediaError;
use super::frame::{AudioFormat, AudioFrame};

/// Frame-at-a-time reader over a decoded sample payload
#[derive(Debug)]
pub struct PcmDecoder {
    samples: Bytes,
    format: AudioFormat,
    /// Payload bytes per emitted frame
    frame_len: usize,
    /// Read offset into `samples`
    position: usize,
    /// Frames emitted so far
    sequence: u64,
    /// Playback time emitted so far
    elapsed: Duration,
}

impl PcmDecoder {
    /// Prepare frames of `frame_duration` over `samples` encoded as `format`
    ///
    /// A trailing partial sample frame is dropped.
    pub fn new(
        mut samples: Bytes,
        format: AudioFormat,
        frame_duration: Duration,
    ) -> Result<Self, MediaError> {
        let block_align = format.block_align();
        if block_align == 0 || format.sample_rate == 0 {
            return Err(MediaError::Malformed(format!("invalid format {}", format)));
        }

        samples.truncate(samples.len() - samples.len() % block_align);
        if samples.is_empty() {
            return Err(MediaError::Malformed("origin holds no samples".into()));
        }

        Ok(Self {
            samples,
            format,
            frame_len: format.frame_len(frame_duration),
            position: 0,
            sequence: 0,
            elapsed: Duration::ZERO,
        })
    }

    /// Total playback duration of the payload
    pub fn duration(&self) -> Duration {
        self.format.duration_of(self.samples.len())
    }

    /// Payload bytes per emitted frame
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    fn read_frame(&mut self) -> Option<AudioFrame> {
        if self.position >= self.samples.len() {
            return None;
        }

        let end = (self.position + self.frame_len).min(self.samples.len());
        let data = self.samples.slice(self.position..end);
        self.position = end;

        let duration = self.format.duration_of(data.len());
        let frame = AudioFrame::new(self.sequence, self.elapsed, duration, data);
        self.sequence += 1;
        self.elapsed += duration;

        Some(frame)
    }
}

#[async_trait]
impl AudioDecoder for PcmDecoder {
    fn format(&self) -> AudioFormat {
        self.format
    }

    async fn next_frame(&mut self) -> Result<Option<AudioFrame>, MediaError> {
        Ok(self.read_frame())
    }

    fn rewind(&mut self) -> Result<(), MediaError> {
        self.position = 0;
        Ok(())
    }
}
