//! Audio frame and format types
//!
//! Frames are what a room's pump publishes into the fan-out channel, so they
//! are designed to be cheap to clone: the payload is a `Bytes` slice of the
//! decoded origin and only its reference count is bumped per subscriber.

use std::time::Duration;

use bytes::Bytes;

/// Sample encoding of an audio payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCodec {
    /// Signed 16-bit little-endian linear PCM
    LinearPcm16,
    /// G.711 A-law
    Pcma,
    /// G.711 mu-law
    Pcmu,
}

impl AudioCodec {
    /// Bytes used by one sample of one channel
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            AudioCodec::LinearPcm16 => 2,
            AudioCodec::Pcma | AudioCodec::Pcmu => 1,
        }
    }

    /// Short codec name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            AudioCodec::LinearPcm16 => "L16",
            AudioCodec::Pcma => "PCMA",
            AudioCodec::Pcmu => "PCMU",
        }
    }
}

/// Format of a decoded audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    /// Sample encoding
    pub codec: AudioCodec,
    /// Samples per second per channel
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
}

impl AudioFormat {
    /// Create a new audio format
    pub const fn new(codec: AudioCodec, sample_rate: u32, channels: u16) -> Self {
        Self {
            codec,
            sample_rate,
            channels,
        }
    }

    /// Bytes per sample frame (one sample for every channel)
    pub fn block_align(&self) -> usize {
        self.codec.bytes_per_sample() * self.channels as usize
    }

    /// Payload bytes for one second of audio
    pub fn bytes_per_second(&self) -> usize {
        self.block_align() * self.sample_rate as usize
    }

    /// Payload length for a frame of the given duration, in whole sample frames
    ///
    /// Never returns less than one sample frame.
    pub fn frame_len(&self, duration: Duration) -> usize {
        let samples = (self.sample_rate as u128 * duration.as_micros() / 1_000_000) as usize;
        samples.max(1) * self.block_align()
    }

    /// Playback duration of `len` payload bytes
    pub fn duration_of(&self, len: usize) -> Duration {
        let block_align = self.block_align();
        if block_align == 0 || self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let samples = (len / block_align) as u64;
        Duration::from_micros(samples * 1_000_000 / self.sample_rate as u64)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}Hz x{}",
            self.codec.name(),
            self.sample_rate,
            self.channels
        )
    }
}

/// One paced chunk of decoded audio
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Position in the source's output, counting across rewinds
    pub sequence: u64,
    /// Time since the source started playing
    pub timestamp: Duration,
    /// Playback duration of this frame
    pub duration: Duration,
    /// Payload (zero-copy via reference counting)
    pub data: Bytes,
}

impl AudioFrame {
    /// Create a new audio frame
    pub fn new(sequence: u64, timestamp: Duration, duration: Duration, data: Bytes) -> Self {
        Self {
            sequence,
            timestamp,
            duration,
            data,
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame carries no payload
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_len_whole_samples() {
        let format = AudioFormat::new(AudioCodec::LinearPcm16, 8000, 1);

        // 20ms at 8kHz = 160 samples of 2 bytes
        assert_eq!(format.frame_len(Duration::from_millis(20)), 320);

        let stereo = AudioFormat::new(AudioCodec::LinearPcm16, 48000, 2);
        assert_eq!(stereo.frame_len(Duration::from_millis(20)), 960 * 4);
    }

    #[test]
    fn test_frame_len_never_zero() {
        let format = AudioFormat::new(AudioCodec::Pcmu, 8000, 1);
        assert_eq!(format.frame_len(Duration::ZERO), 1);
    }

    #[test]
    fn test_duration_of() {
        let format = AudioFormat::new(AudioCodec::Pcmu, 8000, 1);
        assert_eq!(format.duration_of(160), Duration::from_millis(20));

        // Trailing partial sample frames don't count
        let pcm = AudioFormat::new(AudioCodec::LinearPcm16, 8000, 1);
        assert_eq!(pcm.duration_of(321), Duration::from_millis(20));
    }

    #[test]
    fn test_display() {
        let format = AudioFormat::new(AudioCodec::Pcma, 8000, 1);
        assert_eq!(format.to_string(), "PCMA 8000Hz x1");
    }
}
