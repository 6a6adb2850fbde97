//! Audio media for room sources
//!
//! This module provides:
//! - Audio frame and format types shared by the registry and peer connections
//! - The origin decoding seam (`SourceOpener` / `AudioDecoder`)
//! - Origin decoding with `symphonia`, converted to 8kHz mono linear PCM
//! - G.711 encoders for handing linear PCM to WebRTC tracks

pub mod decoder;
pub mod error;
pub mod frame;
pub mod g711;
pub mod pcm;
pub mod transcode;

pub use decoder::{AudioDecoder, FileOpener, OriginRef, SourceOpener};
pub use error::MediaError;
pub use frame::{AudioCodec, AudioFormat, AudioFrame};
pub use pcm::PcmDecoder;
pub use transcode::{decode_to_voice, VoiceAudio, VOICE_FORMAT};
