//! Origin decoding and conversion to relay audio
//!
//! Any container and codec `symphonia` can read is decoded in full, mixed
//! down to mono and resampled to 8kHz, then stored as 16-bit linear PCM.
//! Every room therefore publishes [`VOICE_FORMAT`], whatever was uploaded.

use std::io::{Cursor, ErrorKind};

use bytes::{BufMut, Bytes, BytesMut};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::error::MediaError;
use super::frame::{AudioCodec, AudioFormat};

/// Format of every room's decoded audio
pub const VOICE_FORMAT: AudioFormat = AudioFormat::new(AudioCodec::LinearPcm16, 8000, 1);

/// Input frames per resampler pass
const RESAMPLE_CHUNK: usize = 1024;

/// An origin converted to [`VOICE_FORMAT`]
#[derive(Debug, Clone)]
pub struct VoiceAudio {
    /// 16-bit little-endian samples at 8kHz mono
    pub samples: Bytes,
    /// Sample rate of the origin before conversion
    pub source_rate: u32,
    /// Channel count of the origin before conversion
    pub source_channels: usize,
}

/// Interleaved float samples as decoded from the origin
struct Decoded {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: usize,
}

impl From<SymphoniaError> for MediaError {
    fn from(e: SymphoniaError) -> Self {
        match e {
            SymphoniaError::Unsupported(what) => MediaError::Unsupported(what.to_string()),
            other => MediaError::Malformed(other.to_string()),
        }
    }
}

/// Decode a whole origin and convert it to [`VOICE_FORMAT`]
///
/// CPU bound; async callers should run it on a blocking thread.
pub fn decode_to_voice(data: Vec<u8>) -> Result<VoiceAudio, MediaError> {
    let decoded = decode(data)?;
    let mono = downmix(&decoded.samples, decoded.channels);
    let resampled = resample(&mono, decoded.sample_rate, VOICE_FORMAT.sample_rate)?;

    Ok(VoiceAudio {
        samples: to_pcm16(&resampled),
        source_rate: decoded.sample_rate,
        source_channels: decoded.channels,
    })
}

fn decode(data: Vec<u8>) -> Result<Decoded, MediaError> {
    let stream = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    // Uploads carry no extension, so the format is detected from content alone
    let detected = symphonia::default::get_probe().format(
        &Hint::new(),
        stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut reader = detected.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| MediaError::Unsupported("no audio track in origin".into()))?;
    let track_id = track.id;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    let mut spec = None;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            // End of stream, or a truncated final packet
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let audio = match decoder.decode(&packet) {
            Ok(audio) => audio,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!(error = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let signal = *audio.spec();
        let mut buf = SampleBuffer::<f32>::new(audio.capacity() as u64, signal);
        buf.copy_interleaved_ref(audio);
        samples.extend_from_slice(buf.samples());
        spec.get_or_insert(signal);
    }

    let spec = spec.ok_or_else(|| MediaError::Malformed("origin holds no audio".into()))?;
    let channels = spec.channels.count();
    if samples.is_empty() || channels == 0 || spec.rate == 0 {
        return Err(MediaError::Malformed("origin holds no audio".into()));
    }

    Ok(Decoded {
        samples,
        sample_rate: spec.rate,
        channels,
    })
}

/// Average interleaved channels into one
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, MediaError> {
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| MediaError::Conversion(format!("resampler setup failed: {}", e)))?;

    // The filter delays its output; keep feeding silence until the tail is out
    let delay = resampler.output_delay();
    let wanted = (samples.len() as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize;
    let mut output = Vec::with_capacity(delay + wanted + RESAMPLE_CHUNK);
    let mut chunk = vec![0.0f32; RESAMPLE_CHUNK];
    let mut position = 0;

    while output.len() < delay + wanted {
        chunk.fill(0.0);
        if position < samples.len() {
            let end = (position + RESAMPLE_CHUNK).min(samples.len());
            chunk[..end - position].copy_from_slice(&samples[position..end]);
            position = end;
        }

        let processed = resampler
            .process(&[chunk.as_slice()], None)
            .map_err(|e| MediaError::Conversion(format!("resampling failed: {}", e)))?;
        output.extend_from_slice(&processed[0]);
    }

    output.truncate(delay + wanted);
    output.drain(..delay);
    Ok(output)
}

fn to_pcm16(samples: &[f32]) -> Bytes {
    let mut out = BytesMut::with_capacity(samples.len() * 2);
    for sample in samples {
        out.put_i16_le((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
    }
    out.freeze()
}
