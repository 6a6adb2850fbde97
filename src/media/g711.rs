//! G.711 encoders
//!
//! WebRTC listeners can always decode PCMU/PCMA, so 16-bit linear PCM origins
//! are companded to one of these before they are written to a track.

use bytes::{BufMut, Bytes, BytesMut};

use super::frame::AudioCodec;

const ULAW_BIAS: i32 = 0x84;
const ULAW_CLIP: i32 = 32635;

/// Upper bound of each A-law segment, on the 13-bit magnitude
const ALAW_SEGMENT_END: [i32; 8] = [0x1F, 0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF];

/// Encode one 16-bit sample as mu-law
pub fn linear_to_ulaw(sample: i16) -> u8 {
    let mut pcm = sample as i32;
    let sign = if pcm < 0 {
        pcm = -pcm;
        0x80
    } else {
        0x00
    };

    pcm = pcm.min(ULAW_CLIP) + ULAW_BIAS;

    let segment = ((pcm >> 7) & 0xFF) as u32;
    let exponent = if segment == 0 {
        0
    } else {
        31 - segment.leading_zeros() as i32
    };
    let mantissa = (pcm >> (exponent + 3)) & 0x0F;

    !((sign | (exponent << 4) | mantissa) as u8)
}

/// Encode one 16-bit sample as A-law
pub fn linear_to_alaw(sample: i16) -> u8 {
    let mut pcm = (sample as i32) >> 3;
    let mask = if pcm >= 0 {
        0xD5
    } else {
        pcm = -pcm - 1;
        0x55
    };

    let segment = match ALAW_SEGMENT_END.iter().position(|&end| pcm <= end) {
        Some(segment) => segment as i32,
        None => return 0x7F ^ mask,
    };

    let mut value = segment << 4;
    if segment < 2 {
        value |= (pcm >> 1) & 0x0F;
    } else {
        value |= (pcm >> segment) & 0x0F;
    }

    (value as u8) ^ mask
}

/// Compand a little-endian 16-bit PCM payload into `codec`
///
/// Returns `None` if `codec` isn't a G.711 variant. A trailing odd byte is
/// dropped.
pub fn encode_pcm16(payload: &[u8], codec: AudioCodec) -> Option<Bytes> {
    let encode: fn(i16) -> u8 = match codec {
        AudioCodec::Pcmu => linear_to_ulaw,
        AudioCodec::Pcma => linear_to_alaw,
        AudioCodec::LinearPcm16 => return None,
    };

    let mut out = BytesMut::with_capacity(payload.len() / 2);
    for pair in payload.chunks_exact(2) {
        out.put_u8(encode(i16::from_le_bytes([pair[0], pair[1]])));
    }
    Some(out.freeze())
}
