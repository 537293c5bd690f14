//! Linear PCM encoding for the uplink.
//!
//! Every outbound frame is raw signed 16-bit little-endian mono PCM.  Samples
//! are clamped to `[-1.0, 1.0]` and scaled asymmetrically so both ends of the
//! signed range are reachable: negative values by 32768, the rest by 32767.

/// Bytes per encoded sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Convert one `f32` sample to `i16` with clamping and asymmetric scaling.
///
/// ```rust
/// use duplex_voice::audio::pcm::sample_to_i16;
///
/// assert_eq!(sample_to_i16(1.0), 32_767);
/// assert_eq!(sample_to_i16(-1.0), -32_768);
/// assert_eq!(sample_to_i16(0.0), 0);
/// assert_eq!(sample_to_i16(3.5), 32_767);
/// ```
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32_768.0) as i16
    } else {
        (s * 32_767.0) as i16
    }
}

/// Encode `samples` as little-endian `i16` PCM.
///
/// The output is exactly `2 * samples.len()` bytes, in input order.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for &s in samples {
        out.extend_from_slice(&sample_to_i16(s).to_le_bytes());
    }
    out
}

/// A buffer of `samples` zero-valued PCM samples (warm-up and keepalive frames).
pub fn silence_pcm16(samples: usize) -> Vec<u8> {
    vec![0u8; samples * BYTES_PER_SAMPLE]
}
