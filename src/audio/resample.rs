//! Sample-rate conversion and channel mixing.
//!
//! The uplink carries **16 kHz mono** audio while microphones usually run at
//! 44.1 or 48 kHz, sometimes with more than one channel.  This module
//! provides the two conversion steps applied to every capture block:
//!
//! 1. [`stereo_to_mono`]: downmix any number of interleaved channels to mono.
//! 2. [`resample`]: box-filter conversion from the device rate to the
//!    transmission rate.
//!
//! The box filter averages every input sample that falls into an output
//! slot.  It is a crude anti-aliasing filter, but it is cheap enough to run
//! inside the capture cadence and adequate for speech at the integer ratios
//! used in practice (48 kHz → 16 kHz is an exact 3:1).

// ---------------------------------------------------------------------------
// stereo_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`.
///
/// * If `channels == 1` the input slice is returned as an owned `Vec`.
/// * If `channels == 0` an empty vector is returned.
///
/// ```rust
/// use duplex_voice::audio::stereo_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = stereo_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample `samples` from `from_rate` Hz to `to_rate` Hz with a box filter.
///
/// * `from_rate == to_rate` returns the input unchanged.
/// * The output has `round(N * to_rate / from_rate)` samples.
/// * Output sample `i` is the mean of inputs in
///   `[round(i * r), round((i + 1) * r))` where `r = from_rate / to_rate`.
///   Each range holds at least one sample; ranges running past the end of
///   the block are clamped to it.
///
/// ```rust
/// use duplex_voice::audio::resample;
///
/// let block = vec![0.3_f32; 2048];
/// let out = resample(&block, 48_000, 16_000);
/// assert_eq!(out.len(), 683); // round(2048 / 3)
/// assert!((out[0] - 0.3).abs() < 1e-6);
///
/// let same = resample(&block, 16_000, 16_000);
/// assert_eq!(same, block);
/// ```
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }
    if samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).round() as usize;
    let last = samples.len() - 1;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let start = ((i as f64 * ratio).round() as usize).min(last);
        let end = (((i + 1) as f64 * ratio).round() as usize)
            .min(samples.len())
            .max(start + 1);

        let window = &samples[start..end];
        output.push(window.iter().sum::<f32>() / window.len() as f32);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- stereo_to_mono ----------------------------------------------------

    #[test]
    fn stereo_to_mono_already_mono() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(stereo_to_mono(&input, 1), input);
    }

    #[test]
    fn stereo_to_mono_two_channel() {
        let input = vec![1.0_f32, -1.0, 0.5, 0.5];
        let out = stereo_to_mono(&input, 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn stereo_to_mono_zero_channels() {
        assert!(stereo_to_mono(&[1.0_f32, 2.0], 0).is_empty());
    }

    // ---- resample ----------------------------------------------------------

    #[test]
    fn same_rate_is_identity() {
        let input: Vec<f32> = (0..2048).map(|i| (i as f32 / 2048.0) - 0.5).collect();
        assert_eq!(resample(&input, 48_000, 48_000), input);
    }

    #[test]
    fn empty_input() {
        assert!(resample(&[], 48_000, 16_000).is_empty());
    }

    #[test]
    fn output_length_is_rounded_ratio() {
        let cases: &[(usize, u32, u32)] = &[
            (2048, 48_000, 16_000),
            (4096, 48_000, 16_000),
            (1024, 44_100, 16_000),
            (2048, 44_100, 16_000),
            (480, 48_000, 16_000),
            (100, 22_050, 16_000),
            (1, 48_000, 16_000),
        ];
        for &(n, from, to) in cases {
            let out = resample(&vec![0.0_f32; n], from, to);
            let expected = (n as f64 * to as f64 / from as f64).round() as usize;
            assert_eq!(out.len(), expected, "n={n} {from}->{to}");
        }
    }

    #[test]
    fn block_of_2048_at_48k_gives_683() {
        assert_eq!(resample(&vec![0.0_f32; 2048], 48_000, 16_000).len(), 683);
    }

    #[test]
    fn averages_each_group_of_three() {
        // r = 3: output i is mean(input[3i..3i+3])
        let input = vec![0.0_f32, 0.3, 0.6, 0.9, 0.9, 0.9];
        let out = resample(&input, 48_000, 16_000);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert!((out[1] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn constant_signal_preserves_amplitude() {
        let out = resample(&vec![-0.25_f32; 2048], 44_100, 16_000);
        for &s in &out {
            assert!((s + 0.25).abs() < 1e-6, "amplitude drift: {s}");
        }
    }

    #[test]
    fn output_stays_in_range() {
        let input: Vec<f32> = (0..2048)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        for s in resample(&input, 48_000, 16_000) {
            assert!((-1.0..=1.0).contains(&s));
        }
    }
}
