//! Uplink audio path: microphone capture → resampling → PCM encoding, plus
//! the barge-in check that runs on every raw block.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioFrame (bounded mpsc)
//!           → resample (native → 16 kHz) → encode_pcm16 → transport
//!           └→ BargeInDetector (raw block) → stop playback
//! ```

pub mod capture;
pub mod pcm;
pub mod resample;
pub mod vad;

pub use capture::{AudioCapture, AudioFrame, CaptureError, CaptureGuard, StreamHandle};
pub use pcm::{encode_pcm16, silence_pcm16};
pub use resample::{resample, stereo_to_mono};
pub use vad::BargeInDetector;
