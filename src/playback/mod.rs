//! Downlink audio: decoding and playing synthesized speech.
//!
//! * [`TtsPlayer`]: single-playback state machine with stop/replace.
//! * [`RodioBackend`] / [`SilentBackend`]: `rodio`-based output.

pub mod output;
pub mod player;

pub use output::{RodioBackend, SilentBackend};
pub use player::{PlaybackBackend, PlaybackError, PlaybackHandle, PlayerState, TtsPlayer};
