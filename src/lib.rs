//! Full-duplex voice client.
//!
//! Streams microphone audio to a conversational backend over a WebSocket
//! and plays back the synthesized replies, stopping playback as soon as the
//! user starts speaking again.

pub mod audio;
pub mod config;
pub mod playback;
pub mod session;
pub mod transport;
