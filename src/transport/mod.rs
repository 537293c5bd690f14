//! Framed full-duplex channel to the speech backend.
//!
//! * [`socket`]: the WebSocket itself ([`StreamTransport`]) and the
//!   [`FrameSink`] seam the session sends through.
//! * [`message`]: frame types and the one function that interprets inbound
//!   text frames.
//! * [`keepalive`]: idle detection that keeps the session open during
//!   pauses in speech.
//!
//! # Wire format
//!
//! ```text
//! client → server   binary  s16le mono 16 kHz
//!                   frame 0: 16 000 zero samples (warm-up)
//!                   idle:    320 zero samples (keepalive)
//! server → client   text    "__TRANSCRIPT__:<utterance>" | <assistant text>
//!                   binary  encoded speech (WAV/MP3/...)
//! ```

pub mod keepalive;
pub mod message;
pub mod socket;

pub use keepalive::{KeepAliveScheduler, KEEPALIVE_INTERVAL, KEEPALIVE_SAMPLES};
pub use message::{InboundEvent, TransportMessage, TRANSCRIPT_MARKER};
pub use socket::{FrameSink, StreamTransport, TransportError, TransportEvent, OUTBOUND_QUEUE};

/// Samples in the warm-up frame sent right after the socket opens (1 s).
pub const WARMUP_SAMPLES: usize = 16_000;
