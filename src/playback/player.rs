//! Synthesized-speech player with barge-in cancellation.
//!
//! [`TtsPlayer`] owns at most one live [`PlaybackHandle`].  A new audio
//! buffer and a barge-in both go through the same stop-then-replace path,
//! so two playbacks never overlap.
//!
//! # State machine
//!
//! ```text
//! Idle ──play(bytes)──▶ Decoding ──decoded──▶ Playing ──finished / stop()──▶ Idle
//!                          └──decode error──▶ Idle
//! ```

use thiserror::Error;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors from decoding or starting playback.  None of them are fatal to the
/// session.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("audio output unavailable: {0}")]
    Output(String),
}

// ---------------------------------------------------------------------------
// Backend seams
// ---------------------------------------------------------------------------

/// One active decode+playback.
pub trait PlaybackHandle {
    /// Stop output immediately.  Must be safe to call more than once.
    fn stop(&mut self);

    /// `true` once the audio has played to its natural end.
    fn is_finished(&self) -> bool;
}

/// Something that can decode an encoded buffer and start playing it.
pub trait PlaybackBackend {
    fn start(&mut self, bytes: Vec<u8>) -> Result<Box<dyn PlaybackHandle>, PlaybackError>;
}

// ---------------------------------------------------------------------------
// PlayerState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Idle,
    Decoding,
    Playing,
}

impl PlayerState {
    pub fn label(&self) -> &'static str {
        match self {
            PlayerState::Idle => "Idle",
            PlayerState::Decoding => "Decoding",
            PlayerState::Playing => "Speaking",
        }
    }
}

// ---------------------------------------------------------------------------
// TtsPlayer
// ---------------------------------------------------------------------------

/// Plays inbound speech buffers one at a time.
pub struct TtsPlayer {
    backend: Box<dyn PlaybackBackend>,
    active: Option<Box<dyn PlaybackHandle>>,
    state: PlayerState,
}

impl TtsPlayer {
    pub fn new(backend: Box<dyn PlaybackBackend>) -> Self {
        Self {
            backend,
            active: None,
            state: PlayerState::Idle,
        }
    }

    /// Stop whatever is playing, then decode and play `bytes`.
    ///
    /// The previous handle is stopped and dropped before the backend sees
    /// the new buffer.  A decode failure leaves the player `Idle`.
    pub fn play(&mut self, bytes: Vec<u8>) -> Result<(), PlaybackError> {
        self.stop();

        self.state = PlayerState::Decoding;
        log::debug!("playback: decoding {} bytes", bytes.len());

        match self.backend.start(bytes) {
            Ok(handle) => {
                self.active = Some(handle);
                self.state = PlayerState::Playing;
                Ok(())
            }
            Err(e) => {
                log::warn!("playback: {e}");
                self.state = PlayerState::Idle;
                Err(e)
            }
        }
    }

    /// Stop and release the active handle, if any.  Idempotent.
    ///
    /// Returns `true` when something was actually playing.
    pub fn stop(&mut self) -> bool {
        self.state = PlayerState::Idle;
        match self.active.take() {
            Some(mut handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    /// Release the handle once it has reached its natural end.
    pub fn poll(&mut self) -> PlayerState {
        if self.active.as_ref().is_some_and(|h| h.is_finished()) {
            log::debug!("playback: finished");
            self.active = None;
            self.state = PlayerState::Idle;
        }
        self.state
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
