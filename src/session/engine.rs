//! Synchronous heart of a running session.
//!
//! [`SessionCore`] owns everything the event loop mutates (outbound sink,
//! keepalive clock, speech player, barge-in detector) and exposes one
//! method per event source.  Each method runs to completion
//! without awaiting, which is what keeps capture blocks on their real-time
//! cadence and makes barge-in cancellation synchronous with detection.
//!
//! ```text
//! on_transport_open   → warm-up frame, keepalive start
//! on_capture_frame    → resample → encode → send → barge-in check → stop playback
//! on_inbound          → transcript / assistant text / play speech
//! on_keepalive_tick   → silence frame when idle > interval
//! on_transport_closed → keepalive stop, not listening
//! apply_tick          → inbound first, then capture (barge-in wins the tick)
//! ```

use std::time::{Duration, Instant};

use crate::audio::{encode_pcm16, resample, silence_pcm16, AudioFrame, BargeInDetector};
use crate::config::AppConfig;
use crate::playback::{PlayerState, TtsPlayer};
use crate::transport::{FrameSink, InboundEvent, KeepAliveScheduler, TransportMessage};

use super::state::{lock, SharedState};

// ---------------------------------------------------------------------------
// SessionSettings
// ---------------------------------------------------------------------------

/// The subset of [`AppConfig`] the event loop needs.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub target_sample_rate: u32,
    pub warmup_samples: usize,
    pub keepalive_samples: usize,
    pub keepalive_interval: Duration,
    pub barge_in_threshold: f32,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            target_sample_rate: config.audio.target_sample_rate,
            warmup_samples: config.transport.warmup_samples,
            keepalive_samples: config.transport.keepalive_samples,
            keepalive_interval: config.transport.keepalive_interval(),
            barge_in_threshold: config.audio.barge_in_threshold,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// SessionCore
// ---------------------------------------------------------------------------

pub struct SessionCore<S: FrameSink> {
    sink: S,
    keepalive: KeepAliveScheduler,
    player: TtsPlayer,
    detector: BargeInDetector,
    settings: SessionSettings,
    state: SharedState,
}

impl<S: FrameSink> SessionCore<S> {
    pub fn new(sink: S, player: TtsPlayer, settings: SessionSettings, state: SharedState) -> Self {
        Self {
            keepalive: KeepAliveScheduler::new(settings.keepalive_interval),
            detector: BargeInDetector::new(settings.barge_in_threshold),
            sink,
            player,
            settings,
            state,
        }
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    /// Prime the remote endpoint and start the keepalive clock.
    pub fn on_transport_open(&mut self, now: Instant) {
        let warmup = silence_pcm16(self.settings.warmup_samples);
        if self.send(warmup, now) {
            log::debug!("session: warm-up frame sent ({} samples)", self.settings.warmup_samples);
        }
        self.keepalive.start(now);
    }

    /// Push one capture block upstream, then check it for barge-in.
    pub fn on_capture_frame(&mut self, frame: &AudioFrame, now: Instant) {
        let resampled = resample(&frame.samples, frame.sample_rate, self.settings.target_sample_rate);
        let sent = self.send(encode_pcm16(&resampled), now);

        let speaking = self.detector.is_speaking(&frame.samples);
        let interrupted = speaking && self.player.stop();
        if interrupted {
            log::info!("session: barge-in, playback stopped");
        }

        if sent || interrupted {
            let mut snap = lock(&self.state);
            if sent {
                snap.frames_sent += 1;
            }
            if interrupted {
                snap.barge_ins += 1;
                snap.player = self.player.state();
            }
        }
    }

    /// Route one inbound message.
    pub fn on_inbound(&mut self, message: TransportMessage) {
        match InboundEvent::parse(message) {
            InboundEvent::Transcript(text) => {
                log::info!("session: user said {text:?}");
                lock(&self.state).conversation.push_transcript(text);
            }
            InboundEvent::AssistantText(fragment) => {
                log::trace!("session: assistant fragment {fragment:?}");
                lock(&self.state).conversation.push_assistant_fragment(&fragment);
            }
            InboundEvent::Audio(bytes) => {
                log::debug!("session: {} bytes of speech received", bytes.len());
                if let Err(e) = self.player.play(bytes) {
                    log::debug!("session: speech skipped: {e}");
                }
                lock(&self.state).player = self.player.state();
            }
        }
    }

    /// Send a keepalive frame if nothing went out for longer than the
    /// interval.  Returns `true` when a frame was sent.
    pub fn on_keepalive_tick(&mut self, now: Instant) -> bool {
        if !self.keepalive.is_running() {
            return false;
        }
        if !self.sink.is_open() {
            log::debug!("session: transport no longer open, keepalive stopped");
            self.keepalive.stop();
            return false;
        }
        if !self.keepalive.is_due(now) {
            return false;
        }

        let sent = self.send(silence_pcm16(self.settings.keepalive_samples), now);
        if sent {
            log::trace!("session: keepalive frame sent");
            lock(&self.state).keepalives_sent += 1;
        }
        sent
    }

    /// The transport is gone: stop the keepalive and stop listening.
    pub fn on_transport_closed(&mut self) {
        self.keepalive.stop();
        lock(&self.state).listening = false;
        log::info!("session: transport closed");
    }

    /// Apply everything that became ready in one loop wake-up.
    ///
    /// Inbound messages are applied before capture frames, so a barge-in
    /// detected in this tick cancels speech that arrived in the same tick.
    pub fn apply_tick<I, F>(&mut self, inbound: I, frames: F, now: Instant)
    where
        I: IntoIterator<Item = TransportMessage>,
        F: IntoIterator<Item = AudioFrame>,
    {
        for message in inbound {
            self.on_inbound(message);
        }
        for frame in frames {
            self.on_capture_frame(&frame, now);
        }
    }

    /// Notice playback that has reached its natural end.
    pub fn poll_playback(&mut self) -> PlayerState {
        let before = self.player.state();
        let after = self.player.poll();
        if before != after {
            lock(&self.state).player = after;
        }
        after
    }

    pub fn stop_keepalive(&mut self) {
        self.keepalive.stop();
    }

    pub fn stop_playback(&mut self) {
        self.player.stop();
        lock(&self.state).player = PlayerState::Idle;
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn keepalive_interval(&self) -> Duration {
        self.settings.keepalive_interval
    }

    pub fn keepalive(&self) -> &KeepAliveScheduler {
        &self.keepalive
    }

    pub fn player(&self) -> &TtsPlayer {
        &self.player
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Give the sink back for teardown.
    pub fn into_sink(self) -> S {
        self.sink
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Best-effort send.  Failures are dropped; success resets the idle clock.
    fn send(&mut self, bytes: Vec<u8>, now: Instant) -> bool {
        match self.sink.send(bytes) {
            Ok(()) => {
                self.keepalive.mark_sent(now);
                true
            }
            Err(e) => {
                log::trace!("session: frame dropped: {e}");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
