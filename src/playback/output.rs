//! Audio output backends built on `rodio`.
//!
//! [`RodioBackend`] keeps one output stream open for the session and gives
//! every inbound buffer its own `Sink`, so stopping one playback never
//! disturbs the next.  [`SilentBackend`] decodes but discards audio, for
//! hosts without an output device.

use std::io::Cursor;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use super::player::{PlaybackBackend, PlaybackError, PlaybackHandle};

fn decode(bytes: Vec<u8>) -> Result<Decoder<Cursor<Vec<u8>>>, PlaybackError> {
    Decoder::new(Cursor::new(bytes)).map_err(|e| PlaybackError::Decode(e.to_string()))
}

// ---------------------------------------------------------------------------
// RodioBackend
// ---------------------------------------------------------------------------

/// Plays decoded speech on the default output device.
pub struct RodioBackend {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl RodioBackend {
    /// Open the default output device.
    pub fn new() -> Result<Self, PlaybackError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| PlaybackError::Output(e.to_string()))?;
        log::info!("playback: output stream ready");
        Ok(Self {
            _stream: stream,
            handle,
        })
    }
}

impl PlaybackBackend for RodioBackend {
    fn start(&mut self, bytes: Vec<u8>) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        let source = decode(bytes)?;
        let sink = Sink::try_new(&self.handle).map_err(|e| PlaybackError::Output(e.to_string()))?;
        sink.append(source.convert_samples::<f32>());
        Ok(Box::new(SinkHandle { sink }))
    }
}

/// A live `rodio::Sink`.  Dropping the sink releases it.
struct SinkHandle {
    sink: Sink,
}

impl PlaybackHandle for SinkHandle {
    fn stop(&mut self) {
        self.sink.stop();
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}

// ---------------------------------------------------------------------------
// SilentBackend
// ---------------------------------------------------------------------------

/// Validates inbound audio and drops it.
#[derive(Debug, Default)]
pub struct SilentBackend;

impl PlaybackBackend for SilentBackend {
    fn start(&mut self, bytes: Vec<u8>) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        let source = decode(bytes)?;
        log::debug!(
            "playback: discarding {:?} of audio ({} Hz, {} ch)",
            source.total_duration(),
            source.sample_rate(),
            source.channels()
        );
        Ok(Box::new(Discarded))
    }
}

struct Discarded;

impl PlaybackHandle for Discarded {
    fn stop(&mut self) {}

    fn is_finished(&self) -> bool {
        true
    }
}
