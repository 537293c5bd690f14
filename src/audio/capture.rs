//! Microphone capture via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle.  Opening it
//! acquires the input device; [`AudioCapture::start`] registers the real-time
//! callback, which regroups whatever the hardware delivers into fixed-size
//! mono [`AudioFrame`]s and hands them to the session over a bounded channel.
//! The returned [`StreamHandle`] is a RAII guard: dropping it releases the
//! device.
//!
//! The callback never blocks: frames go out with `try_send`, and a full queue
//! drops the frame instead of stalling the audio thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio::sync::mpsc;

use super::resample::stereo_to_mono;

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// One capture block as produced by the callback.
///
/// Samples are mono `f32` in `[-1.0, 1.0]` at the device's native rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Mono PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this frame in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Channel count; always 1 once the frame leaves the callback.
    pub channels: u16,
}

impl AudioFrame {
    /// Build a mono frame.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// A running capture stream as seen by the session.
///
/// Dropping the guard releases the device.
pub trait CaptureGuard {
    /// Stop the callback cadence without releasing the device.
    fn pause(&self);
}

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping this value stops the hardware stream and releases the device.
pub struct StreamHandle {
    stream: cpal::Stream,
}

impl CaptureGuard for StreamHandle {
    fn pause(&self) {
        if let Err(e) = self.stream.pause() {
            log::debug!("capture: pause failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while acquiring the microphone or starting capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("capture block size must be non-zero")]
    ZeroBlockSize,

    #[error("input device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported input sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// BlockAssembler
// ---------------------------------------------------------------------------

/// Regroups arbitrary-sized hardware buffers into fixed-size mono blocks.
///
/// Runs inside the audio callback; the only allocation per block is the
/// `Vec` handed to the channel.
struct BlockAssembler {
    block_size: usize,
    channels: u16,
    sample_rate: u32,
    pending: Vec<f32>,
    tx: mpsc::Sender<AudioFrame>,
}

impl BlockAssembler {
    /// `block_size` must be non-zero or `push` would never drain `pending`.
    fn new(
        block_size: usize,
        channels: u16,
        sample_rate: u32,
        tx: mpsc::Sender<AudioFrame>,
    ) -> Result<Self, CaptureError> {
        if block_size == 0 {
            return Err(CaptureError::ZeroBlockSize);
        }
        Ok(Self {
            block_size,
            channels,
            sample_rate,
            pending: Vec::with_capacity(block_size * 2),
            tx,
        })
    }

    fn push(&mut self, interleaved: &[f32]) {
        if self.channels > 1 {
            self.pending
                .extend_from_slice(&stereo_to_mono(interleaved, self.channels));
        } else {
            self.pending.extend_from_slice(interleaved);
        }

        while self.pending.len() >= self.block_size {
            let rest = self.pending.split_off(self.block_size);
            let block = std::mem::replace(&mut self.pending, rest);
            match self.tx.try_send(AudioFrame::mono(block, self.sample_rate)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("capture: frame queue full, dropping block");
                }
                // Session is gone; nothing left to do with the audio.
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone device wrapper built on top of `cpal`.
///
/// ```rust,no_run
/// use duplex_voice::audio::{AudioCapture, AudioFrame};
///
/// # async fn example() {
/// let (tx, mut rx) = tokio::sync::mpsc::channel::<AudioFrame>(32);
/// let capture = AudioCapture::new(None).unwrap();
/// let _handle = capture.start(2048, tx).unwrap();
/// while let Some(frame) = rx.recv().await {
///     println!("{} samples @ {} Hz", frame.samples.len(), frame.sample_rate);
/// }
/// # }
/// ```
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    sample_rate: u32,
    channels: u16,
}

impl AudioCapture {
    /// Acquire an input device: the one called `device_name`, or the host
    /// default when `None`.
    ///
    /// # Errors
    ///
    /// [`CaptureError::NoDevice`] / [`CaptureError::DeviceNotFound`] when no
    /// matching device exists, [`CaptureError::DefaultConfig`] when the device
    /// cannot report a stream configuration.
    pub fn new(device_name: Option<&str>) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?,
            None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
        };

        let supported = device.default_input_config()?;
        let sample_format = supported.sample_format();
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        log::info!(
            "capture: using {} ({} Hz, {} ch, {:?})",
            device.name().unwrap_or_else(|_| "unknown".into()),
            sample_rate,
            channels,
            sample_format
        );

        Ok(Self {
            device,
            config,
            sample_format,
            sample_rate,
            channels,
        })
    }

    /// Register the capture callback and start streaming `block_size`-sample
    /// mono frames into `tx`.
    ///
    /// # Errors
    ///
    /// [`CaptureError::ZeroBlockSize`] for `block_size == 0`,
    /// [`CaptureError::BuildStream`] / [`CaptureError::PlayStream`] if the
    /// platform rejects the stream, [`CaptureError::UnsupportedFormat`] for
    /// sample formats other than `f32` and `i16`.
    pub fn start(
        &self,
        block_size: usize,
        tx: mpsc::Sender<AudioFrame>,
    ) -> Result<StreamHandle, CaptureError> {
        let mut assembler = BlockAssembler::new(block_size, self.channels, self.sample_rate, tx)?;
        let on_error = |err: cpal::StreamError| {
            log::error!("cpal stream error: {err}");
        };

        let stream = match self.sample_format {
            cpal::SampleFormat::F32 => self.device.build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| assembler.push(data),
                on_error,
                None,
            )?,
            cpal::SampleFormat::I16 => {
                let mut scratch: Vec<f32> = Vec::new();
                self.device.build_input_stream(
                    &self.config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        scratch.clear();
                        scratch.extend(data.iter().map(|&s| s as f32 / 32_768.0));
                        assembler.push(&scratch);
                    },
                    on_error,
                    None,
                )?
            }
            other => return Err(CaptureError::UnsupportedFormat(other)),
        };

        stream.play()?;
        Ok(StreamHandle { stream })
    }

    /// Native sample rate of the capture stream in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels the device delivers.
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
