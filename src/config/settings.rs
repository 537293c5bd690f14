//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a partial file only overrides the
//! keys it names.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::audio::vad::DEFAULT_BARGE_IN_THRESHOLD;
use crate::transport::{KEEPALIVE_INTERVAL, KEEPALIVE_SAMPLES, WARMUP_SAMPLES};

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Where the session's collaborators live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Token endpoint; queried as `GET {token_url}?identity={identity}`.
    pub token_url: String,
    /// Participant identity requested from the token endpoint.
    pub identity: String,
    /// Room / signalling server URL handed to the room connector.
    pub room_url: String,
    /// Room name used when no signalling backend reports one.
    pub room_name: String,
    /// WebSocket endpoint that receives PCM and returns text + speech.
    pub transport_url: String,
    /// Maximum seconds to wait for the token endpoint.
    pub token_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            token_url: "http://localhost:8000/get_token".into(),
            identity: "test-user".into(),
            room_url: "wss://localhost:7880".into(),
            room_name: "default".into(),
            transport_url: "ws://localhost:8000/ws/audio".into(),
            token_timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Capture, resampling and barge-in settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Samples per capture block at the device rate (power of two).
    pub block_size: usize,
    /// Uplink sample rate in Hz.  The backend expects 16 000.
    pub target_sample_rate: u32,
    /// Peak amplitude above which a capture block counts as speech.
    pub barge_in_threshold: f32,
    /// Input device name; `None` means the system default.
    pub input_device: Option<String>,
    /// Capture blocks buffered between the audio thread and the session.
    pub frame_queue: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            block_size: 2048,
            target_sample_rate: 16_000,
            barge_in_threshold: DEFAULT_BARGE_IN_THRESHOLD,
            input_device: None,
            frame_queue: 32,
        }
    }
}

// ---------------------------------------------------------------------------
// TransportConfig
// ---------------------------------------------------------------------------

/// Warm-up and keepalive framing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Zero samples sent as soon as the socket opens.
    pub warmup_samples: usize,
    /// Zero samples per keepalive frame.
    pub keepalive_samples: usize,
    /// Keepalive tick and idle limit in milliseconds.
    pub keepalive_interval_ms: u64,
}

impl TransportConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            warmup_samples: WARMUP_SAMPLES,
            keepalive_samples: KEEPALIVE_SAMPLES,
            keepalive_interval_ms: KEEPALIVE_INTERVAL.as_millis() as u64,
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Synthesized-speech output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Play speech on the default output device.  When `false`, inbound
    /// audio is decoded and discarded (headless hosts).
    pub output_enabled: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            output_enabled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use duplex_voice::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub transport: TransportConfig,
    pub playback: PlaybackConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.audio.block_size.is_power_of_two() {
            bail!("audio.block_size must be a power of two, got {}", self.audio.block_size);
        }
        if self.audio.target_sample_rate == 0 {
            bail!("audio.target_sample_rate must be non-zero");
        }
        if self.audio.frame_queue == 0 {
            bail!("audio.frame_queue must be non-zero");
        }
        if self.transport.keepalive_interval_ms == 0 {
            bail!("transport.keepalive_interval_ms must be non-zero");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
