//! Peak-amplitude barge-in detection.
//!
//! [`BargeInDetector`] looks at every raw capture block (before resampling)
//! and reports whether the user is speaking.  A single sample whose
//! magnitude exceeds the threshold is enough; the orchestrator reacts by
//! cancelling any assistant audio that is still playing.
//!
//! The check is a plain peak comparison so it costs one pass over the block
//! and never allocates, which keeps it safe to run once per capture block.

// ---------------------------------------------------------------------------
// BargeInDetector
// ---------------------------------------------------------------------------

/// Default peak threshold.  Quiet room noise on a typical laptop microphone
/// stays below this level.
pub const DEFAULT_BARGE_IN_THRESHOLD: f32 = 0.01;

/// Stateless speech-energy check.
///
/// ```rust
/// use duplex_voice::audio::BargeInDetector;
///
/// let detector = BargeInDetector::new(0.01);
/// assert!(!detector.is_speaking(&[0.0; 2048]));
///
/// let mut block = vec![0.0_f32; 2048];
/// block[1000] = -0.2;
/// assert!(detector.is_speaking(&block));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BargeInDetector {
    threshold: f32,
}

impl BargeInDetector {
    /// Create a detector with the given peak threshold (`[0.0, 1.0]`).
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Threshold currently in use.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Returns `true` when any sample's magnitude is strictly above the
    /// threshold.
    pub fn is_speaking(&self, block: &[f32]) -> bool {
        block.iter().any(|s| s.abs() > self.threshold)
    }
}

impl Default for BargeInDetector {
    fn default() -> Self {
        Self::new(DEFAULT_BARGE_IN_THRESHOLD)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
