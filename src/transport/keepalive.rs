//! Idle keepalive for the uplink.
//!
//! The speech endpoint closes sessions that stay silent for too long, so
//! during natural pauses the client sends short frames of zeros.
//! [`KeepAliveScheduler`] only decides *when*; the session performs the send
//! and reports it back through [`KeepAliveScheduler::mark_sent`].

use std::time::{Duration, Instant};

/// Samples in one keepalive frame (20 ms at 16 kHz).
pub const KEEPALIVE_SAMPLES: usize = 320;

/// Default tick interval and idle limit.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Tracks the last outbound send and says when a keepalive frame is due.
///
/// ```rust
/// use std::time::{Duration, Instant};
/// use duplex_voice::transport::KeepAliveScheduler;
///
/// let t0 = Instant::now();
/// let mut ka = KeepAliveScheduler::new(Duration::from_secs(1));
/// ka.start(t0);
/// assert!(!ka.is_due(t0 + Duration::from_millis(1000)));
/// assert!(ka.is_due(t0 + Duration::from_millis(1001)));
/// ```
#[derive(Debug, Clone)]
pub struct KeepAliveScheduler {
    interval: Duration,
    last_send: Option<Instant>,
    running: bool,
}

impl KeepAliveScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_send: None,
            running: false,
        }
    }

    /// Tick interval and idle limit.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Begin scheduling.  The idle clock starts at `now` unless a send has
    /// already been recorded.
    pub fn start(&mut self, now: Instant) {
        self.running = true;
        self.last_send.get_or_insert(now);
    }

    /// Stop scheduling; a stopped scheduler is never due.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Record an outbound send (real audio, warm-up or keepalive).
    pub fn mark_sent(&mut self, now: Instant) {
        self.last_send = Some(now);
    }

    /// Instant of the last recorded send.
    pub fn last_send(&self) -> Option<Instant> {
        self.last_send
    }

    /// `true` when running and strictly more than one interval has passed
    /// since the last send.
    pub fn is_due(&self, now: Instant) -> bool {
        if !self.running {
            return false;
        }
        match self.last_send {
            Some(last) => now.saturating_duration_since(last) > self.interval,
            None => true,
        }
    }
}

impl Default for KeepAliveScheduler {
    fn default() -> Self {
        Self::new(KEEPALIVE_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn not_due_until_started() {
        let t0 = Instant::now();
        let ka = KeepAliveScheduler::default();
        assert!(!ka.is_due(t0 + ms(5_000)));
    }

    #[test]
    fn due_only_after_strictly_more_than_interval() {
        let t0 = Instant::now();
        let mut ka = KeepAliveScheduler::default();
        ka.start(t0);
        assert!(!ka.is_due(t0 + ms(999)));
        assert!(!ka.is_due(t0 + ms(1_000)));
        assert!(ka.is_due(t0 + ms(1_001)));
    }

    #[test]
    fn any_send_resets_idle_clock() {
        let t0 = Instant::now();
        let mut ka = KeepAliveScheduler::default();
        ka.start(t0);
        ka.mark_sent(t0 + ms(900));
        assert!(!ka.is_due(t0 + ms(1_500)));
        assert!(ka.is_due(t0 + ms(1_901)));
    }

    #[test]
    fn start_keeps_earlier_send() {
        let t0 = Instant::now();
        let mut ka = KeepAliveScheduler::default();
        ka.mark_sent(t0);
        ka.start(t0 + ms(800));
        assert_eq!(ka.last_send(), Some(t0));
        assert!(ka.is_due(t0 + ms(1_001)));
    }

    #[test]
    fn stop_silences_scheduler() {
        let t0 = Instant::now();
        let mut ka = KeepAliveScheduler::default();
        ka.start(t0);
        ka.stop();
        assert!(!ka.is_running());
        assert!(!ka.is_due(t0 + ms(10_000)));
    }
}
