//! Session state machine and the observable snapshot.
//!
//! [`SessionState`] tracks the connect lifecycle.  [`SessionSnapshot`] is the
//! single source of truth for anything outside the event loop (a UI, the
//! binary's shutdown report): state, whether the microphone is live, the
//! conversation so far and the last error.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<SessionSnapshot>>`.

use std::sync::{Arc, Mutex, MutexGuard};

use super::conversation::Conversation;
use crate::playback::PlayerState;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Connection lifecycle.
///
/// ```text
/// Disconnected ──connect()──▶ Connecting ──all resources acquired──▶ Connected
/// Connecting ──any acquisition error──▶ Disconnected
/// Connected ──transport closed / shutdown──▶ Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl SessionState {
    /// A short human-readable label suitable for a status line.
    ///
    /// ```
    /// use duplex_voice::session::SessionState;
    ///
    /// assert_eq!(SessionState::Connected.label(), "Connected");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connecting => "Connecting",
            SessionState::Connected => "Connected",
        }
    }

    pub fn is_connected(&self) -> bool {
        *self == SessionState::Connected
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// Everything an observer may want to render.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub state: SessionState,

    /// Microphone frames are flowing to the transport.
    pub listening: bool,

    /// Current state of the speech player.
    pub player: PlayerState,

    pub conversation: Conversation,

    /// Human-readable cause of the last fatal error.
    pub last_error: Option<String>,

    /// Capture frames handed to the transport.
    pub frames_sent: u64,
    /// Keepalive frames handed to the transport.
    pub keepalives_sent: u64,
    /// Playbacks cut short by the user speaking.
    pub barge_ins: u64,
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`SessionSnapshot`].
///
/// Lock for a short critical section only; never hold the guard across an
/// `.await`.
pub type SharedState = Arc<Mutex<SessionSnapshot>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(SessionSnapshot::default()))
}

/// Lock the snapshot, recovering the data if a panicking thread poisoned it.
pub fn lock(state: &SharedState) -> MutexGuard<'_, SessionSnapshot> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_disconnected() {
        let snap = SessionSnapshot::default();
        assert_eq!(snap.state, SessionState::Disconnected);
        assert!(!snap.listening);
        assert!(snap.conversation.is_empty());
        assert!(snap.last_error.is_none());
    }

    #[test]
    fn labels() {
        assert_eq!(SessionState::Disconnected.label(), "Disconnected");
        assert_eq!(SessionState::Connecting.label(), "Connecting");
        assert_eq!(SessionState::Connected.label(), "Connected");
    }

    #[test]
    fn only_connected_is_connected() {
        assert!(SessionState::Connected.is_connected());
        assert!(!SessionState::Connecting.is_connected());
        assert!(!SessionState::Disconnected.is_connected());
    }

    #[test]
    fn shared_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedState>();
    }

    #[test]
    fn shared_state_can_be_cloned_and_mutated() {
        let state = new_shared_state();
        let state2 = Arc::clone(&state);

        lock(&state).state = SessionState::Connecting;
        assert_eq!(lock(&state2).state, SessionState::Connecting);
    }
}
