//! Session orchestrator: connect, run the duplex loop, tear down.
//!
//! # Lifecycle
//!
//! ```text
//! connect()
//!   token ─▶ room join ─▶ microphone open ─▶ publish track ─▶ speaker open
//!     ─▶ transport connect ─▶ warm-up frame ─▶ capture start        [Connected]
//!   any failure ─▶ release what was acquired, record the error  [Disconnected]
//!
//! run()
//!   select { shutdown | transport event | capture block | keepalive tick }
//!     └─▶ drain everything else already queued
//!     └─▶ SessionCore::apply_tick (inbound first, then capture)
//!     └─▶ SessionCore::poll_playback
//!
//! teardown
//!   keepalive ─▶ capture pause ─▶ playback stop ─▶ transport close
//!     ─▶ microphone release ─▶ room leave                    [Disconnected]
//! ```
//!
//! The orchestrator holds the cpal stream and the speaker, neither of which
//! is `Send`, so both futures are driven with `block_on` on the thread that
//! created them.  The socket reader and writer are ordinary spawned tasks.

use std::future::Future;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::audio::{AudioCapture, AudioFrame, CaptureError, CaptureGuard};
use crate::config::AppConfig;
use crate::playback::{PlaybackBackend, PlaybackError, TtsPlayer};
use crate::transport::{StreamTransport, TransportError, TransportEvent, TransportMessage};

use super::engine::{SessionCore, SessionSettings};
use super::room::{LocalTrack, RoomConnector, RoomError, RoomHandle};
use super::state::{lock, SessionState, SharedState};
use super::token::{TokenError, TokenProvider};

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Why a session could not be established.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("token acquisition failed: {0}")]
    Token(#[from] TokenError),

    #[error("room unavailable: {0}")]
    Room(#[from] RoomError),

    #[error("microphone unavailable: {0}")]
    Microphone(#[from] CaptureError),

    #[error("audio output unavailable: {0}")]
    Output(#[from] PlaybackError),

    #[error("transport unavailable: {0}")]
    Transport(#[from] TransportError),
}

/// Why [`SessionOrchestrator::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The caller's shutdown future completed.
    Shutdown,
    /// The remote endpoint closed the socket.
    TransportClosed,
    /// The capture stream stopped producing blocks.
    CaptureEnded,
}

// ---------------------------------------------------------------------------
// SessionOrchestrator
// ---------------------------------------------------------------------------

/// A connected session.
pub struct SessionOrchestrator {
    core: SessionCore<StreamTransport>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    frames: mpsc::Receiver<AudioFrame>,
    capture: Box<dyn CaptureGuard>,
    room: Box<dyn RoomHandle>,
    state: SharedState,
}

impl SessionOrchestrator {
    /// Acquire every resource in order and start streaming.
    ///
    /// The configuration is validated before anything is acquired.
    /// `open_output` is called only once the microphone is live, so a
    /// failed token or room lookup never touches the speaker.  On any error
    /// the resources acquired so far are released, the snapshot goes back to
    /// [`SessionState::Disconnected`] and `last_error` holds the cause.
    pub async fn connect<F>(
        config: &AppConfig,
        tokens: &dyn TokenProvider,
        rooms: &dyn RoomConnector,
        open_output: F,
        state: SharedState,
    ) -> Result<Self, SessionError>
    where
        F: FnOnce() -> Result<Box<dyn PlaybackBackend>, PlaybackError>,
    {
        {
            let mut snap = lock(&state);
            snap.state = SessionState::Connecting;
            snap.last_error = None;
        }
        log::info!("session: connecting as {:?}", config.server.identity);

        match Self::acquire(config, tokens, rooms, open_output, state.clone()).await {
            Ok(session) => {
                let mut snap = lock(&state);
                snap.state = SessionState::Connected;
                snap.listening = true;
                log::info!("session: connected, listening");
                Ok(session)
            }
            Err(e) => {
                log::error!("session: connect failed: {e}");
                let mut snap = lock(&state);
                snap.state = SessionState::Disconnected;
                snap.listening = false;
                snap.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn acquire<F>(
        config: &AppConfig,
        tokens: &dyn TokenProvider,
        rooms: &dyn RoomConnector,
        open_output: F,
        state: SharedState,
    ) -> Result<Self, SessionError>
    where
        F: FnOnce() -> Result<Box<dyn PlaybackBackend>, PlaybackError>,
    {
        config
            .validate()
            .map_err(|e| SessionError::Config(format!("{e:#}")))?;

        let token = tokens.fetch_token(&config.server.identity).await?;
        log::debug!("session: token acquired");

        let mut room = rooms.connect(&config.server.room_url, &token).await?;
        log::info!("session: joined room {}", room.name());

        match Self::acquire_media(config, room.as_mut(), open_output, state.clone()).await {
            Ok((core, events, frames, capture)) => {
                Ok(Self::from_parts(core, events, frames, capture, room, state))
            }
            Err(e) => {
                room.disconnect();
                Err(e)
            }
        }
    }

    /// Everything after the room join.  Locals drop in reverse order on
    /// early return, which releases the microphone and speaker.
    async fn acquire_media<F>(
        config: &AppConfig,
        room: &mut dyn RoomHandle,
        open_output: F,
        state: SharedState,
    ) -> Result<
        (
            SessionCore<StreamTransport>,
            mpsc::UnboundedReceiver<TransportEvent>,
            mpsc::Receiver<AudioFrame>,
            Box<dyn CaptureGuard>,
        ),
        SessionError,
    >
    where
        F: FnOnce() -> Result<Box<dyn PlaybackBackend>, PlaybackError>,
    {
        let mic = AudioCapture::new(config.audio.input_device.as_deref())?;
        room.publish_track(&LocalTrack {
            name: "microphone".into(),
            sample_rate: mic.sample_rate(),
            channels: 1,
        })?;

        let backend = open_output()?;
        let (transport, events) = StreamTransport::connect(&config.server.transport_url).await?;

        let mut core = SessionCore::new(
            transport,
            TtsPlayer::new(backend),
            SessionSettings::from_config(config),
            state,
        );
        core.on_transport_open(Instant::now());

        let (frame_tx, frames) = mpsc::channel(config.audio.frame_queue);
        let capture: Box<dyn CaptureGuard> = match mic.start(config.audio.block_size, frame_tx) {
            Ok(handle) => Box::new(handle),
            Err(e) => {
                core.stop_keepalive();
                core.into_sink().close().await;
                return Err(e.into());
            }
        };

        Ok((core, events, frames, capture))
    }

    fn from_parts(
        core: SessionCore<StreamTransport>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        frames: mpsc::Receiver<AudioFrame>,
        capture: Box<dyn CaptureGuard>,
        room: Box<dyn RoomHandle>,
        state: SharedState,
    ) -> Self {
        Self {
            core,
            events,
            frames,
            capture,
            room,
            state,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Drive the session until `shutdown` completes or the transport closes,
    /// then tear everything down.
    pub async fn run<S>(mut self, shutdown: S) -> StopReason
    where
        S: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.core.keepalive_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut inbound: Vec<TransportMessage> = Vec::new();
        let mut blocks: Vec<AudioFrame> = Vec::new();

        let reason = loop {
            let mut stop = None;

            tokio::select! {
                biased;

                _ = &mut shutdown => stop = Some(StopReason::Shutdown),

                event = self.events.recv() => match event {
                    Some(TransportEvent::Message(m)) => inbound.push(m),
                    Some(TransportEvent::Closed) | None => stop = Some(StopReason::TransportClosed),
                },

                frame = self.frames.recv() => match frame {
                    Some(f) => blocks.push(f),
                    None => stop = Some(StopReason::CaptureEnded),
                },

                _ = ticker.tick() => {
                    self.core.on_keepalive_tick(Instant::now());
                }
            }

            // Everything already queued belongs to this tick.
            while let Ok(event) = self.events.try_recv() {
                match event {
                    TransportEvent::Message(m) => inbound.push(m),
                    TransportEvent::Closed => {
                        stop.get_or_insert(StopReason::TransportClosed);
                    }
                }
            }
            while let Ok(f) = self.frames.try_recv() {
                blocks.push(f);
            }

            self.core
                .apply_tick(inbound.drain(..), blocks.drain(..), Instant::now());
            self.core.poll_playback();

            if let Some(reason) = stop {
                break reason;
            }
        };

        match reason {
            StopReason::Shutdown => log::info!("session: shutdown requested"),
            StopReason::TransportClosed => self.core.on_transport_closed(),
            StopReason::CaptureEnded => log::warn!("session: capture stream ended"),
        }

        self.teardown().await;
        reason
    }

    async fn teardown(self) {
        let Self {
            mut core,
            events,
            frames,
            capture,
            mut room,
            state,
        } = self;

        core.stop_keepalive();
        capture.pause();
        core.stop_playback();
        drop(events);
        core.into_sink().close().await;
        drop(frames);
        drop(capture);
        room.disconnect();

        let mut snap = lock(&state);
        snap.state = SessionState::Disconnected;
        snap.listening = false;
        log::info!(
            "session: disconnected ({} frames, {} keepalives, {} barge-ins)",
            snap.frames_sent,
            snap.keepalives_sent,
            snap.barge_ins
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    use super::*;
    use crate::playback::SilentBackend;
    use crate::session::conversation::ConversationTurn;
    use crate::session::state::new_shared_state;

    const WAIT: Duration = Duration::from_secs(5);

    struct FixedToken(Result<&'static str, u16>);

    #[async_trait]
    impl TokenProvider for FixedToken {
        async fn fetch_token(&self, _identity: &str) -> Result<String, TokenError> {
            self.0.map(str::to_string).map_err(TokenError::Status)
        }
    }

    #[derive(Default)]
    struct RoomProbe {
        joins: AtomicUsize,
        left: AtomicBool,
    }

    struct ProbeRoom(Arc<RoomProbe>);

    impl RoomHandle for ProbeRoom {
        fn name(&self) -> &str {
            "probe"
        }

        fn publish_track(&mut self, _track: &LocalTrack) -> Result<(), RoomError> {
            Ok(())
        }

        fn disconnect(&mut self) {
            self.0.left.store(true, Ordering::SeqCst);
        }
    }

    struct ProbeConnector {
        probe: Arc<RoomProbe>,
        refuse: bool,
    }

    #[async_trait]
    impl RoomConnector for ProbeConnector {
        async fn connect(&self, _url: &str, _token: &str) -> Result<Box<dyn RoomHandle>, RoomError> {
            self.probe.joins.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(RoomError::Connect("refused".into()));
            }
            Ok(Box::new(ProbeRoom(self.probe.clone())))
        }
    }

    fn no_output() -> Result<Box<dyn PlaybackBackend>, PlaybackError> {
        panic!("speaker must not be opened before the microphone");
    }

    #[tokio::test]
    async fn token_failure_leaves_session_disconnected() {
        let state = new_shared_state();
        let probe = Arc::new(RoomProbe::default());
        let rooms = ProbeConnector {
            probe: probe.clone(),
            refuse: false,
        };

        let result = SessionOrchestrator::connect(
            &AppConfig::default(),
            &FixedToken(Err(503)),
            &rooms,
            no_output,
            state.clone(),
        )
        .await;

        assert!(matches!(result, Err(SessionError::Token(TokenError::Status(503)))));
        assert_eq!(probe.joins.load(Ordering::SeqCst), 0);

        let snap = lock(&state);
        assert_eq!(snap.state, SessionState::Disconnected);
        assert!(!snap.listening);
        assert!(snap.last_error.as_deref().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn room_failure_leaves_session_disconnected() {
        let state = new_shared_state();
        let probe = Arc::new(RoomProbe::default());
        let rooms = ProbeConnector {
            probe: probe.clone(),
            refuse: true,
        };

        let result = SessionOrchestrator::connect(
            &AppConfig::default(),
            &FixedToken(Ok("tok")),
            &rooms,
            no_output,
            state.clone(),
        )
        .await;

        assert!(matches!(result, Err(SessionError::Room(_))));
        assert_eq!(probe.joins.load(Ordering::SeqCst), 1);
        assert_eq!(lock(&state).state, SessionState::Disconnected);
    }

    #[tokio::test]
    async fn missing_microphone_releases_room() {
        let state = new_shared_state();
        let probe = Arc::new(RoomProbe::default());
        let rooms = ProbeConnector {
            probe: probe.clone(),
            refuse: false,
        };
        let mut config = AppConfig::default();
        config.audio.input_device = Some("no-such-input-device-7f3a".into());

        let result =
            SessionOrchestrator::connect(&config, &FixedToken(Ok("tok")), &rooms, no_output, state.clone())
                .await;

        assert!(matches!(result, Err(SessionError::Microphone(_))));
        assert!(probe.left.load(Ordering::SeqCst));

        let snap = lock(&state);
        assert_eq!(snap.state, SessionState::Disconnected);
        assert!(snap.last_error.is_some());
    }

    #[test]
    fn error_messages_name_the_failed_resource() {
        let e = SessionError::from(TokenError::Timeout);
        assert!(e.to_string().starts_with("token acquisition failed"));

        let e = SessionError::from(TransportError::NotOpen);
        assert!(e.to_string().starts_with("transport unavailable"));
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    async fn connect_with(
        config: AppConfig,
    ) -> (Result<SessionOrchestrator, SessionError>, Arc<RoomProbe>, SharedState) {
        let state = new_shared_state();
        let probe = Arc::new(RoomProbe::default());
        let rooms = ProbeConnector {
            probe: probe.clone(),
            refuse: false,
        };
        let result =
            SessionOrchestrator::connect(&config, &FixedToken(Ok("tok")), &rooms, no_output, state.clone())
                .await;
        (result, probe, state)
    }

    #[tokio::test]
    async fn zero_frame_queue_is_rejected_before_acquisition() {
        let mut config = AppConfig::default();
        config.audio.frame_queue = 0;

        let (result, probe, state) = connect_with(config).await;
        assert!(matches!(result, Err(SessionError::Config(_))));
        assert_eq!(probe.joins.load(Ordering::SeqCst), 0);

        let snap = lock(&state);
        assert_eq!(snap.state, SessionState::Disconnected);
        assert!(snap.last_error.as_deref().unwrap().contains("frame_queue"));
    }

    #[tokio::test]
    async fn zero_keepalive_interval_is_rejected() {
        let mut config = AppConfig::default();
        config.transport.keepalive_interval_ms = 0;

        let (result, probe, _) = connect_with(config).await;
        assert!(matches!(result, Err(SessionError::Config(_))));
        assert_eq!(probe.joins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_block_size_is_rejected() {
        let mut config = AppConfig::default();
        config.audio.block_size = 0;

        let (result, probe, _) = connect_with(config).await;
        assert!(matches!(result, Err(SessionError::Config(_))));
        assert_eq!(probe.joins.load(Ordering::SeqCst), 0);
    }

    // -----------------------------------------------------------------------
    // Event loop and teardown
    // -----------------------------------------------------------------------

    type Journal = Arc<Mutex<Vec<&'static str>>>;

    struct FakeCapture(Journal);

    impl CaptureGuard for FakeCapture {
        fn pause(&self) {
            self.0.lock().unwrap().push("capture paused");
        }
    }

    impl Drop for FakeCapture {
        fn drop(&mut self) {
            self.0.lock().unwrap().push("capture released");
        }
    }

    struct JournalRoom(Journal);

    impl RoomHandle for JournalRoom {
        fn name(&self) -> &str {
            "journal"
        }

        fn publish_track(&mut self, _track: &LocalTrack) -> Result<(), RoomError> {
            Ok(())
        }

        fn disconnect(&mut self) {
            self.0.lock().unwrap().push("room left");
        }
    }

    /// Build a connected session over a real socket with a fake microphone.
    async fn session_over(
        url: &str,
        state: SharedState,
        journal: Journal,
    ) -> (SessionOrchestrator, mpsc::Sender<AudioFrame>) {
        let (transport, events) = StreamTransport::connect(url).await.unwrap();
        let mut core = SessionCore::new(
            transport,
            TtsPlayer::new(Box::new(SilentBackend)),
            SessionSettings::default(),
            state.clone(),
        );
        core.on_transport_open(Instant::now());

        {
            let mut snap = lock(&state);
            snap.state = SessionState::Connected;
            snap.listening = true;
        }

        let (frame_tx, frames) = mpsc::channel(8);
        let session = SessionOrchestrator::from_parts(
            core,
            events,
            frames,
            Box::new(FakeCapture(journal.clone())),
            Box::new(JournalRoom(journal)),
            state,
        );
        (session, frame_tx)
    }

    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws/audio", listener.local_addr().unwrap());
        (listener, url)
    }

    #[tokio::test]
    async fn remote_close_ends_run_and_tears_down() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

            let warmup = ws.next().await.unwrap().unwrap();
            assert_eq!(warmup.len(), 32_000);

            ws.send(Message::Text("__TRANSCRIPT__:hello".into())).await.unwrap();
            ws.close(None).await.unwrap();

            let mut after_close = 0;
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_binary() {
                    after_close += 1;
                }
            }
            after_close
        });

        let state = new_shared_state();
        let journal = Journal::default();
        let (session, _frame_tx) = session_over(&url, state.clone(), journal.clone()).await;

        let reason = tokio::time::timeout(WAIT, session.run(std::future::pending()))
            .await
            .unwrap();
        assert_eq!(reason, StopReason::TransportClosed);

        let after_close = tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
        assert_eq!(after_close, 0);

        let snap = lock(&state);
        assert_eq!(snap.state, SessionState::Disconnected);
        assert!(!snap.listening);
        assert_eq!(snap.keepalives_sent, 0);
        assert_eq!(snap.conversation.turns(), &[ConversationTurn::user("hello")]);
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["capture paused", "capture released", "room left"]
        );
    }

    #[tokio::test]
    async fn shutdown_flushes_queued_blocks_then_closes() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let mut sizes = Vec::new();
            while let Some(Ok(msg)) = ws.next().await {
                match msg {
                    Message::Binary(bytes) => sizes.push(bytes.len()),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            sizes
        });

        let state = new_shared_state();
        let journal = Journal::default();
        let (session, frame_tx) = session_over(&url, state.clone(), journal.clone()).await;
        frame_tx
            .send(AudioFrame::mono(vec![0.0; 2048], 48_000))
            .await
            .unwrap();

        let reason = tokio::time::timeout(WAIT, session.run(async {})).await.unwrap();
        assert_eq!(reason, StopReason::Shutdown);

        let sizes = tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
        assert_eq!(sizes, vec![32_000, 683 * 2]);

        let snap = lock(&state);
        assert_eq!(snap.state, SessionState::Disconnected);
        assert_eq!(snap.frames_sent, 1);
        assert_eq!(journal.lock().unwrap().last(), Some(&"room left"));
    }
}
