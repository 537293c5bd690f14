//! Application entry point: duplex voice client.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (default on first run) and validate it.
//! 3. Create the [`tokio`] runtime (multi-thread, 2 workers for the socket
//!    tasks and the token request).
//! 4. Build the token provider, room connector and speaker factory.
//! 5. Connect the session, then run it on the main thread until Ctrl-C or
//!    the backend hangs up.
//! 6. Log the conversation.

use anyhow::{Context, Result};
use duplex_voice::{
    config::AppConfig,
    playback::{PlaybackBackend, PlaybackError, RodioBackend, SilentBackend},
    session::{
        lock_snapshot, new_shared_state, DetachedRoomConnector, HttpTokenProvider, Role,
        SessionOrchestrator, StopReason,
    },
};

fn open_output(enabled: bool) -> Result<Box<dyn PlaybackBackend>, PlaybackError> {
    if enabled {
        Ok(Box::new(RodioBackend::new()?))
    } else {
        log::info!("playback: output disabled, speech will be discarded");
        Ok(Box::new(SilentBackend))
    }
}

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("duplex-voice starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    config.validate().context("invalid configuration")?;

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Collaborators
    let tokens = HttpTokenProvider::from_config(&config.server);
    let rooms = DetachedRoomConnector::new(config.server.room_name.clone());
    let state = new_shared_state();
    let output_enabled = config.playback.output_enabled;

    // 5. Session.  cpal and rodio handles are not `Send`, so the session
    //    future stays on this thread.
    let reason = rt.block_on(async {
        let session = SessionOrchestrator::connect(
            &config,
            &tokens,
            &rooms,
            || open_output(output_enabled),
            state.clone(),
        )
        .await?;

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C ({e}); running until the backend closes");
                std::future::pending::<()>().await;
            }
        };

        Ok::<_, anyhow::Error>(session.run(shutdown).await)
    })?;

    // 6. Report
    let snap = lock_snapshot(&state);
    for turn in snap.conversation.turns() {
        let who = match turn.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        log::info!("{who}: {}", turn.content);
    }
    match serde_json::to_string(&snap.conversation) {
        Ok(json) => log::debug!("session: conversation {json}"),
        Err(e) => log::warn!("Failed to serialise conversation: {e}"),
    }

    if reason == StopReason::CaptureEnded {
        anyhow::bail!("microphone stream ended unexpectedly");
    }
    Ok(())
}
