//! Persistent full-duplex WebSocket to the speech backend.
//!
//! [`StreamTransport::connect`] opens the socket, splits it and spawns two
//! tasks:
//!
//! * a **writer** that drains a bounded queue into the socket, so
//!   [`FrameSink::send`] is synchronous and never waits on the network;
//! * a **reader** that forwards every inbound text/binary frame, in arrival
//!   order, as a [`TransportEvent`] and finishes with
//!   [`TransportEvent::Closed`].
//!
//! Sends are fire-and-forget: a frame offered while the socket is not open is
//! rejected with [`TransportError::NotOpen`], and a frame offered while
//! [`OUTBOUND_QUEUE`] frames are still waiting for a slow peer is rejected
//! with [`TransportError::QueueFull`].  Neither is buffered for later.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use super::message::TransportMessage;

/// How long `close` waits for the writer to flush the close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Frames queued for the writer before `send` starts dropping (about three
/// seconds of capture blocks).
pub const OUTBOUND_QUEUE: usize = 64;

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket is not in the open state; the frame was dropped.
    #[error("transport is not open")]
    NotOpen,

    /// The writer is behind by [`OUTBOUND_QUEUE`] frames; the frame was dropped.
    #[error("outbound queue is full")]
    QueueFull,

    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
}

// ---------------------------------------------------------------------------
// TransportEvent
// ---------------------------------------------------------------------------

/// Everything the reader task reports to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(TransportMessage),
    /// The socket closed (remote close, I/O error or local `close`).
    Closed,
}

// ---------------------------------------------------------------------------
// FrameSink
// ---------------------------------------------------------------------------

/// Outbound half of a transport, as seen by the session.
///
/// Implementations must not block: `send` is called from the capture path.
pub trait FrameSink {
    /// Queue one binary frame.  Fails with [`TransportError::NotOpen`] when
    /// the channel is not open.
    fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError>;

    fn is_open(&self) -> bool;
}

// ---------------------------------------------------------------------------
// StreamTransport
// ---------------------------------------------------------------------------

/// Client side of the audio WebSocket.
pub struct StreamTransport {
    url: String,
    outbound: mpsc::Sender<Message>,
    open: Arc<AtomicBool>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl StreamTransport {
    /// Open the socket at `url` and start the reader/writer tasks.
    ///
    /// Returns the transport together with the receiver of inbound events.
    ///
    /// # Errors
    ///
    /// [`TransportError::Connect`] when the TCP connect or WebSocket
    /// handshake fails.
    pub async fn connect(
        url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TransportEvent>), TransportError> {
        let (socket, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|source| TransportError::Connect {
                url: url.to_string(),
                source,
            })?;
        log::info!("transport: connected to {url}");

        let (mut ws_tx, mut ws_rx) = socket.split();
        let open = Arc::new(AtomicBool::new(true));
        let (outbound, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
        let (events_tx, events_rx) = mpsc::unbounded_channel::<TransportEvent>();

        let writer_open = Arc::clone(&open);
        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = ws_tx.send(msg).await {
                    log::debug!("transport: write failed: {e}");
                    break;
                }
                if closing {
                    break;
                }
            }
            writer_open.store(false, Ordering::Release);
            let _ = ws_tx.close().await;
        });

        let reader_open = Arc::clone(&open);
        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                let message = match frame {
                    Ok(Message::Text(text)) => TransportMessage::Text(text),
                    Ok(Message::Binary(bytes)) => TransportMessage::Binary(bytes),
                    Ok(Message::Close(reason)) => {
                        log::info!("transport: remote closed ({reason:?})");
                        break;
                    }
                    // Ping/pong are answered by tungstenite itself.
                    Ok(_) => continue,
                    Err(e) => {
                        log::warn!("transport: read failed: {e}");
                        break;
                    }
                };
                if events_tx.send(TransportEvent::Message(message)).is_err() {
                    break;
                }
            }
            reader_open.store(false, Ordering::Release);
            let _ = events_tx.send(TransportEvent::Closed);
        });

        Ok((
            Self {
                url: url.to_string(),
                outbound,
                open,
                writer,
                reader,
            },
            events_rx,
        ))
    }

    /// Endpoint this transport is connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a close frame and stop both tasks.
    pub async fn close(mut self) {
        self.open.store(false, Ordering::Release);
        // With a full queue the writer still closes the socket once the
        // sender is gone.
        let _ = self.outbound.try_send(Message::Close(None));
        drop(self.outbound);

        if !finish_or_abort(&mut self.writer, CLOSE_GRACE).await {
            log::debug!("transport: writer did not finish within {CLOSE_GRACE:?}, aborted");
        }
        self.reader.abort();
        log::info!("transport: closed {}", self.url);
    }
}

/// Wait up to `grace` for `task` to finish, aborting it otherwise.
///
/// Returns `true` when the task finished on its own.
async fn finish_or_abort(task: &mut JoinHandle<()>, grace: Duration) -> bool {
    if tokio::time::timeout(grace, &mut *task).await.is_ok() {
        return true;
    }
    task.abort();
    false
}

impl FrameSink for StreamTransport {
    fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.outbound
            .try_send(Message::Binary(bytes))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => TransportError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => TransportError::NotOpen,
            })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}
