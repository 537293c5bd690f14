//! Room / signalling collaborator.
//!
//! Joining a room and publishing the microphone track belongs to an external
//! signalling library; the session talks to it only through
//! [`RoomConnector`] and [`RoomHandle`].  [`DetachedRoomConnector`] is the
//! built-in implementation for deployments that have no signalling server:
//! it joins nothing and only records what would have been published.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room connect failed: {0}")]
    Connect(String),

    #[error("failed to publish track: {0}")]
    Publish(String),
}

/// Description of the local microphone track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// A joined room.
pub trait RoomHandle: Send {
    /// Room name, for logging.
    fn name(&self) -> &str;

    fn publish_track(&mut self, track: &LocalTrack) -> Result<(), RoomError>;

    fn disconnect(&mut self);
}

#[async_trait]
pub trait RoomConnector: Send + Sync {
    async fn connect(&self, server_url: &str, token: &str) -> Result<Box<dyn RoomHandle>, RoomError>;
}

// ---------------------------------------------------------------------------
// DetachedRoomConnector
// ---------------------------------------------------------------------------

/// Connector that never leaves the process.
#[derive(Debug, Clone)]
pub struct DetachedRoomConnector {
    room_name: String,
}

impl DetachedRoomConnector {
    pub fn new(room_name: impl Into<String>) -> Self {
        Self {
            room_name: room_name.into(),
        }
    }
}

#[async_trait]
impl RoomConnector for DetachedRoomConnector {
    async fn connect(&self, server_url: &str, token: &str) -> Result<Box<dyn RoomHandle>, RoomError> {
        if token.is_empty() {
            return Err(RoomError::Connect("empty token".into()));
        }
        log::debug!("room: detached from {server_url}");
        Ok(Box::new(DetachedRoom {
            name: self.room_name.clone(),
            published: Vec::new(),
        }))
    }
}

/// Handle returned by [`DetachedRoomConnector`].
#[derive(Debug)]
pub struct DetachedRoom {
    name: String,
    published: Vec<LocalTrack>,
}

impl DetachedRoom {
    pub fn published(&self) -> &[LocalTrack] {
        &self.published
    }
}

impl RoomHandle for DetachedRoom {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish_track(&mut self, track: &LocalTrack) -> Result<(), RoomError> {
        log::info!(
            "room {}: publishing {} ({} Hz, {} ch)",
            self.name,
            track.name,
            track.sample_rate,
            track.channels
        );
        self.published.push(track.clone());
        Ok(())
    }

    fn disconnect(&mut self) {
        log::info!("room {}: left", self.name);
        self.published.clear();
    }
}
