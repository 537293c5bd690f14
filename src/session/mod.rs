//! Session lifecycle: token, room, microphone, speaker and transport wired
//! into one duplex conversation.
//!
//! * [`SessionOrchestrator`] acquires resources, runs the event loop and
//!   tears down in order.
//! * [`SessionCore`] is the synchronous per-event logic the loop drives.
//! * [`SharedState`] exposes the current [`SessionSnapshot`] to observers.

pub mod conversation;
pub mod engine;
pub mod orchestrator;
pub mod room;
pub mod state;
pub mod token;

pub use conversation::{Conversation, ConversationTurn, Role};
pub use engine::{SessionCore, SessionSettings};
pub use orchestrator::{SessionError, SessionOrchestrator, StopReason};
pub use room::{DetachedRoom, DetachedRoomConnector, LocalTrack, RoomConnector, RoomError, RoomHandle};
pub use state::{lock as lock_snapshot, new_shared_state, SessionSnapshot, SessionState, SharedState};
pub use token::{HttpTokenProvider, TokenError, TokenProvider};
