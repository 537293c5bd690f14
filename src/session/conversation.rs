//! Conversation log fed by the inbound text channel.
//!
//! User turns arrive whole (one transcript message each).  Assistant turns
//! arrive as a stream of fragments that are concatenated onto the current
//! assistant turn until the next transcript starts a new exchange.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered append/merge log of turns.  Serialises as a plain array of
/// turns.
///
/// ```rust
/// use duplex_voice::session::{Conversation, ConversationTurn};
///
/// let mut log = Conversation::default();
/// log.push_transcript("hello");
/// log.push_assistant_fragment("Hi");
/// log.push_assistant_fragment(" there");
/// assert_eq!(log.last(), Some(&ConversationTurn::assistant("Hi there")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    /// Append a finalized user utterance.  The next assistant fragment will
    /// open a fresh assistant turn.
    pub fn push_transcript(&mut self, text: impl Into<String>) {
        self.turns.push(ConversationTurn::user(text));
    }

    /// Extend the current assistant turn, or start one if the last turn is
    /// not the assistant's.
    pub fn push_assistant_fragment(&mut self, fragment: &str) {
        match self.turns.last_mut() {
            Some(turn) if turn.role == Role::Assistant => turn.content.push_str(fragment),
            _ => self.turns.push(ConversationTurn::assistant(fragment)),
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
