//! Wire messages exchanged with the speech backend.
//!
//! Outbound traffic is always binary PCM.  Inbound traffic shares one channel
//! for three meanings, told apart first by frame type and then by content:
//!
//! | Frame | Content | Meaning |
//! |-------|---------|---------|
//! | text | starts with `__TRANSCRIPT__:` | finalized user transcript |
//! | text | anything else | incremental assistant text |
//! | binary | encoded audio | synthesized speech to play |
//!
//! [`InboundEvent::parse`] is the only place that knows about this layout.

/// Prefix that marks a text frame as a user transcript.
pub const TRANSCRIPT_MARKER: &str = "__TRANSCRIPT__:";

/// A raw frame as it travels over the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMessage {
    Binary(Vec<u8>),
    Text(String),
}

/// What an inbound [`TransportMessage`] means to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Finalized user utterance; closes the running assistant turn.
    Transcript(String),
    /// Fragment of the assistant's reply, to be appended to its turn.
    AssistantText(String),
    /// Encoded synthesized speech.
    Audio(Vec<u8>),
}

impl InboundEvent {
    /// Decode an inbound frame.
    ///
    /// ```rust
    /// use duplex_voice::transport::{InboundEvent, TransportMessage};
    ///
    /// let msg = TransportMessage::Text("__TRANSCRIPT__:hello".into());
    /// assert_eq!(InboundEvent::parse(msg), InboundEvent::Transcript("hello".into()));
    ///
    /// let msg = TransportMessage::Text("Hi".into());
    /// assert_eq!(InboundEvent::parse(msg), InboundEvent::AssistantText("Hi".into()));
    /// ```
    pub fn parse(message: TransportMessage) -> Self {
        match message {
            TransportMessage::Binary(bytes) => InboundEvent::Audio(bytes),
            TransportMessage::Text(text) => match text.strip_prefix(TRANSCRIPT_MARKER) {
                Some(transcript) => InboundEvent::Transcript(transcript.to_string()),
                None => InboundEvent::AssistantText(text),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_is_audio() {
        let ev = InboundEvent::parse(TransportMessage::Binary(vec![1, 2, 3]));
        assert_eq!(ev, InboundEvent::Audio(vec![1, 2, 3]));
    }

    #[test]
    fn transcript_keeps_remainder_verbatim() {
        let ev = InboundEvent::parse(TransportMessage::Text("__TRANSCRIPT__: spaced ".into()));
        assert_eq!(ev, InboundEvent::Transcript(" spaced ".into()));
    }

    #[test]
    fn empty_transcript() {
        let ev = InboundEvent::parse(TransportMessage::Text(TRANSCRIPT_MARKER.into()));
        assert_eq!(ev, InboundEvent::Transcript(String::new()));
    }

    #[test]
    fn marker_must_be_a_prefix() {
        let text = "see __TRANSCRIPT__:x";
        let ev = InboundEvent::parse(TransportMessage::Text(text.into()));
        assert_eq!(ev, InboundEvent::AssistantText(text.into()));
    }

    #[test]
    fn marker_is_case_sensitive() {
        let ev = InboundEvent::parse(TransportMessage::Text("__transcript__:x".into()));
        assert!(matches!(ev, InboundEvent::AssistantText(_)));
    }
}
