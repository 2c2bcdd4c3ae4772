//! Message log and data channel payloads.
//!
//! The log is append-only and ordered by arrival: each append takes the next
//! sequence number, whatever the origin. No deduplication or causal
//! reordering is attempted, so replaying the same interleaving of local sends
//! and remote receipts always reproduces the same log.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Sent by this side.
    Local,
    /// Received from the peer.
    Remote,
}

/// Kind of message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Plain text.
    Text,
    /// Image artifact.
    Image,
}

/// Opaque reference to image content.
///
/// `data` is reference-counted; cloning the reference never copies the
/// image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Original file name.
    pub file_name: String,
    /// Content type (always an image type).
    pub mime_type: String,
    /// Image bytes.
    pub data: Bytes,
}

/// Message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    /// Text message.
    Text(String),
    /// Image message.
    Image(ImageRef),
}

impl MessagePayload {
    /// Kind of this payload.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text(_) => MessageKind::Text,
            Self::Image(_) => MessageKind::Image,
        }
    }
}

/// A logged message. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    sequence: u64,
    origin: Origin,
    payload: MessagePayload,
}

impl Message {
    /// Arrival index within the session.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Producer of the message.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Kind of content.
    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Content.
    pub fn payload(&self) -> &MessagePayload {
        &self.payload
    }

    /// Text content, if this is a text message.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            MessagePayload::Text(text) => Some(text),
            MessagePayload::Image(_) => None,
        }
    }
}

/// Ordered, append-only message log.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    next_sequence: u64,
}

impl MessageLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return it with its assigned sequence.
    pub fn append(&mut self, origin: Origin, payload: MessagePayload) -> &Message {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let index = self.messages.len();
        self.messages.push(Message { sequence, origin, payload });
        &self.messages[index]
    }

    /// Messages in arrival order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Owned copy of the log for rendering.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// No messages logged.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Full reset on session end. Sequence numbering restarts at zero.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Application payload carried over the engine's data channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DataPayload {
    /// Chat text.
    Text {
        /// Message body.
        message: String,
    },
    /// Periodic counter tick.
    Counter {
        /// Counter value.
        count: u64,
    },
}

impl DataPayload {
    /// Encode as CBOR.
    pub fn encode(&self) -> Result<Bytes, SessionError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| SessionError::Payload(e.to_string()))?;
        Ok(Bytes::from(buf))
    }

    /// Decode from CBOR.
    pub fn decode(bytes: &[u8]) -> Result<Self, SessionError> {
        ciborium::from_reader(bytes).map_err(|e| SessionError::Payload(e.to_string()))
    }
}
