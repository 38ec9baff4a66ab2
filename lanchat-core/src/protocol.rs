//! Chat message model: payload variants, sender attribution, ids, timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::PeerIdentity;

/// Locally-unique message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Create a new random message ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of a message, without its payload. Used for reliability policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Voice,
    Image,
    File,
}

/// Message content. Exactly one variant per message; immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Text(String),
    Voice(Vec<u8>),
    Image(Vec<u8>),
    File { name: String, bytes: Vec<u8> },
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::Text(_) => MessageKind::Text,
            Payload::Voice(_) => MessageKind::Voice,
            Payload::Image(_) => MessageKind::Image,
            Payload::File { .. } => MessageKind::File,
        }
    }
}

/// Who produced a message: the local user or a named remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    Me,
    Peer(PeerIdentity),
}

impl Sender {
    /// Display name for rendering; the local user shows as "Me".
    pub fn display_name(&self) -> &str {
        match self {
            Sender::Me => "Me",
            Sender::Peer(p) => p.display_name(),
        }
    }
}

/// One chat message in a room log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Locally-unique id.
    pub id: MessageId,
    pub sender: Sender,
    pub sent_at: DateTime<Utc>,
    /// Position in the room log, assigned by the store on append.
    pub seq: u64,
    pub payload: Payload,
}

impl ChatMessage {
    /// Build a message authored by the local user. `seq` is assigned on append.
    pub fn outgoing(payload: Payload) -> Self {
        Self {
            id: MessageId::new(),
            sender: Sender::Me,
            sent_at: Utc::now(),
            seq: 0,
            payload,
        }
    }

    /// Build a message received from a remote peer. `seq` is assigned on append.
    pub fn incoming(from: PeerIdentity, payload: Payload) -> Self {
        Self {
            id: MessageId::new(),
            sender: Sender::Peer(from),
            sent_at: Utc::now(),
            seq: 0,
            payload,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }
}
