//! Per-room ordered message logs: the sole mutation point for chat history.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::protocol::ChatMessage;
use crate::room::RoomKey;

/// Append-only in-memory room logs. Logs are created lazily on first append
/// and never pruned or reordered. A version counter increments on every
/// append so observers can poll for change without watching collections.
///
/// All appends are serialized behind one internal mutex; snapshots are
/// clones taken under the same lock, so readers never see a half-updated
/// log.
#[derive(Debug, Default)]
pub struct MessageStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    rooms: HashMap<RoomKey, Vec<ChatMessage>>,
    version: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the tail of the room's log. Assigns the message
    /// its log position and returns it. All-or-nothing.
    pub fn append(&self, room: &RoomKey, mut message: ChatMessage) -> u64 {
        let mut inner = self.inner.lock().expect("message store lock poisoned");
        let log = inner.rooms.entry(room.clone()).or_default();
        let seq = log.len() as u64;
        message.seq = seq;
        log.push(message);
        inner.version += 1;
        seq
    }

    /// Atomic copy of the room's log, oldest first. Repeated calls never
    /// shrink: each snapshot is a prefix of every later one.
    pub fn snapshot(&self, room: &RoomKey) -> Vec<ChatMessage> {
        let inner = self.inner.lock().expect("message store lock poisoned");
        inner.rooms.get(room).cloned().unwrap_or_default()
    }

    /// The most recent message in the room, if any.
    pub fn last_message(&self, room: &RoomKey) -> Option<ChatMessage> {
        let inner = self.inner.lock().expect("message store lock poisoned");
        inner.rooms.get(room).and_then(|log| log.last().cloned())
    }

    /// Number of messages in the room's log.
    pub fn len(&self, room: &RoomKey) -> usize {
        let inner = self.inner.lock().expect("message store lock poisoned");
        inner.rooms.get(room).map(|log| log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, room: &RoomKey) -> bool {
        self.len(room) == 0
    }

    /// Rooms that have at least one message, in no particular order.
    pub fn rooms(&self) -> Vec<RoomKey> {
        let inner = self.inner.lock().expect("message store lock poisoned");
        inner.rooms.keys().cloned().collect()
    }

    /// Change counter: increments on every append. Observers compare against
    /// a remembered value to detect new messages.
    pub fn version(&self) -> u64 {
        let inner = self.inner.lock().expect("message store lock poisoned");
        inner.version
    }
}
