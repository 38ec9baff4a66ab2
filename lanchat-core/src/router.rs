//! Routing: map a room key and the current roster to the destination peer
//! set and the delivery reliability to request from the transport.

use serde::{Deserialize, Serialize};

use crate::identity::PeerIdentity;
use crate::protocol::MessageKind;
use crate::room::RoomKey;
use crate::transport::Reliability;

/// Compute the destination peers for an outgoing message.
///
/// Broadcast rooms go to every connected peer. A private room goes to the
/// one connected peer whose derived key with our display name matches. If
/// display-name collisions produce more than one match, the first peer in
/// roster order is chosen deterministically rather than sending to none;
/// this ambiguity is a known limitation of name-derived keys.
pub fn resolve_targets(
    room: &RoomKey,
    connected: &[PeerIdentity],
    self_name: &str,
) -> Vec<PeerIdentity> {
    if !room.is_private() {
        return connected.to_vec();
    }
    let matches: Vec<PeerIdentity> = connected
        .iter()
        .filter(|p| RoomKey::private(self_name, p.display_name()) == *room)
        .cloned()
        .collect();
    if matches.len() > 1 {
        tracing::warn!(
            room = %room,
            candidates = matches.len(),
            chosen = %matches[0].id(),
            "ambiguous private room target, picking first match"
        );
        return vec![matches[0].clone()];
    }
    matches
}

/// Per-kind delivery reliability. The canonical policy favors completeness:
/// every kind, voice included, defaults to reliable delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReliabilityPolicy {
    pub text: Reliability,
    pub voice: Reliability,
    pub image: Reliability,
    pub file: Reliability,
}

impl Default for ReliabilityPolicy {
    fn default() -> Self {
        Self {
            text: Reliability::Reliable,
            voice: Reliability::Reliable,
            image: Reliability::Reliable,
            file: Reliability::Reliable,
        }
    }
}

impl ReliabilityPolicy {
    pub fn for_kind(&self, kind: MessageKind) -> Reliability {
        match kind {
            MessageKind::Text => self.text,
            MessageKind::Voice => self.voice,
            MessageKind::Image => self.image,
            MessageKind::File => self.file,
        }
    }
}
