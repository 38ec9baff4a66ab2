//! Live peer roster: peers seen nearby and peers with an active session.
//! The transport is the source of truth for "connected"; this layer only
//! applies its lifecycle events.

use crate::identity::PeerIdentity;

/// Discovered and connected peers, in stable arrival order.
///
/// Mutation happens only through the `peer_found` / `peer_lost` /
/// `connections_changed` methods driven by transport events, behind one
/// lock owned by the session. After any method returns, no identity is in
/// both lists.
#[derive(Debug, Default, Clone)]
pub struct Roster {
    discovered: Vec<PeerIdentity>,
    connected: Vec<PeerIdentity>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A peer was seen nearby. Idempotent; already-connected peers are not
    /// re-listed as discovered.
    pub fn peer_found(&mut self, peer: PeerIdentity) {
        if self.connected.contains(&peer) || self.discovered.contains(&peer) {
            return;
        }
        tracing::debug!(peer = %peer.id(), name = peer.display_name(), "peer found");
        self.discovered.push(peer);
    }

    /// A peer went away. Removed from both lists.
    pub fn peer_lost(&mut self, peer: &PeerIdentity) {
        tracing::debug!(peer = %peer.id(), "peer lost");
        self.discovered.retain(|p| p != peer);
        self.connected.retain(|p| p != peer);
    }

    /// Replace the connected set with the transport's authoritative snapshot.
    /// Newly-connected identities are purged from `discovered`.
    pub fn connections_changed(&mut self, snapshot: Vec<PeerIdentity>) {
        tracing::debug!(connected = snapshot.len(), "connection state changed");
        self.discovered.retain(|p| !snapshot.contains(p));
        self.connected = snapshot;
    }

    /// Peers seen but not connected.
    pub fn discovered(&self) -> &[PeerIdentity] {
        &self.discovered
    }

    /// Peers with an active session.
    pub fn connected(&self) -> &[PeerIdentity] {
        &self.connected
    }
}
