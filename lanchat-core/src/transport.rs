//! Peer transport interface: discovery, invitations, and byte-level send.
//! Not implemented here; the host supplies it and feeds events back into the
//! session through [`TransportEvent`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identity::PeerIdentity;

/// Delivery guarantee requested from the transport for one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    Reliable,
    BestEffort,
}

/// Failure to hand a frame to the transport. Recoverable: the message stays
/// in the local log and is not retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransmitError {
    #[error("no route to any target peer")]
    NoRoute,
    #[error("transport send timed out")]
    Timeout,
    #[error("transport session closed")]
    Closed,
}

/// The closed set of events a transport delivers, possibly from arbitrary
/// threads. Fed into `ChatSessionCore::handle_event`.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A peer became visible nearby.
    PeerFound(PeerIdentity),
    /// A previously-visible peer went away.
    PeerLost(PeerIdentity),
    /// Authoritative snapshot of currently-connected peers.
    ConnectionsChanged(Vec<PeerIdentity>),
    /// A raw byte frame arrived from a connected peer.
    DataReceived {
        from: PeerIdentity,
        bytes: Vec<u8>,
    },
}

/// Discovery + connection + byte-level send primitive, supplied by the host.
///
/// `send` must enqueue and return without blocking on network I/O; transmit
/// outcome for the enqueue step is its return value, anything later arrives
/// asynchronously. Lifecycle and data events flow back as [`TransportEvent`]s.
pub trait PeerTransport: Send + Sync {
    /// Make this device visible to nearby peers.
    fn advertise_self(&self);

    /// Start looking for nearby peers.
    fn browse_for_peers(&self);

    /// Ask a discovered peer to join a session. Acceptance (or not) arrives
    /// later as a `ConnectionsChanged` event; the timeout bounds how long
    /// the transport keeps the invitation open.
    fn invite(&self, peer: &PeerIdentity, timeout: Duration);

    /// Hand one encoded frame to the transport for the given peers.
    fn send(
        &self,
        frame: &[u8],
        targets: &[PeerIdentity],
        reliability: Reliability,
    ) -> Result<(), TransmitError>;
}
