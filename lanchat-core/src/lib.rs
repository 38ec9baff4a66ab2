//! Serverless LAN chat: peer session and message-routing core.
//! No I/O here; the host supplies a [`PeerTransport`] and feeds its events
//! into the session, which routes, frames, and records messages per room.

pub mod identity;
pub mod protocol;
pub mod room;
pub mod roster;
pub mod router;
pub mod session;
pub mod store;
pub mod transport;
pub mod wire;

pub use identity::{PeerId, PeerIdentity};
pub use protocol::{ChatMessage, MessageId, MessageKind, Payload, Sender};
pub use room::{RoomKey, PRIVATE_PREFIX};
pub use roster::Roster;
pub use router::{resolve_targets, ReliabilityPolicy};
pub use session::{ChatSessionCore, SendError, SendReceipt, SessionConfig};
pub use store::MessageStore;
pub use transport::{PeerTransport, Reliability, TransmitError, TransportEvent};
pub use wire::{decode, encode, DecodeError, EncodeError, Frame};
