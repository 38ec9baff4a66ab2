//! Session coordinator: composes roster, router, codec, and store over an
//! injected transport. One instance per device, shareable across the
//! transport's callback threads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identity::PeerIdentity;
use crate::protocol::{ChatMessage, MessageId, Payload};
use crate::room::RoomKey;
use crate::roster::Roster;
use crate::router::{self, ReliabilityPolicy};
use crate::store::MessageStore;
use crate::transport::{PeerTransport, TransmitError, TransportEvent};
use crate::wire::{self, DecodeError, EncodeError};

const DEFAULT_INVITE_TIMEOUT_SECS: u64 = 10;

/// Session configuration, passed at construction. No ambient globals: the
/// display name and policies live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Our display name, as shown to peers and used to derive private room
    /// keys. Must be non-empty and free of `|`, `:` and the reserved
    /// `Private-` prefix; the host enforces this at the input boundary.
    pub display_name: String,
    /// Delivery reliability per message kind.
    #[serde(default)]
    pub reliability: ReliabilityPolicy,
    /// How long the transport keeps an invitation open.
    #[serde(default = "default_invite_timeout_secs")]
    pub invite_timeout_secs: u64,
}

fn default_invite_timeout_secs() -> u64 {
    DEFAULT_INVITE_TIMEOUT_SECS
}

impl SessionConfig {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            reliability: ReliabilityPolicy::default(),
            invite_timeout_secs: DEFAULT_INVITE_TIMEOUT_SECS,
        }
    }

    pub fn invite_timeout(&self) -> Duration {
        Duration::from_secs(self.invite_timeout_secs)
    }
}

/// Error starting an outgoing send. Encode failures are contract violations
/// (bad room label or filename) and nothing is sent or appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("frame encoding failed: {0}")]
    Encode(#[from] EncodeError),
}

/// Outcome of one send. The message is always in the local log by the time
/// this is returned; `transmit` reports the fire-and-forget handoff, which
/// is never retried automatically.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub message_id: MessageId,
    /// Position of the message in its room log.
    pub seq: u64,
    pub transmit: Result<(), TransmitError>,
}

/// The peer session and message-routing core.
///
/// All methods take `&self`; roster and store each sit behind their own
/// serialization point, so one `Arc<ChatSessionCore>` can be driven from
/// any number of transport callback threads.
pub struct ChatSessionCore {
    config: SessionConfig,
    transport: Arc<dyn PeerTransport>,
    roster: Mutex<Roster>,
    store: MessageStore,
    decode_failures: AtomicU64,
}

impl ChatSessionCore {
    pub fn new(config: SessionConfig, transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            config,
            transport,
            roster: Mutex::new(Roster::new()),
            store: MessageStore::new(),
            decode_failures: AtomicU64::new(0),
        }
    }

    /// Become visible and start looking for peers.
    pub fn start(&self) {
        self.transport.advertise_self();
        self.transport.browse_for_peers();
    }

    pub fn display_name(&self) -> &str {
        &self.config.display_name
    }

    /// The private room shared with `peer`, as both ends derive it.
    pub fn private_room_with(&self, peer: &PeerIdentity) -> RoomKey {
        RoomKey::private(&self.config.display_name, peer.display_name())
    }

    // ---- outgoing path ----

    pub fn send_text(
        &self,
        room: &RoomKey,
        text: impl Into<String>,
    ) -> Result<SendReceipt, SendError> {
        self.send_payload(room, Payload::Text(text.into()))
    }

    pub fn send_voice(&self, room: &RoomKey, audio: Vec<u8>) -> Result<SendReceipt, SendError> {
        self.send_payload(room, Payload::Voice(audio))
    }

    pub fn send_image(&self, room: &RoomKey, image: Vec<u8>) -> Result<SendReceipt, SendError> {
        self.send_payload(room, Payload::Image(image))
    }

    pub fn send_file(
        &self,
        room: &RoomKey,
        name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<SendReceipt, SendError> {
        self.send_payload(
            room,
            Payload::File {
                name: name.into(),
                bytes,
            },
        )
    }

    /// Route, encode, transmit, then append locally. The local append is
    /// unconditional once a frame was produced: the sender sees their own
    /// message even when the handoff to the transport fails.
    fn send_payload(&self, room: &RoomKey, payload: Payload) -> Result<SendReceipt, SendError> {
        let targets = {
            let roster = self.roster.lock().expect("roster lock poisoned");
            router::resolve_targets(room, roster.connected(), &self.config.display_name)
        };
        let frame = wire::encode(room, &payload)?;
        let reliability = self.config.reliability.for_kind(payload.kind());

        let transmit = if targets.is_empty() {
            if room.is_private() {
                // No connected peer derives this key with us.
                Err(TransmitError::NoRoute)
            } else {
                // Broadcasting into an empty room is a quiet no-op.
                Ok(())
            }
        } else {
            self.transport.send(&frame, &targets, reliability)
        };
        if let Err(err) = &transmit {
            tracing::warn!(room = %room, %err, "send failed, message kept in local log");
        }

        let message = ChatMessage::outgoing(payload);
        let message_id = message.id.clone();
        let seq = self.store.append(room, message);
        Ok(SendReceipt {
            message_id,
            seq,
            transmit,
        })
    }

    // ---- incoming path ----

    /// Single entry point for transport callbacks. Lifecycle events mutate
    /// the roster; data events run the decode-append path. A decode failure
    /// drops the frame and is surfaced without touching any room log.
    pub fn handle_event(&self, event: TransportEvent) -> Result<(), DecodeError> {
        match event {
            TransportEvent::PeerFound(peer) => {
                self.roster
                    .lock()
                    .expect("roster lock poisoned")
                    .peer_found(peer);
                Ok(())
            }
            TransportEvent::PeerLost(peer) => {
                self.roster
                    .lock()
                    .expect("roster lock poisoned")
                    .peer_lost(&peer);
                Ok(())
            }
            TransportEvent::ConnectionsChanged(snapshot) => {
                self.roster
                    .lock()
                    .expect("roster lock poisoned")
                    .connections_changed(snapshot);
                Ok(())
            }
            TransportEvent::DataReceived { from, bytes } => self.on_incoming_bytes(&bytes, from),
        }
    }

    /// Decode a received frame and append it to its room log.
    pub fn on_incoming_bytes(
        &self,
        bytes: &[u8],
        from: PeerIdentity,
    ) -> Result<(), DecodeError> {
        match wire::decode(bytes) {
            Ok(frame) => {
                self.store
                    .append(&frame.room, ChatMessage::incoming(from, frame.payload));
                Ok(())
            }
            Err(err) => {
                self.decode_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(peer = %from.id(), %err, len = bytes.len(), "dropping undecodable frame");
                Err(err)
            }
        }
    }

    /// Ask a discovered peer to connect. The roster is not touched here;
    /// state changes arrive back through `ConnectionsChanged`.
    pub fn invite(&self, peer: &PeerIdentity) {
        self.transport.invite(peer, self.config.invite_timeout());
    }

    // ---- observation ----

    pub fn discovered(&self) -> Vec<PeerIdentity> {
        self.roster
            .lock()
            .expect("roster lock poisoned")
            .discovered()
            .to_vec()
    }

    pub fn connected(&self) -> Vec<PeerIdentity> {
        self.roster
            .lock()
            .expect("roster lock poisoned")
            .connected()
            .to_vec()
    }

    pub fn messages(&self, room: &RoomKey) -> Vec<ChatMessage> {
        self.store.snapshot(room)
    }

    pub fn last_message(&self, room: &RoomKey) -> Option<ChatMessage> {
        self.store.last_message(room)
    }

    pub fn rooms(&self) -> Vec<RoomKey> {
        self.store.rooms()
    }

    /// Store change counter for observers; see [`MessageStore::version`].
    pub fn store_version(&self) -> u64 {
        self.store.version()
    }

    /// Count of received frames dropped because they failed to decode.
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PeerId;
    use crate::protocol::Sender;
    use crate::transport::Reliability;

    #[derive(Default)]
    struct MockTransport {
        sent: Mutex<Vec<(Vec<u8>, Vec<PeerIdentity>, Reliability)>>,
        invited: Mutex<Vec<(PeerIdentity, Duration)>>,
        fail_with: Mutex<Option<TransmitError>>,
    }

    impl MockTransport {
        fn failing(err: TransmitError) -> Self {
            Self {
                fail_with: Mutex::new(Some(err)),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<(Vec<u8>, Vec<PeerIdentity>, Reliability)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl PeerTransport for MockTransport {
        fn advertise_self(&self) {}

        fn browse_for_peers(&self) {}

        fn invite(&self, peer: &PeerIdentity, timeout: Duration) {
            self.invited.lock().unwrap().push((peer.clone(), timeout));
        }

        fn send(
            &self,
            frame: &[u8],
            targets: &[PeerIdentity],
            reliability: Reliability,
        ) -> Result<(), TransmitError> {
            if let Some(err) = self.fail_with.lock().unwrap().clone() {
                return Err(err);
            }
            self.sent
                .lock()
                .unwrap()
                .push((frame.to_vec(), targets.to_vec(), reliability));
            Ok(())
        }
    }

    fn peer(id: &str, name: &str) -> PeerIdentity {
        PeerIdentity::new(PeerId::new(id), name)
    }

    fn session_with(transport: Arc<MockTransport>) -> ChatSessionCore {
        ChatSessionCore::new(SessionConfig::new("Alice"), transport)
    }

    fn connect(session: &ChatSessionCore, peers: Vec<PeerIdentity>) {
        session
            .handle_event(TransportEvent::ConnectionsChanged(peers))
            .unwrap();
    }

    #[test]
    fn broadcast_send_reaches_all_connected_and_appends_locally() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(Arc::clone(&transport));
        let p1 = peer("p1", "Bob");
        let p2 = peer("p2", "Carol");
        connect(&session, vec![p1.clone(), p2.clone()]);

        let room = RoomKey::broadcast("General");
        let receipt = session.send_text(&room, "hi").unwrap();
        assert!(receipt.transmit.is_ok());
        assert_eq!(receipt.seq, 0);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        let (frame, targets, reliability) = &sent[0];
        assert_eq!(targets, &[p1, p2]);
        assert_eq!(*reliability, Reliability::Reliable);
        let decoded = wire::decode(frame).unwrap();
        assert_eq!(decoded.room, room);
        assert_eq!(decoded.payload, Payload::Text("hi".into()));

        let log = session.messages(&room);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].sender, Sender::Me);
    }

    #[test]
    fn private_send_targets_the_one_matching_peer() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(Arc::clone(&transport));
        let bob = peer("p1", "Bob");
        connect(&session, vec![bob.clone(), peer("p2", "Carol")]);

        let room = session.private_room_with(&bob);
        assert_eq!(room.as_str(), "Private-Alice-Bob");
        let receipt = session.send_voice(&room, vec![1, 2, 3]).unwrap();
        assert!(receipt.transmit.is_ok());

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, vec![bob]);
    }

    #[test]
    fn private_send_without_match_reports_no_route_but_appends() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(Arc::clone(&transport));
        connect(&session, vec![peer("p1", "Carol")]);

        let room = RoomKey::private("Alice", "Bob");
        let receipt = session.send_text(&room, "anyone there?").unwrap();
        assert_eq!(receipt.transmit, Err(TransmitError::NoRoute));
        assert!(transport.sent().is_empty());
        // Fire-and-forget: the sender still sees their own message.
        assert_eq!(session.messages(&room).len(), 1);
    }

    #[test]
    fn broadcast_into_empty_room_is_quiet_noop() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(Arc::clone(&transport));

        let room = RoomKey::broadcast("General");
        let receipt = session.send_text(&room, "hello?").unwrap();
        assert!(receipt.transmit.is_ok());
        assert!(transport.sent().is_empty());
        assert_eq!(session.messages(&room).len(), 1);
    }

    #[test]
    fn transmit_failure_keeps_message_in_local_log() {
        let transport = Arc::new(MockTransport::failing(TransmitError::Timeout));
        let session = session_with(Arc::clone(&transport));
        connect(&session, vec![peer("p1", "Bob")]);

        let room = RoomKey::broadcast("General");
        let receipt = session.send_text(&room, "lost in transit").unwrap();
        assert_eq!(receipt.transmit, Err(TransmitError::Timeout));
        assert_eq!(session.messages(&room).len(), 1);
    }

    #[test]
    fn sends_to_one_room_keep_program_order() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(transport);
        let room = RoomKey::broadcast("General");
        session.send_text(&room, "first").unwrap();
        session.send_text(&room, "second").unwrap();

        let log = session.messages(&room);
        assert_eq!(log[0].payload, Payload::Text("first".into()));
        assert_eq!(log[1].payload, Payload::Text("second".into()));
        assert_eq!((log[0].seq, log[1].seq), (0, 1));
    }

    #[test]
    fn encode_error_sends_and_appends_nothing() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(Arc::clone(&transport));
        let bad_room = RoomKey::broadcast("no|pipes");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            session.send_text(&bad_room, "x")
        }));
        if let Ok(result) = result {
            assert_eq!(result.unwrap_err(), SendError::Encode(EncodeError::DelimiterInRoom));
        }
        assert!(transport.sent().is_empty());
        assert!(session.messages(&bad_room).is_empty());
    }

    #[test]
    fn incoming_frame_appends_with_peer_sender() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(transport);
        let bob = peer("p1", "Bob");

        session
            .handle_event(TransportEvent::DataReceived {
                from: bob.clone(),
                bytes: b"General:hello from bob".to_vec(),
            })
            .unwrap();

        let room = RoomKey::broadcast("General");
        let log = session.messages(&room);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].sender, Sender::Peer(bob));
        assert_eq!(log[0].payload, Payload::Text("hello from bob".into()));
    }

    #[test]
    fn incoming_file_frame_decodes_filename() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(transport);

        session
            .on_incoming_bytes(b"FILE|General|notes.txt|file contents", peer("p1", "Bob"))
            .unwrap();

        let log = session.messages(&RoomKey::broadcast("General"));
        assert_eq!(
            log[0].payload,
            Payload::File {
                name: "notes.txt".into(),
                bytes: b"file contents".to_vec(),
            }
        );
    }

    #[test]
    fn undecodable_frame_is_dropped_and_counted() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(transport);

        let err = session
            .on_incoming_bytes(b"VOICE|Gen", peer("p1", "Bob"))
            .unwrap_err();
        assert_eq!(err, DecodeError::TruncatedHeader);
        assert_eq!(session.decode_failures(), 1);
        assert!(session.rooms().is_empty());
        assert_eq!(session.store_version(), 0);
    }

    #[test]
    fn lifecycle_events_drive_the_roster() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(transport);
        let bob = peer("p1", "Bob");

        session
            .handle_event(TransportEvent::PeerFound(bob.clone()))
            .unwrap();
        assert_eq!(session.discovered(), vec![bob.clone()]);
        assert!(session.connected().is_empty());

        connect(&session, vec![bob.clone()]);
        assert!(session.discovered().is_empty());
        assert_eq!(session.connected(), vec![bob.clone()]);

        session
            .handle_event(TransportEvent::PeerLost(bob))
            .unwrap();
        assert!(session.connected().is_empty());
    }

    #[test]
    fn invite_delegates_with_configured_timeout() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(Arc::clone(&transport));
        let bob = peer("p1", "Bob");

        session.invite(&bob);
        // Inviting never mutates the roster directly.
        assert!(session.discovered().is_empty());
        assert!(session.connected().is_empty());

        let invited = transport.invited.lock().unwrap();
        assert_eq!(invited.len(), 1);
        assert_eq!(invited[0].0, bob);
        assert_eq!(invited[0].1, Duration::from_secs(10));
    }

    #[test]
    fn reliability_policy_override_is_applied() {
        let transport = Arc::new(MockTransport::default());
        let mut config = SessionConfig::new("Alice");
        config.reliability.voice = Reliability::BestEffort;
        let session = ChatSessionCore::new(config, transport.clone());
        connect(&session, vec![peer("p1", "Bob")]);

        let room = RoomKey::broadcast("General");
        session.send_voice(&room, vec![9]).unwrap();
        session.send_text(&room, "hi").unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0].2, Reliability::BestEffort);
        assert_eq!(sent[1].2, Reliability::Reliable);
    }

    #[test]
    fn version_counter_advances_on_both_paths() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(transport);
        let room = RoomKey::broadcast("General");

        assert_eq!(session.store_version(), 0);
        session.send_text(&room, "out").unwrap();
        assert_eq!(session.store_version(), 1);
        session
            .on_incoming_bytes(b"General:in", peer("p1", "Bob"))
            .unwrap();
        assert_eq!(session.store_version(), 2);
    }

    #[test]
    fn concurrent_callbacks_and_sends_stay_consistent() {
        let transport = Arc::new(MockTransport::default());
        let session = Arc::new(session_with(transport));
        let room = RoomKey::broadcast("General");

        let sender = {
            let session = Arc::clone(&session);
            let room = room.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    session.send_text(&room, format!("out {i}")).unwrap();
                }
            })
        };
        let receiver = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || {
                let bob = peer("p1", "Bob");
                for i in 0..50 {
                    session
                        .on_incoming_bytes(format!("General:in {i}").as_bytes(), bob.clone())
                        .unwrap();
                }
            })
        };
        sender.join().unwrap();
        receiver.join().unwrap();

        let log = session.messages(&room);
        assert_eq!(log.len(), 100);
        for (i, msg) in log.iter().enumerate() {
            assert_eq!(msg.seq, i as u64);
        }
        assert_eq!(session.store_version(), 100);
    }
}
