//! Hub state machine: presence, routing, replay, and eviction.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TryRecvError};

use syncroom_core::protocol::{Envelope, MessageType};
use syncroom_core::Identity;
use syncroom_gateway::obs::HubMetrics;
use syncroom_gateway::realtime::{ConnId, Hub, HubOptions, OutboundFrame, Registration};

struct Peer {
    id: ConnId,
    rx: mpsc::Receiver<OutboundFrame>,
}

impl Peer {
    fn frames(&mut self) -> Vec<OutboundFrame> {
        let mut out = Vec::new();
        while let Ok(f) = self.rx.try_recv() {
            out.push(f);
        }
        out
    }

    fn envelopes(&mut self) -> Vec<Envelope> {
        self.frames()
            .iter()
            .map(|f| Envelope::decode(f.as_bytes()).unwrap())
            .collect()
    }

    fn is_closed(&mut self) -> bool {
        self.frames();
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }
}

fn new_hub(announce_evictions: bool) -> (Hub, Arc<HubMetrics>) {
    let metrics = Arc::new(HubMetrics::default());
    let opts = HubOptions {
        announce_evictions,
        ..HubOptions::default()
    };
    (Hub::new(opts, Arc::clone(&metrics)), metrics)
}

fn join(hub: &mut Hub, id: u64, name: &str) -> Peer {
    let (tx, rx) = mpsc::channel(256);
    let id = ConnId(id);
    hub.register(Registration {
        id,
        identity: Identity::new(format!("u-{name}"), name),
        tx,
    });
    Peer { id, rx }
}

fn raw(msg_type: MessageType, sender: &str, payload: &str) -> Bytes {
    Bytes::from(Envelope::new(msg_type, sender, payload).encode().unwrap())
}

fn of_type(envs: &[Envelope], t: MessageType) -> Vec<&Envelope> {
    envs.iter().filter(|e| e.msg_type == t).collect()
}

#[test]
fn user_list_follows_join_order() {
    let (mut hub, _) = new_hub(true);
    let mut alice = join(&mut hub, 1, "alice");
    let _bob = join(&mut hub, 2, "bob");

    let envs = alice.envelopes();
    let lists: Vec<Vec<String>> = of_type(&envs, MessageType::UserList)
        .iter()
        .map(|e| e.user_names().unwrap())
        .collect();
    assert_eq!(lists, vec![vec!["alice"], vec!["alice", "bob"]]);

    let notices: Vec<&str> = of_type(&envs, MessageType::System)
        .iter()
        .map(|e| e.payload.as_str())
        .collect();
    assert_eq!(notices, vec!["alice joined", "bob joined"]);
}

#[test]
fn duplicate_registration_is_ignored() {
    let (mut hub, metrics) = new_hub(true);
    let _first = join(&mut hub, 1, "alice");
    let mut second = join(&mut hub, 1, "alice");

    assert_eq!(hub.registry().len(), 1);
    assert!(second.is_closed());
    assert_eq!(metrics.connections_active.get(&[]), 1);
}

#[test]
fn shared_display_name_listed_once() {
    let (mut hub, _) = new_hub(true);
    let mut a1 = join(&mut hub, 1, "alice");
    let _a2 = join(&mut hub, 2, "alice");

    let envs = a1.envelopes();
    let last = of_type(&envs, MessageType::UserList).pop().unwrap();
    assert_eq!(last.user_names().unwrap(), vec!["alice"]);
}

#[test]
fn deregister_twice_is_noop() {
    let (mut hub, metrics) = new_hub(true);
    let mut alice = join(&mut hub, 1, "alice");
    let mut bob = join(&mut hub, 2, "bob");
    alice.frames();

    assert!(hub.deregister(bob.id));
    assert!(!hub.deregister(bob.id));

    assert!(bob.is_closed());
    assert!(!hub.registry().contains(bob.id));

    let envs = alice.envelopes();
    assert_eq!(envs.len(), 2);
    assert_eq!(envs[0].msg_type, MessageType::System);
    assert_eq!(envs[0].payload, "bob left");
    assert_eq!(envs[1].user_names().unwrap(), vec!["alice"]);
    assert_eq!(metrics.connections_active.get(&[]), 1);
}

#[test]
fn deregister_unknown_connection_does_nothing() {
    let (mut hub, _) = new_hub(true);
    let mut alice = join(&mut hub, 1, "alice");
    alice.frames();

    assert!(!hub.deregister(ConnId(99)));
    assert!(alice.frames().is_empty());
    assert_eq!(hub.registry().len(), 1);
}

#[test]
fn chat_and_admin_reach_everyone_verbatim() {
    let (mut hub, metrics) = new_hub(true);
    let mut peers = vec![
        join(&mut hub, 1, "alice"),
        join(&mut hub, 2, "bob"),
        join(&mut hub, 3, "carol"),
    ];
    for p in &mut peers {
        p.frames();
    }

    let chat = raw(MessageType::Chat, "alice", "hello");
    let admin = raw(MessageType::Admin, "alice", "{\"action\":\"mute\"}");
    hub.inbound(peers[0].id, chat.clone());
    hub.inbound(peers[0].id, admin.clone());

    for p in &mut peers {
        let frames = p.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_bytes(), &chat[..]);
        assert_eq!(frames[1].as_bytes(), &admin[..]);
    }
    assert_eq!(metrics.messages_routed.get(&[("type", "chat")]), 1);
    assert_eq!(metrics.messages_routed.get(&[("type", "admin")]), 1);
}

#[test]
fn video_sync_replayed_to_late_joiner_first() {
    let (mut hub, _) = new_hub(true);
    let mut alice = join(&mut hub, 1, "alice");
    let mut bob = join(&mut hub, 2, "bob");
    alice.frames();
    bob.frames();

    let sync = raw(
        MessageType::VideoSync,
        "alice",
        r#"{"event":"play","url":"v1","playing":true,"timestamp":12.5,"triggeredBy":"alice"}"#,
    );
    hub.inbound(alice.id, sync.clone());

    assert_eq!(alice.frames()[0].as_bytes(), &sync[..]);
    assert_eq!(bob.frames()[0].as_bytes(), &sync[..]);
    assert_eq!(hub.cached_video_sync().unwrap().as_bytes(), &sync[..]);

    let mut carol = join(&mut hub, 3, "carol");
    let frames = carol.frames();
    assert_eq!(frames[0].as_bytes(), &sync[..]);
    let replays = frames.iter().filter(|f| f.as_bytes() == &sync[..]).count();
    assert_eq!(replays, 1);

    let rest: Vec<Envelope> = frames[1..]
        .iter()
        .map(|f| Envelope::decode(f.as_bytes()).unwrap())
        .collect();
    assert_eq!(rest[0].payload, "carol joined");
    assert_eq!(rest[1].user_names().unwrap(), vec!["alice", "bob", "carol"]);
}

#[test]
fn newest_video_sync_replaces_cache() {
    let (mut hub, _) = new_hub(true);
    let alice = join(&mut hub, 1, "alice");

    let first = raw(MessageType::VideoSync, "alice", r#"{"event":"play","url":"v1","playing":true,"timestamp":1.0,"triggeredBy":"alice"}"#);
    let second = raw(MessageType::VideoSync, "alice", r#"{"event":"pause","url":"v1","playing":false,"timestamp":9.0,"triggeredBy":"alice"}"#);
    hub.inbound(alice.id, first.clone());
    hub.inbound(alice.id, second.clone());

    let mut bob = join(&mut hub, 2, "bob");
    let frames = bob.frames();
    assert_eq!(frames[0].as_bytes(), &second[..]);
    assert!(frames.iter().all(|f| f.as_bytes() != &first[..]));
}

#[test]
fn no_replay_before_any_video_sync() {
    let (mut hub, _) = new_hub(true);
    let mut alice = join(&mut hub, 1, "alice");
    let envs = alice.envelopes();
    assert_eq!(envs[0].msg_type, MessageType::System);
    assert!(hub.cached_video_sync().is_none());
}

#[test]
fn webrtc_unicast_to_target_only() {
    let (mut hub, metrics) = new_hub(true);
    let mut alice = join(&mut hub, 1, "alice");
    let mut bob = join(&mut hub, 2, "bob");
    let mut carol = join(&mut hub, 3, "carol");
    for p in [&mut alice, &mut bob, &mut carol] {
        p.frames();
    }

    let offer = raw(MessageType::WebRtc, "alice", r#"{"target":"bob","kind":"offer","sdp":"v=0"}"#);
    hub.inbound(alice.id, offer.clone());

    let got = bob.frames();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].as_bytes(), &offer[..]);
    assert!(alice.frames().is_empty());
    assert!(carol.frames().is_empty());
    assert_eq!(metrics.messages_routed.get(&[("type", "webrtc")]), 1);
}

#[test]
fn webrtc_to_absent_target_is_dropped_silently() {
    let (mut hub, metrics) = new_hub(true);
    let mut alice = join(&mut hub, 1, "alice");
    let mut bob = join(&mut hub, 2, "bob");
    alice.frames();
    bob.frames();

    hub.inbound(alice.id, raw(MessageType::WebRtc, "alice", r#"{"target":"carol","kind":"offer"}"#));

    assert!(alice.frames().is_empty());
    assert!(bob.frames().is_empty());
    assert_eq!(hub.registry().len(), 2);
    assert_eq!(metrics.signal_drops.get(&[("reason", "no_peer")]), 1);
    assert_eq!(metrics.messages_routed.get(&[("type", "webrtc")]), 0);
}

#[test]
fn webrtc_without_target_is_dropped() {
    let (mut hub, metrics) = new_hub(true);
    let mut alice = join(&mut hub, 1, "alice");
    let mut bob = join(&mut hub, 2, "bob");
    alice.frames();
    bob.frames();

    hub.inbound(alice.id, raw(MessageType::WebRtc, "alice", r#"{"target":"  "}"#));
    hub.inbound(alice.id, raw(MessageType::WebRtc, "alice", "plain text"));

    assert!(alice.frames().is_empty());
    assert!(bob.frames().is_empty());
    assert_eq!(metrics.signal_drops.get(&[("reason", "no_target")]), 2);
    assert_eq!(metrics.messages_routed.get(&[("type", "webrtc")]), 0);
}

#[test]
fn webrtc_prefers_most_recent_connection_for_name() {
    let (mut hub, _) = new_hub(true);
    let alice = join(&mut hub, 1, "alice");
    let mut bob_old = join(&mut hub, 2, "bob");
    let mut bob_new = join(&mut hub, 3, "bob");
    bob_old.frames();
    bob_new.frames();

    hub.inbound(alice.id, raw(MessageType::WebRtc, "alice", r#"{"target":"bob"}"#));

    assert!(bob_old.frames().is_empty());
    assert_eq!(bob_new.frames().len(), 1);
}

#[test]
fn hub_only_and_unknown_types_fall_back_to_broadcast() {
    let (mut hub, metrics) = new_hub(true);
    let mut alice = join(&mut hub, 1, "alice");
    let mut bob = join(&mut hub, 2, "bob");
    alice.frames();
    bob.frames();

    let spoofed = raw(MessageType::UserList, "alice", r#"["mallory"]"#);
    let custom = raw(MessageType::Unknown("reaction".into()), "alice", "👍");
    hub.inbound(alice.id, spoofed.clone());
    hub.inbound(alice.id, custom.clone());

    for p in [&mut alice, &mut bob] {
        let frames = p.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_bytes(), &spoofed[..]);
        assert_eq!(frames[1].as_bytes(), &custom[..]);
    }
    assert_eq!(metrics.messages_routed.get(&[("type", "unknown")]), 2);
}

#[test]
fn undecodable_frames_are_dropped() {
    let (mut hub, metrics) = new_hub(true);
    let mut alice = join(&mut hub, 1, "alice");
    alice.frames();

    hub.inbound(alice.id, Bytes::from_static(b"{not json"));
    hub.inbound(alice.id, Bytes::from_static(&[0xff, 0xfe]));

    assert!(alice.frames().is_empty());
    assert_eq!(metrics.decode_drops.get(&[]), 2);
    assert_eq!(hub.registry().len(), 1);
}

#[test]
fn batched_inbound_frame_routes_each_segment() {
    let (mut hub, metrics) = new_hub(true);
    let mut alice = join(&mut hub, 1, "alice");
    alice.frames();

    let a = Envelope::new(MessageType::Chat, "alice", "one").encode().unwrap();
    let b = Envelope::new(MessageType::Chat, "alice", "two").encode().unwrap();
    hub.inbound(alice.id, Bytes::from(format!("{a}\ngarbage\n{b}")));

    let frames = alice.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].as_str(), a);
    assert_eq!(frames[1].as_str(), b);
    assert_eq!(metrics.decode_drops.get(&[]), 1);
}

fn flood(hub: &mut Hub, from: ConnId, n: usize, drained: &mut [&mut Peer]) -> Vec<usize> {
    let mut chats = vec![0; drained.len()];
    for i in 0..n {
        hub.inbound(from, raw(MessageType::Chat, "bob", &format!("msg {i}")));
        for (k, p) in drained.iter_mut().enumerate() {
            chats[k] += p
                .envelopes()
                .iter()
                .filter(|e| e.msg_type == MessageType::Chat)
                .count();
        }
    }
    chats
}

#[test]
fn saturated_mailbox_is_evicted() {
    let (mut hub, metrics) = new_hub(true);
    let mut alice = join(&mut hub, 1, "alice");
    let mut bob = join(&mut hub, 2, "bob");
    let mut carol = join(&mut hub, 3, "carol");
    bob.frames();
    carol.frames();

    // alice is never drained
    let mut bob_env = Vec::new();
    let mut carol_env = Vec::new();
    for i in 0..300 {
        hub.inbound(bob.id, raw(MessageType::Chat, "bob", &format!("msg {i}")));
        bob_env.extend(bob.envelopes());
        carol_env.extend(carol.envelopes());
    }

    assert!(!hub.registry().contains(alice.id));
    assert!(hub.registry().contains(bob.id));
    assert!(hub.registry().contains(carol.id));
    assert_eq!(metrics.evictions.get(&[]), 1);
    assert_eq!(metrics.connections_active.get(&[]), 2);

    for envs in [&bob_env, &carol_env] {
        assert_eq!(of_type(envs, MessageType::Chat).len(), 300);
        let left: Vec<&str> = of_type(envs, MessageType::System)
            .iter()
            .map(|e| e.payload.as_str())
            .collect();
        assert_eq!(left, vec!["alice left"]);
        let last = of_type(envs, MessageType::UserList).pop().unwrap();
        assert_eq!(last.user_names().unwrap(), vec!["bob", "carol"]);
    }

    let backlog = alice.frames();
    assert_eq!(backlog.len(), 256);
    assert!(alice.is_closed());
}

#[test]
fn silent_eviction_when_announcements_disabled() {
    let (mut hub, metrics) = new_hub(false);
    let alice = join(&mut hub, 1, "alice");
    let mut bob = join(&mut hub, 2, "bob");
    bob.frames();

    let counts = flood(&mut hub, bob.id, 300, &mut [&mut bob]);
    assert_eq!(counts[0], 300);
    assert!(!hub.registry().contains(alice.id));
    assert_eq!(metrics.evictions.get(&[]), 1);

    // a later real deregister from alice's reader changes nothing
    assert!(!hub.deregister(alice.id));
    assert!(bob.frames().is_empty());
}

#[test]
fn eviction_then_deregister_announces_once() {
    let (mut hub, _) = new_hub(true);
    let alice = join(&mut hub, 1, "alice");
    let mut bob = join(&mut hub, 2, "bob");
    bob.frames();

    let mut notices = 0;
    for i in 0..300 {
        hub.inbound(bob.id, raw(MessageType::Chat, "bob", &format!("msg {i}")));
        notices += of_type(&bob.envelopes(), MessageType::System).len();
    }
    hub.deregister(alice.id);
    notices += of_type(&bob.envelopes(), MessageType::System).len();

    assert_eq!(notices, 1);
}

#[test]
fn outbound_frames_must_be_utf8() {
    let err = OutboundFrame::from_utf8(Bytes::from_static(&[b'{', 0xff, b'}'])).unwrap_err();
    assert_eq!(err.client_code().as_str(), "DECODE_FAILED");

    let ok = OutboundFrame::from_utf8(Bytes::from_static("{\"type\":\"chat\"}".as_bytes())).unwrap();
    assert_eq!(ok.as_str(), r#"{"type":"chat"}"#);
    assert_eq!(ok.len(), 15);
}
