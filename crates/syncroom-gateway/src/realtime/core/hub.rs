//! Hub: the single owner of presence and cached playback state.
//!
//! All mutation happens on one task that drains `HubEvent`s one at a time.
//! Register, deregister, and inbound traffic share one mailbox so their arrival
//! order is preserved: a connection's registration is always handled before
//! anything its reader sends.
//!
//! Delivery never waits. A mailbox at capacity gets its connection evicted on
//! the spot.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use syncroom_core::error::{Result, SyncRoomError};
use syncroom_core::protocol::frame::split_batch;
use syncroom_core::protocol::payload::{signal_target, VideoSyncPayload};
use syncroom_core::protocol::{Envelope, MessageType};
use syncroom_core::Identity;

use crate::config::HubSection;
use crate::obs::HubMetrics;
use crate::realtime::core::registry::{Delivery, Member, Registry};
use crate::realtime::types::{ConnId, OutboundFrame, Registration};

/// Events consumed by the hub task.
#[derive(Debug)]
pub enum HubEvent {
    Register(Registration),
    Deregister(ConnId),
    /// Raw text frame from a connection's reader, untouched.
    Inbound { from: ConnId, raw: Bytes },
}

/// Cloneable sender side of the hub mailbox.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    pub fn new(tx: mpsc::Sender<HubEvent>) -> Self {
        Self { tx }
    }

    pub async fn register(&self, reg: Registration) -> Result<()> {
        self.send(HubEvent::Register(reg)).await
    }

    pub async fn deregister(&self, id: ConnId) -> Result<()> {
        self.send(HubEvent::Deregister(id)).await
    }

    pub async fn inbound(&self, from: ConnId, raw: Bytes) -> Result<()> {
        self.send(HubEvent::Inbound { from, raw }).await
    }

    async fn send(&self, ev: HubEvent) -> Result<()> {
        self.tx
            .send(ev)
            .await
            .map_err(|_| SyncRoomError::Internal("hub stopped".into()))
    }
}

/// Hub tuning taken from `hub:` config.
#[derive(Debug, Clone)]
pub struct HubOptions {
    pub mailbox_capacity: usize,
    pub announce_evictions: bool,
}

impl Default for HubOptions {
    fn default() -> Self {
        let section = HubSection::default();
        Self::from(&section)
    }
}

impl From<&HubSection> for HubOptions {
    fn from(s: &HubSection) -> Self {
        Self {
            mailbox_capacity: s.mailbox_capacity,
            announce_evictions: s.announce_evictions,
        }
    }
}

pub struct Hub {
    registry: Registry,
    /// Last `video_sync` frame, replayed verbatim to joiners.
    cached_sync: Option<OutboundFrame>,
    opts: HubOptions,
    metrics: Arc<HubMetrics>,
}

impl Hub {
    pub fn new(opts: HubOptions, metrics: Arc<HubMetrics>) -> Self {
        Self {
            registry: Registry::new(),
            cached_sync: None,
            opts,
            metrics,
        }
    }

    /// Spawn the hub task. It stops once every `HubHandle` is dropped.
    pub fn spawn(self) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.opts.mailbox_capacity.max(1));
        let join = tokio::spawn(self.run(rx));
        (HubHandle::new(tx), join)
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<HubEvent>) {
        tracing::info!("hub started");
        while let Some(ev) = rx.recv().await {
            self.handle(ev);
        }
        tracing::info!(members = self.registry.len(), "hub stopped");
    }

    pub fn handle(&mut self, ev: HubEvent) {
        match ev {
            HubEvent::Register(reg) => self.register(reg),
            HubEvent::Deregister(id) => {
                self.deregister(id);
            }
            HubEvent::Inbound { from, raw } => self.inbound(from, raw),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cached_video_sync(&self) -> Option<&OutboundFrame> {
        self.cached_sync.as_ref()
    }

    /// Admit a connection: replay cached playback to it, then announce it.
    pub fn register(&mut self, reg: Registration) {
        let Registration { id, identity, tx } = reg;
        let name = identity.display_name.clone();

        if !self.registry.insert(id, Member::new(identity, tx)) {
            tracing::warn!(conn_id = %id, "duplicate registration ignored");
            return;
        }
        self.metrics.connections_active.inc(&[]);
        tracing::info!(conn_id = %id, display_name = %name, members = self.registry.len(), "joined");

        if let Some(cached) = self.cached_sync.clone() {
            self.unicast(id, &cached);
        }

        let mut saturated = self.broadcast_envelope(&Envelope::system(format!("{name} joined")));
        saturated.extend(self.broadcast_user_list());
        self.evict(saturated);
    }

    /// Remove a connection and close its mailbox. Absent ids are a no-op.
    pub fn deregister(&mut self, id: ConnId) -> bool {
        let Some(member) = self.registry.remove(id) else {
            tracing::debug!(conn_id = %id, "deregister for absent connection");
            return false;
        };
        let identity = member.into_identity();
        self.metrics.connections_active.dec(&[]);
        tracing::info!(conn_id = %id, display_name = %identity.display_name, members = self.registry.len(), "left");

        let saturated = self.announce_departure(&identity);
        self.evict(saturated);
        true
    }

    /// Route one raw frame. A frame may carry several newline-separated
    /// envelopes; each is routed on its own and forwarded verbatim.
    pub fn inbound(&mut self, from: ConnId, raw: Bytes) {
        let text = match std::str::from_utf8(&raw) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(conn_id = %from, error = %e, "dropping non-utf8 frame");
                self.metrics.decode_drops.inc(&[]);
                return;
            }
        };

        let segments: Vec<Bytes> = split_batch(text)
            .map(|seg| raw.slice_ref(seg.as_bytes()))
            .collect();

        for seg in segments {
            match OutboundFrame::from_utf8(seg) {
                Ok(frame) => self.route(from, frame),
                Err(e) => {
                    tracing::error!(conn_id = %from, error = %e, "segment lost utf-8 validity");
                    self.metrics.decode_drops.inc(&[]);
                }
            }
        }
    }

    fn route(&mut self, from: ConnId, frame: OutboundFrame) {
        let env = match Envelope::decode(frame.as_bytes()) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(conn_id = %from, error = %e, "dropping undecodable envelope");
                self.metrics.decode_drops.inc(&[]);
                return;
            }
        };

        if env.msg_type.is_hub_only() {
            tracing::debug!(conn_id = %from, kind = env.msg_type.as_str(), "client used a hub-only type");
        }
        // webrtc counts only once delivered
        if env.msg_type != MessageType::WebRtc {
            self.count_routed(&env.msg_type);
        }

        let saturated = match &env.msg_type {
            MessageType::Chat | MessageType::Admin => self.registry.fan_out(&frame),
            MessageType::VideoSync => {
                if let Ok(p) = VideoSyncPayload::parse(&env.payload) {
                    tracing::debug!(conn_id = %from, event = p.event.as_str(), position = p.timestamp, "video_sync");
                }
                self.cached_sync = Some(frame.clone());
                self.registry.fan_out(&frame)
            }
            MessageType::WebRtc => {
                self.relay_signal(from, &env, &frame);
                Vec::new()
            }
            // Clients may not speak for the hub; such frames fall back to
            // plain broadcast like any unknown tag.
            MessageType::System | MessageType::UserList | MessageType::Unknown(_) => {
                self.registry.fan_out(&frame)
            }
        };
        self.evict(saturated);
    }

    fn relay_signal(&mut self, from: ConnId, env: &Envelope, frame: &OutboundFrame) {
        let Some(target) = signal_target(&env.payload) else {
            tracing::debug!(conn_id = %from, "webrtc envelope without target dropped");
            self.metrics.signal_drops.inc(&[("reason", "no_target")]);
            return;
        };
        let Some(to) = self.registry.find_latest_by_name(&target) else {
            tracing::debug!(conn_id = %from, target = %target, "webrtc target not present");
            self.metrics.signal_drops.inc(&[("reason", "no_peer")]);
            return;
        };
        if self.unicast(to, frame) == Delivery::Queued {
            self.count_routed(&env.msg_type);
        }
    }

    fn unicast(&mut self, to: ConnId, frame: &OutboundFrame) -> Delivery {
        let outcome = self.registry.try_deliver(to, frame);
        match outcome {
            Delivery::Saturated => self.evict(vec![to]),
            Delivery::Closed => tracing::debug!(conn_id = %to, "unicast to closed mailbox"),
            Delivery::Queued | Delivery::Absent => {}
        }
        outcome
    }

    fn count_routed(&self, t: &MessageType) {
        self.metrics.messages_routed.inc(&[("type", route_label(t))]);
    }

    fn broadcast_envelope(&self, env: &Envelope) -> Vec<ConnId> {
        match OutboundFrame::from_envelope(env) {
            Ok(frame) => self.registry.fan_out(&frame),
            Err(e) => {
                tracing::error!(error = %e, kind = env.msg_type.as_str(), "hub envelope encode failed");
                Vec::new()
            }
        }
    }

    fn broadcast_user_list(&self) -> Vec<ConnId> {
        match Envelope::user_list(&self.registry.display_names()) {
            Ok(env) => self.broadcast_envelope(&env),
            Err(e) => {
                tracing::error!(error = %e, "user_list build failed");
                Vec::new()
            }
        }
    }

    fn announce_departure(&self, identity: &Identity) -> Vec<ConnId> {
        let mut saturated =
            self.broadcast_envelope(&Envelope::system(format!("{} left", identity.display_name)));
        saturated.extend(self.broadcast_user_list());
        saturated
    }

    /// Drop saturated members. Announcements for an eviction can saturate
    /// further mailboxes; those join the worklist.
    fn evict(&mut self, mut worklist: Vec<ConnId>) {
        while let Some(id) = worklist.pop() {
            let Some(member) = self.registry.remove(id) else {
                continue;
            };
            let identity = member.into_identity();
            self.metrics.connections_active.dec(&[]);
            self.metrics.evictions.inc(&[]);
            tracing::warn!(conn_id = %id, display_name = %identity.display_name, error = %SyncRoomError::Backpressure, "evicted");

            if self.opts.announce_evictions {
                worklist.extend(self.announce_departure(&identity));
            }
        }
    }
}

fn route_label(t: &MessageType) -> &'static str {
    match t {
        MessageType::Chat => "chat",
        MessageType::Admin => "admin",
        MessageType::VideoSync => "video_sync",
        MessageType::WebRtc => "webrtc",
        MessageType::System | MessageType::UserList | MessageType::Unknown(_) => "unknown",
    }
}
