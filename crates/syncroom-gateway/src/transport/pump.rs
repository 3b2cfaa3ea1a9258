//! Per-connection reader and writer tasks.
//!
//! Each connection runs exactly two tasks. The reader is the only consumer of
//! the transport stream, the writer the only producer to its sink. They share
//! nothing but a oneshot: the writer holds the sender, so when it exits for
//! any reason the reader stops too and deregisters the connection.
//!
//! Both are generic over `Stream`/`Sink` so tests can drive them with
//! in-memory channels instead of a socket.

use std::borrow::Cow;
use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Duration, Instant, MissedTickBehavior};

use syncroom_core::error::{Result, SyncRoomError};

use crate::config::GatewaySection;
use crate::obs::HubMetrics;
use crate::realtime::{ConnId, HubHandle, OutboundFrame};
use crate::transport::codec::{decode, Inbound};

/// Timing and size limits for one connection.
#[derive(Debug, Clone)]
pub struct PumpConfig {
    pub ping_interval: Duration,
    /// Read deadline; refreshed only when a pong arrives.
    pub pong_timeout: Duration,
    pub write_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl From<&GatewaySection> for PumpConfig {
    fn from(gw: &GatewaySection) -> Self {
        Self {
            ping_interval: Duration::from_millis(gw.ping_interval_ms),
            pong_timeout: Duration::from_millis(gw.pong_timeout_ms),
            write_timeout: Duration::from_millis(gw.write_timeout_ms),
            max_frame_bytes: gw.max_frame_bytes,
        }
    }
}

/// Why a reader stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    Closed,
    Error,
    Deadline,
    Oversize,
    WriterGone,
    HubGone,
}

impl ReadEnd {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadEnd::Closed => "closed",
            ReadEnd::Error => "read_error",
            ReadEnd::Deadline => "liveness_timeout",
            ReadEnd::Oversize => "frame_too_large",
            ReadEnd::WriterGone => "writer_gone",
            ReadEnd::HubGone => "hub_gone",
        }
    }
}

/// Forward inbound text frames to the hub until the connection ends, then
/// deregister. Returns the reason it stopped.
pub async fn read_pump<S, E>(
    id: ConnId,
    mut stream: S,
    hub: HubHandle,
    cfg: PumpConfig,
    mut writer_gone: oneshot::Receiver<()>,
    metrics: Arc<HubMetrics>,
) -> ReadEnd
where
    S: Stream<Item = std::result::Result<Message, E>> + Unpin,
    E: Display,
{
    let end = read_loop(id, &mut stream, &hub, &cfg, &mut writer_gone).await;
    tracing::debug!(conn_id = %id, reason = end.as_str(), "reader stopped");
    metrics.connection_closures.inc(&[("reason", end.as_str())]);

    if hub.deregister(id).await.is_err() {
        tracing::warn!(conn_id = %id, "hub stopped before deregistration");
    }
    end
}

async fn read_loop<S, E>(
    id: ConnId,
    stream: &mut S,
    hub: &HubHandle,
    cfg: &PumpConfig,
    writer_gone: &mut oneshot::Receiver<()>,
) -> ReadEnd
where
    S: Stream<Item = std::result::Result<Message, E>> + Unpin,
    E: Display,
{
    let mut deadline = Instant::now() + cfg.pong_timeout;

    loop {
        let next = tokio::select! {
            _ = &mut *writer_gone => return ReadEnd::WriterGone,
            next = time::timeout_at(deadline, stream.next()) => next,
        };

        let msg = match next {
            Err(_) => return ReadEnd::Deadline,
            Ok(None) => return ReadEnd::Closed,
            Ok(Some(Err(e))) => {
                tracing::debug!(conn_id = %id, error = %e, "transport read failed");
                return ReadEnd::Error;
            }
            Ok(Some(Ok(msg))) => msg,
        };

        match decode(msg, cfg.max_frame_bytes) {
            Ok(Inbound::Text(raw)) => {
                if hub.inbound(id, raw).await.is_err() {
                    return ReadEnd::HubGone;
                }
            }
            Ok(Inbound::Pong) => deadline = Instant::now() + cfg.pong_timeout,
            // the websocket layer answers pings on its own
            Ok(Inbound::Ping) => {}
            Ok(Inbound::Binary { len }) => {
                tracing::debug!(conn_id = %id, len, "binary frame ignored");
            }
            Ok(Inbound::Close) => return ReadEnd::Closed,
            Err(e) => {
                tracing::warn!(conn_id = %id, error = %e, limit = cfg.max_frame_bytes, "inbound frame rejected");
                return ReadEnd::Oversize;
            }
        }
    }
}

/// Drain the outbound mailbox onto the sink. Sends a close frame when the hub
/// closes the mailbox; exits on the first write failure.
pub async fn write_pump<K>(
    id: ConnId,
    mut sink: K,
    mut mailbox: mpsc::Receiver<OutboundFrame>,
    cfg: PumpConfig,
    alive: oneshot::Sender<()>,
) where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let mut ping_tick = time::interval_at(Instant::now() + cfg.ping_interval, cfg.ping_interval);
    ping_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe_out = mailbox.recv() => {
                let Some(first) = maybe_out else {
                    let close = Message::Close(Some(CloseFrame {
                        code: close_code::NORMAL,
                        reason: Cow::Borrowed(""),
                    }));
                    if let Err(e) = send_within(&mut sink, close, cfg.write_timeout).await {
                        tracing::debug!(conn_id = %id, error = %e, "close frame not delivered");
                    }
                    break;
                };
                let batch = coalesce(first, &mut mailbox);
                if let Err(e) = send_within(&mut sink, Message::Text(batch), cfg.write_timeout).await {
                    tracing::debug!(conn_id = %id, error = %e, "transport write failed");
                    break;
                }
            }

            _ = ping_tick.tick() => {
                if !mailbox.is_empty() {
                    continue;
                }
                if let Err(e) = send_within(&mut sink, Message::Ping(Vec::new()), cfg.write_timeout).await {
                    tracing::debug!(conn_id = %id, error = %e, "ping failed");
                    break;
                }
            }
        }
    }

    tracing::debug!(conn_id = %id, "writer stopped");
    drop(alive);
}

/// Join `first` with whatever is already queued, newline separated.
fn coalesce(first: OutboundFrame, mailbox: &mut mpsc::Receiver<OutboundFrame>) -> String {
    let queued = mailbox.len();
    let mut buf = String::with_capacity(first.len());
    buf.push_str(first.as_str());
    for _ in 0..queued {
        let Ok(next) = mailbox.try_recv() else { break };
        buf.push('\n');
        buf.push_str(next.as_str());
    }
    buf
}

async fn send_within<K>(sink: &mut K, msg: Message, limit: Duration) -> Result<()>
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    match time::timeout(limit, sink.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(SyncRoomError::Transport(e.to_string())),
        Err(_) => Err(SyncRoomError::Transport("write deadline exceeded".into())),
    }
}
