use std::fmt;

use bytes::Bytes;
use tokio::sync::mpsc;

use syncroom_core::error::{Result, SyncRoomError};
use syncroom_core::protocol::Envelope;
use syncroom_core::Identity;

/// Process-unique connection id. Allocated in increasing order, so ordering by
/// id is join order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// One encoded envelope queued for a connection's writer.
///
/// Backed by `Bytes` so a broadcast is serialized once and shared by every
/// mailbox. Always valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame(Bytes);

impl OutboundFrame {
    pub fn from_envelope(env: &Envelope) -> Result<Self> {
        Ok(Self::from(env.encode()?))
    }

    /// Wrap raw bytes, rejecting anything that is not UTF-8.
    pub fn from_utf8(b: Bytes) -> Result<Self> {
        std::str::from_utf8(&b)
            .map_err(|e| SyncRoomError::Decode(format!("outbound frame is not utf-8: {e}")))?;
        Ok(Self(b))
    }

    /// Every constructor checks UTF-8, so the error arm is unreachable in
    /// practice; it logs instead of writing an empty frame silently.
    pub fn as_str(&self) -> &str {
        match std::str::from_utf8(&self.0) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, len = self.0.len(), "outbound frame is not utf-8");
                ""
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for OutboundFrame {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl From<&'static str> for OutboundFrame {
    fn from(s: &'static str) -> Self {
        Self(Bytes::from_static(s.as_bytes()))
    }
}

/// A freshly bootstrapped connection handed to the hub.
///
/// `tx` must be the only sender of the mailbox: the hub dropping it is what
/// closes the mailbox and stops the writer.
#[derive(Debug)]
pub struct Registration {
    pub id: ConnId,
    pub identity: Identity,
    pub tx: mpsc::Sender<OutboundFrame>,
}
