use std::collections::{BTreeMap, HashSet};

use tokio::sync::mpsc::{self, error::TrySendError};

use syncroom_core::Identity;

use crate::realtime::types::{ConnId, OutboundFrame};

/// A registered connection as the hub sees it.
#[derive(Debug)]
pub struct Member {
    pub identity: Identity,
    tx: mpsc::Sender<OutboundFrame>,
}

impl Member {
    pub fn new(identity: Identity, tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self { identity, tx }
    }

    /// Consume the member, dropping its mailbox sender (closes the mailbox).
    pub fn into_identity(self) -> Identity {
        self.identity
    }
}

/// Result of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Mailbox at capacity; the member must be evicted.
    Saturated,
    /// Writer already gone; its reader will deregister it.
    Closed,
    Absent,
}

/// Presence registry: `conn_id -> Member`.
///
/// Owned by the hub task only, so it is a plain map with no interior locking.
#[derive(Debug, Default)]
pub struct Registry {
    members: BTreeMap<ConnId, Member>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            members: BTreeMap::new(),
        }
    }

    /// Insert unless already present. Returns false on duplicates.
    pub fn insert(&mut self, id: ConnId, member: Member) -> bool {
        if self.members.contains_key(&id) {
            return false;
        }
        self.members.insert(id, member);
        true
    }

    pub fn remove(&mut self, id: ConnId) -> Option<Member> {
        self.members.remove(&id)
    }

    pub fn contains(&self, id: ConnId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Present display names in join order, each listed once.
    pub fn display_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.members
            .values()
            .map(|m| m.identity.display_name.as_str())
            .filter(|name| seen.insert(*name))
            .map(str::to_string)
            .collect()
    }

    /// Most recently joined connection using `name`.
    pub fn find_latest_by_name(&self, name: &str) -> Option<ConnId> {
        self.members
            .iter()
            .rev()
            .find(|(_, m)| m.identity.display_name == name)
            .map(|(id, _)| *id)
    }

    pub fn try_deliver(&self, id: ConnId, frame: &OutboundFrame) -> Delivery {
        match self.members.get(&id) {
            Some(m) => enqueue(&m.tx, frame),
            None => Delivery::Absent,
        }
    }

    /// Enqueue on every mailbox without waiting. Returns saturated members.
    pub fn fan_out(&self, frame: &OutboundFrame) -> Vec<ConnId> {
        self.members
            .iter()
            .filter(|(_, m)| enqueue(&m.tx, frame) == Delivery::Saturated)
            .map(|(id, _)| *id)
            .collect()
    }
}

fn enqueue(tx: &mpsc::Sender<OutboundFrame>, frame: &OutboundFrame) -> Delivery {
    match tx.try_send(frame.clone()) {
        Ok(()) => Delivery::Queued,
        Err(TrySendError::Full(_)) => Delivery::Saturated,
        Err(TrySendError::Closed(_)) => Delivery::Closed,
    }
}
