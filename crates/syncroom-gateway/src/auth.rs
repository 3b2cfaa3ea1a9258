//! Identity verification collaborator.
//!
//! The hub only needs "this credential maps to that identity". Token minting,
//! password checks, and user storage live elsewhere; the gateway ships a
//! config-seeded ticket table so it can run standalone.

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use dashmap::DashMap;

use syncroom_core::error::{Result, SyncRoomError};
use syncroom_core::Identity;

use crate::config::TicketConfig;

/// Resolves a bearer credential into a verified identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Identity>;
}

/// In-memory bearer tickets. Lookups do not consume the ticket, so a client
/// may reconnect with the same credential.
#[derive(Default)]
pub struct TicketVerifier {
    tickets: DashMap<String, Identity>,
}

impl TicketVerifier {
    pub fn new() -> Self {
        Self {
            tickets: DashMap::new(),
        }
    }

    pub fn from_config(tickets: &[TicketConfig]) -> Self {
        let this = Self::new();
        for t in tickets {
            this.insert(t.ticket.clone(), Identity::new(&t.user_id, &t.display_name));
        }
        this
    }

    pub fn insert(&self, ticket: impl Into<String>, identity: Identity) {
        self.tickets.insert(ticket.into(), identity);
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

#[async_trait]
impl IdentityVerifier for TicketVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(SyncRoomError::AuthFailed);
        }
        self.tickets
            .get(credential)
            .map(|e| e.value().clone())
            .ok_or(SyncRoomError::AuthFailed)
    }
}

/// Pull the bearer credential from `Authorization: Bearer ...`, falling back to
/// the `token` query parameter (browsers cannot set WS upgrade headers).
pub fn extract_credential(headers: &HeaderMap, query_token: Option<&str>) -> Result<String> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let value = value.to_str().map_err(|_| SyncRoomError::AuthFailed)?;
        let (scheme, token) = value.split_once(' ').ok_or(SyncRoomError::AuthFailed)?;
        if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
            return Err(SyncRoomError::AuthFailed);
        }
        return Ok(token.trim().to_string());
    }

    match query_token.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => Err(SyncRoomError::AuthFailed),
    }
}
