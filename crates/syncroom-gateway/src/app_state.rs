//! Shared application state for the syncroom gateway.
//!
//! Holds the immutable config, the identity verifier, metrics, and the hub
//! handle. Building it spawns the hub task, so it must run inside a tokio
//! runtime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use syncroom_core::error::{Result, SyncRoomError};

use crate::auth::{IdentityVerifier, TicketVerifier};
use crate::config::GatewayConfig;
use crate::obs::HubMetrics;
use crate::realtime::{ConnId, Hub, HubHandle, HubOptions};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    verifier: Arc<dyn IdentityVerifier>,
    metrics: Arc<HubMetrics>,
    hub: HubHandle,
}

struct AppStateInner {
    cfg: GatewayConfig,
    conn_seq: AtomicU64,
}

impl AppState {
    /// Build state with the config-seeded ticket verifier.
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        let verifier = TicketVerifier::from_config(&cfg.auth.tickets);
        if verifier.is_empty() {
            return Err(SyncRoomError::BadRequest("no auth tickets configured".into()));
        }
        tracing::info!(tickets = verifier.len(), "ticket verifier loaded");
        Ok(Self::with_verifier(cfg, Arc::new(verifier)))
    }

    /// Build state around an external identity verifier.
    pub fn with_verifier(cfg: GatewayConfig, verifier: Arc<dyn IdentityVerifier>) -> Self {
        let metrics = Arc::new(HubMetrics::default());
        let hub = Hub::new(HubOptions::from(&cfg.hub), Arc::clone(&metrics));
        let (hub, _join) = hub.spawn();

        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                conn_seq: AtomicU64::new(1),
            }),
            verifier,
            metrics,
            hub,
        }
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn verifier(&self) -> &dyn IdentityVerifier {
        self.verifier.as_ref()
    }

    pub fn metrics(&self) -> Arc<HubMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn hub(&self) -> HubHandle {
        self.hub.clone()
    }

    pub fn next_conn_id(&self) -> ConnId {
        ConnId(self.inner.conn_seq.fetch_add(1, Ordering::Relaxed))
    }
}
