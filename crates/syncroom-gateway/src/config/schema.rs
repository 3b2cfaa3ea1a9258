use serde::Deserialize;
use syncroom_core::error::{Result, SyncRoomError};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub hub: HubSection,

    pub auth: AuthSection,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(SyncRoomError::UnsupportedVersion);
        }

        self.gateway.validate()?;
        self.hub.validate()?;
        self.auth.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Liveness probe period; must be shorter than `pong_timeout_ms`.
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    /// Read deadline, refreshed on every pong.
    #[serde(default = "default_pong_timeout_ms")]
    pub pong_timeout_ms: u64,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Per-connection outbound mailbox size.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            ping_interval_ms: default_ping_interval_ms(),
            pong_timeout_ms: default_pong_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
            outbound_capacity: default_outbound_capacity(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(1000..=120000).contains(&self.ping_interval_ms) {
            return Err(SyncRoomError::BadRequest(
                "gateway.ping_interval_ms must be between 1000 and 120000".into(),
            ));
        }
        if !(2000..=600000).contains(&self.pong_timeout_ms) {
            return Err(SyncRoomError::BadRequest(
                "gateway.pong_timeout_ms must be between 2000 and 600000".into(),
            ));
        }
        if self.pong_timeout_ms <= self.ping_interval_ms {
            return Err(SyncRoomError::BadRequest(
                "gateway.pong_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        if !(100..=60000).contains(&self.write_timeout_ms) {
            return Err(SyncRoomError::BadRequest(
                "gateway.write_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        if !(1024..=1024 * 1024).contains(&self.max_frame_bytes) {
            return Err(SyncRoomError::BadRequest(
                "gateway.max_frame_bytes must be between 1024 and 1048576".into(),
            ));
        }
        if self.outbound_capacity == 0 {
            return Err(SyncRoomError::BadRequest(
                "gateway.outbound_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_ping_interval_ms() -> u64 {
    54000
}
fn default_pong_timeout_ms() -> u64 {
    60000
}
fn default_write_timeout_ms() -> u64 {
    10000
}
fn default_max_frame_bytes() -> usize {
    64 * 1024
}
fn default_outbound_capacity() -> usize {
    256
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubSection {
    /// Capacity of the hub event mailbox shared by all connections.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Broadcast `system` left + `user_list` when a slow peer is evicted.
    #[serde(default = "default_announce_evictions")]
    pub announce_evictions: bool,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            announce_evictions: default_announce_evictions(),
        }
    }
}

impl HubSection {
    pub fn validate(&self) -> Result<()> {
        if self.mailbox_capacity == 0 {
            return Err(SyncRoomError::BadRequest(
                "hub.mailbox_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_mailbox_capacity() -> usize {
    1024
}
fn default_announce_evictions() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthSection {
    #[serde(default)]
    pub tickets: Vec<TicketConfig>,
}

impl AuthSection {
    pub fn validate(&self) -> Result<()> {
        if self.tickets.is_empty() {
            return Err(SyncRoomError::BadRequest("auth.tickets must not be empty".into()));
        }
        for t in &self.tickets {
            if t.ticket.trim().is_empty() || t.display_name.trim().is_empty() {
                return Err(SyncRoomError::BadRequest(format!(
                    "auth.tickets entry for user {} needs a ticket and display_name",
                    t.user_id
                )));
            }
        }
        Ok(())
    }
}

/// Bearer ticket bound to one identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TicketConfig {
    pub ticket: String,
    pub user_id: String,
    pub display_name: String,
}
