//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;

use syncroom_core::error::{Result, SyncRoomError};

pub use schema::{AuthSection, GatewayConfig, GatewaySection, HubSection, TicketConfig};

/// Env var naming the config file.
pub const CONFIG_PATH_ENV: &str = "SYNCROOM_CONFIG";
/// Env var overriding `gateway.listen`.
pub const LISTEN_ENV: &str = "SYNCROOM_LISTEN";

const DEFAULT_CONFIG_PATH: &str = "syncroom.yaml";

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| SyncRoomError::Internal(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| SyncRoomError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load using `SYNCROOM_CONFIG` (or `syncroom.yaml`) and apply env overrides.
pub fn load_from_env() -> Result<GatewayConfig> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut cfg = load_from_file(&path)?;
    if let Ok(listen) = std::env::var(LISTEN_ENV) {
        cfg.gateway.listen = listen;
    }
    Ok(cfg)
}
