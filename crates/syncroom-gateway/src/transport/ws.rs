//! WebSocket bootstrap.
//!
//! Responsibilities:
//! - Verify the bearer credential *before* upgrading (a failure is a plain
//!   HTTP error; no socket, mailbox, or task exists yet)
//! - Upgrade with the configured frame limit
//! - Register the new connection with the hub, then start its reader and
//!   writer tasks

use axum::{
    extract::{ws::WebSocket, ws::WebSocketUpgrade, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use syncroom_core::error::{Result, SyncRoomError};
use syncroom_core::Identity;

use crate::app_state::AppState;
use crate::auth::{extract_credential, IdentityVerifier};
use crate::realtime::Registration;
use crate::transport::pump::{read_pump, write_pump, PumpConfig};

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Resolve the caller's identity from headers or `?token=`.
pub async fn authenticate(
    verifier: &dyn IdentityVerifier,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<Identity> {
    let credential = extract_credential(headers, query_token)?;
    verifier.verify(&credential).await
}

/// HTTP rejection for a failed bootstrap.
pub fn reject(err: &SyncRoomError) -> Response {
    let status = match err {
        SyncRoomError::AuthFailed => StatusCode::UNAUTHORIZED,
        SyncRoomError::BadRequest(_) | SyncRoomError::PayloadTooLarge => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = Json(json!({
        "error": err.client_code().as_str(),
        "message": err.to_string(),
    }));
    (status, body).into_response()
}

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(
    State(app): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = match authenticate(app.verifier(), &headers, q.token.as_deref()).await {
        Ok(identity) => identity,
        Err(e) => {
            app.metrics().auth_rejections.inc(&[]);
            tracing::debug!(error = %e, "ws upgrade rejected");
            return reject(&e);
        }
    };

    let max = app.cfg().gateway.max_frame_bytes;
    ws.max_message_size(max)
        .max_frame_size(max)
        .on_upgrade(move |socket| start_connection(app, identity, socket))
}

/// Register an upgraded socket with the hub and spawn its two tasks.
pub async fn start_connection(app: AppState, identity: Identity, socket: WebSocket) {
    let id = app.next_conn_id();
    let span = tracing::info_span!(
        "conn",
        conn_id = %id,
        user_id = %identity.user_id,
        display_name = %identity.display_name
    );

    let gw = &app.cfg().gateway;
    let cfg = PumpConfig::from(gw);
    let (out_tx, out_rx) = mpsc::channel(gw.outbound_capacity);

    let hub = app.hub();
    let reg = Registration {
        id,
        identity,
        tx: out_tx,
    };
    if let Err(e) = hub.register(reg).instrument(span.clone()).await {
        span.in_scope(|| tracing::warn!(error = %e, "registration failed; dropping socket"));
        return;
    }
    app.metrics().ws_upgrades.inc(&[]);

    let (ws_tx, ws_rx) = socket.split();
    let (alive_tx, alive_rx) = oneshot::channel();

    tokio::spawn(write_pump(id, ws_tx, out_rx, cfg.clone(), alive_tx).instrument(span.clone()));
    tokio::spawn(
        async move {
            read_pump(id, ws_rx, hub, cfg, alive_rx, app.metrics()).await;
        }
        .instrument(span),
    );
}
