//! Typed views over envelope payloads.
//!
//! Payloads travel as strings and are parsed lazily, only by whoever needs the
//! structure: the hub reads the `webrtc` target, clients read the rest.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SyncRoomError};

/// Playback action carried by a `video_sync` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoEvent {
    Play,
    Pause,
    Seek,
    Load,
}

impl VideoEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoEvent::Play => "play",
            VideoEvent::Pause => "pause",
            VideoEvent::Seek => "seek",
            VideoEvent::Load => "load",
        }
    }
}

/// `video_sync` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSyncPayload {
    pub event: VideoEvent,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub playing: bool,
    /// Playback position in seconds.
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub triggered_by: String,
}

impl VideoSyncPayload {
    pub fn parse(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|e| SyncRoomError::Decode(format!("invalid video_sync payload: {e}")))
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| SyncRoomError::Internal(format!("video_sync encode failed: {e}")))
    }

    /// Playback state a late joiner should apply.
    pub fn state(&self) -> VideoState {
        VideoState {
            url: self.url.clone(),
            playing: self.playing,
            timestamp: self.timestamp,
        }
    }
}

/// Synchronized playback position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoState {
    pub url: String,
    pub playing: bool,
    /// Seconds.
    pub timestamp: f64,
}

/// Addressed display name of a `webrtc` payload.
///
/// Returns `None` when the payload is not a JSON object, has no `target`,
/// the target is not a string, or it is blank.
pub fn signal_target(payload: &str) -> Option<String> {
    let v: Value = serde_json::from_str(payload).ok()?;
    let target = v.get("target")?.as_str()?;
    if target.trim().is_empty() {
        return None;
    }
    Some(target.to_string())
}
