//! Envelope (JSON text frame).
//!
//! `payload` is an opaque string whose structure depends on `type`. The hub only
//! looks inside it for `webrtc` routing; everything else is forwarded verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SyncRoomError};

/// Sender name used for hub-originated envelopes.
pub const SYSTEM_SENDER: &str = "system";

/// Envelope type tag. Drives routing policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    Chat,
    System,
    VideoSync,
    WebRtc,
    UserList,
    Admin,
    /// Any tag this build does not know; kept so it can be echoed back.
    Unknown(String),
}

impl MessageType {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "chat" => MessageType::Chat,
            "system" => MessageType::System,
            "video_sync" => MessageType::VideoSync,
            "webrtc" => MessageType::WebRtc,
            "user_list" => MessageType::UserList,
            "admin" => MessageType::Admin,
            other => MessageType::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Chat => "chat",
            MessageType::System => "system",
            MessageType::VideoSync => "video_sync",
            MessageType::WebRtc => "webrtc",
            MessageType::UserList => "user_list",
            MessageType::Admin => "admin",
            MessageType::Unknown(tag) => tag,
        }
    }

    /// Types only the hub may originate.
    pub fn is_hub_only(&self) -> bool {
        matches!(self, MessageType::System | MessageType::UserList)
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(d)?;
        Ok(MessageType::parse(&tag))
    }
}

/// One logical message on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type (field name is `type` in JSON).
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    /// Display name of the originator, or `"system"`.
    #[serde(default)]
    pub sender: String,
    /// Type-specific payload, itself usually JSON.
    #[serde(default)]
    pub payload: String,
    /// RFC3339 timestamp; decode time when the client omitted it.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    pub fn new(msg_type: MessageType, sender: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            msg_type,
            sender: sender.into(),
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }

    /// Hub presence notice (`"<name> joined"`, `"<name> left"`).
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageType::System, SYSTEM_SENDER, text)
    }

    /// Presence snapshot; payload is a JSON array of display names.
    pub fn user_list<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        let payload = serde_json::to_string(&names)
            .map_err(|e| SyncRoomError::Internal(format!("user_list encode failed: {e}")))?;
        Ok(Self::new(MessageType::UserList, SYSTEM_SENDER, payload))
    }

    /// Decode one envelope from a single (non-batched) JSON segment.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(|e| SyncRoomError::Decode(format!("invalid envelope json: {e}")))
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| SyncRoomError::Internal(format!("envelope encode failed: {e}")))
    }

    /// Names carried by a `user_list` envelope.
    pub fn user_names(&self) -> Result<Vec<String>> {
        if self.msg_type != MessageType::UserList {
            return Err(SyncRoomError::Decode(format!(
                "expected user_list, got {}",
                self.msg_type.as_str()
            )));
        }
        serde_json::from_str(&self.payload)
            .map_err(|e| SyncRoomError::Decode(format!("invalid user_list payload: {e}")))
    }
}
