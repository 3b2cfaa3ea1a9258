//! Verified participant identity.

use serde::{Deserialize, Serialize};

/// Identity attached to a connection after credential verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user id issued by the credential authority.
    pub user_id: String,
    /// Name shown to other participants; also the `webrtc` routing key.
    pub display_name: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}
