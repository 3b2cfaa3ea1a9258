//! Realtime runtime for the syncroom gateway.
//!
//! The hub owns presence and the cached playback state; connections talk to it
//! only through `HubHandle`.

pub mod core;
pub mod types;

pub use self::core::{Hub, HubEvent, HubHandle, HubOptions, Registry};
pub use types::{ConnId, OutboundFrame, Registration};
