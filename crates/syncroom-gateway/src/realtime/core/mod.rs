//! Realtime core: the hub task and the registry it owns.

mod hub;
mod registry;

pub use hub::{Hub, HubEvent, HubHandle, HubOptions};
pub use registry::{Delivery, Member, Registry};
