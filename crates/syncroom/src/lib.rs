//! Top-level facade crate for syncroom.
//!
//! Re-exports the core wire types and the gateway library so users can depend
//! on a single crate.

pub mod core {
    pub use syncroom_core::*;
}

pub mod gateway {
    pub use syncroom_gateway::*;
}
