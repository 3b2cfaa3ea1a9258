//! syncroom gateway library entry.
//!
//! Wires credential verification, the WebSocket transport, and the realtime
//! hub into one server. Consumed by the binary (`main.rs`) and by integration
//! tests.

pub mod app_state;
pub mod auth;
pub mod config;
pub mod obs;
pub mod ops;
pub mod realtime;
pub mod router;
pub mod transport;
