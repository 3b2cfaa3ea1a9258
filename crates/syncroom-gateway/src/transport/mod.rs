//! Transport layer (WebSocket).
//!
//! Bootstrap (`ws`), the per-connection reader/writer tasks (`pump`), and the
//! frame classifier they share (`codec`).

pub mod codec;
pub mod pump;
pub mod ws;
