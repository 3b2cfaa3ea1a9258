//! Wire protocol modules.
//!
//! - `envelope`: the JSON message unit (`type`, `sender`, `payload`, `timestamp`).
//! - `payload`: typed views over the type-specific `payload` strings.
//! - `frame`: newline batching of several envelopes in one transport frame.
//!
//! Decoders never panic: malformed input is reported as `SyncRoomError::Decode`.

pub mod envelope;
pub mod frame;
pub mod payload;

pub use envelope::{Envelope, MessageType, SYSTEM_SENDER};
