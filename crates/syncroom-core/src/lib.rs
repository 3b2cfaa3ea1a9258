//! syncroom core: transport-agnostic wire types, identity, and errors.
//!
//! This crate defines the envelope contract shared by the gateway hub and any
//! client tooling. It carries no transport or runtime dependencies so the same
//! types can be reused by test harnesses and SDKs.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed frames surface as `SyncRoomError::Decode` so a hostile peer can
//! never take the hub down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod identity;
pub mod protocol;

/// Shared result type.
pub use error::{Result, SyncRoomError};
pub use identity::Identity;
