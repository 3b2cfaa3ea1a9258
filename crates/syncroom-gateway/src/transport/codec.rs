//! Inbound frame classification for the reader.
//!
//! - Text frames are passed through as raw `Bytes` (the hub decodes them)
//! - Oversized data frames are rejected before anything else sees them
//! - Ping/Pong/Close are surfaced for lifecycle management

use axum::extract::ws::Message;
use bytes::Bytes;
use syncroom_core::error::{Result, SyncRoomError};

#[derive(Debug)]
pub enum Inbound {
    Text(Bytes),
    Binary { len: usize },
    Ping,
    Pong,
    Close,
}

pub fn decode(msg: Message, max_frame_bytes: usize) -> Result<Inbound> {
    match msg {
        Message::Text(s) => {
            if s.len() > max_frame_bytes {
                return Err(SyncRoomError::PayloadTooLarge);
            }
            Ok(Inbound::Text(Bytes::from(s)))
        }
        Message::Binary(b) => {
            if b.len() > max_frame_bytes {
                return Err(SyncRoomError::PayloadTooLarge);
            }
            Ok(Inbound::Binary { len: b.len() })
        }
        Message::Ping(_) => Ok(Inbound::Ping),
        Message::Pong(_) => Ok(Inbound::Pong),
        Message::Close(_) => Ok(Inbound::Close),
    }
}
