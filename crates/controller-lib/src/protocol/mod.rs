//! Status-ping protocol used to read game-server occupancy
//!
//! Packets are varint-length-prefixed frames. A query sends a handshake and
//! a status request on one connection, then reads a single status frame
//! carrying a JSON document.

mod codec;
mod ping;

pub use codec::{
    decode_varint, encode_varint, frame_packet, read_varint, unframe, write_varint,
    MAX_FRAME_LEN, MAX_VARINT_LEN,
};
pub use ping::{
    exchange, handshake_packet, parse_status_frame, StatusClient, DEFAULT_STATUS_TIMEOUT,
    STATUS_REQUEST,
};

use crate::error::ServerUnreachable;
use crate::models::{StatusResponse, Target};

pub use async_trait::async_trait;

/// Source of game-server status for a target
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Query the live status of the target's game server
    async fn query(&self, target: &Target) -> Result<StatusResponse, ServerUnreachable>;
}
