//! Status-ping client
//!
//! One query is one connection: handshake, status request, one response
//! frame, close. Every failure mode collapses into [`ServerUnreachable`].

use super::codec::{decode_varint, frame_packet, read_varint, write_varint, MAX_FRAME_LEN};
use super::StatusProbe;
use crate::error::{PingFailure, ProtocolError, ServerUnreachable};
use crate::models::{StatusResponse, Target};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Bound on connect plus the whole exchange
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of the status request packet: packet id only
pub const STATUS_REQUEST: [u8; 1] = [0x00];

const HANDSHAKE_PACKET_ID: u8 = 0x00;
const PROTOCOL_VERSION: u64 = 0;
const NEXT_STATE_STATUS: u8 = 0x01;

/// Build the (unframed) handshake body for `host:port`
///
/// Layout: `[0x00][varint 0][varint len][host][port lo][port hi][0x01]`
pub fn handshake_packet(host: &str, port: u16) -> Vec<u8> {
    let mut body = Vec::with_capacity(host.len() + 8);
    body.push(HANDSHAKE_PACKET_ID);
    write_varint(&mut body, PROTOCOL_VERSION);
    write_varint(&mut body, host.len() as u64);
    body.extend_from_slice(host.as_bytes());
    body.push((port & 0x00ff) as u8);
    body.push((port >> 8) as u8);
    body.push(NEXT_STATE_STATUS);
    body
}

/// Extract the JSON string from a status response body (length prefix already removed)
pub fn parse_status_frame(body: &[u8]) -> Result<String, ProtocolError> {
    let (_packet_id, id_len) = decode_varint(body)?;
    let rest = &body[id_len..];

    let (length, len_len) = decode_varint(rest)?;
    let rest = &rest[len_len..];
    let length = usize::try_from(length).unwrap_or(usize::MAX);
    if length > rest.len() {
        return Err(ProtocolError::StringOverrunsFrame {
            length,
            frame: body.len(),
        });
    }

    String::from_utf8(rest[..length].to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Run the handshake/status exchange over an already connected stream
pub async fn exchange<S>(stream: &mut S, host: &str, port: u16) -> Result<String, PingFailure>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(&frame_packet(&handshake_packet(host, port)))
        .await?;
    stream.write_all(&frame_packet(&STATUS_REQUEST)).await?;
    stream.flush().await?;

    let length = usize::try_from(read_varint(stream).await?).unwrap_or(usize::MAX);
    if length > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge { length }.into());
    }

    let mut body = vec![0u8; length];
    stream.read_exact(&mut body).await?;

    Ok(parse_status_frame(&body)?)
}

async fn connect_and_exchange(host: &str, port: u16) -> Result<String, PingFailure> {
    let mut stream = TcpStream::connect((host, port)).await?;
    let status = exchange(&mut stream, host, port).await;
    // The stream is dropped (closed) on every path; shutdown just makes it polite.
    let _ = stream.shutdown().await;
    status
}

/// TCP status-ping client
#[derive(Debug, Clone)]
pub struct StatusClient {
    timeout: Duration,
}

impl Default for StatusClient {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_TIMEOUT)
    }
}

impl StatusClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the raw status JSON from `host:port`
    pub async fn fetch_json(&self, host: &str, port: u16) -> Result<String, ServerUnreachable> {
        let address = format!("{host}:{port}");

        let cause = match tokio::time::timeout(self.timeout, connect_and_exchange(host, port)).await
        {
            Ok(Ok(json)) => {
                debug!(address = %address, bytes = json.len(), "Received status payload");
                return Ok(json);
            }
            Ok(Err(failure)) => failure,
            Err(_) => PingFailure::Timeout(self.timeout),
        };

        Err(ServerUnreachable { address, cause })
    }
}

#[async_trait]
impl StatusProbe for StatusClient {
    async fn query(&self, target: &Target) -> Result<StatusResponse, ServerUnreachable> {
        let json = self.fetch_json(&target.host, target.port).await?;
        Ok(StatusResponse::parse(json))
    }
}
