//! Error taxonomy for the controller
//!
//! Only [`ServerUnreachable`] is recovered inline (an unreachable server counts
//! as empty). Everything else propagates to the fleet driver or the caller.

use std::time::Duration;
use thiserror::Error;

/// Invalid controller configuration. Fatal for the whole run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "target lists differ in length: {hosts} hostnames, {ports} ports, {instances} container groups"
    )]
    LengthMismatch {
        hosts: usize,
        ports: usize,
        instances: usize,
    },

    #[error("invalid port {value:?} at position {position}")]
    InvalidPort { value: String, position: usize },

    #[error("empty {field} entry at position {position}")]
    EmptyEntry { field: &'static str, position: usize },

    #[error("{0} is required")]
    MissingComponent(&'static str),

    #[error("invalid schedule expression {expression:?}: {reason}")]
    InvalidSchedule { expression: String, reason: String },
}

/// Malformed data on the status-ping wire.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("varint exceeds 5 bytes")]
    VarintTooLong,

    #[error("input ended inside a varint")]
    TruncatedVarint,

    #[error("frame declares {declared} bytes but {available} are available")]
    TruncatedFrame { declared: usize, available: usize },

    #[error("frame of {length} bytes exceeds the protocol limit")]
    FrameTooLarge { length: usize },

    #[error("status string of {length} bytes does not fit in a {frame}-byte frame")]
    StringOverrunsFrame { length: usize, frame: usize },

    #[error("status payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Underlying reason a status query failed.
#[derive(Debug, Error)]
pub enum PingFailure {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// The game server could not be queried. Callers treat this as "empty".
#[derive(Debug, Error)]
#[error("{address} is unreachable")]
pub struct ServerUnreachable {
    pub address: String,
    #[source]
    pub cause: PingFailure,
}

/// Failure talking to the cloud control plane or its token endpoint.
#[derive(Debug, Error)]
pub enum ComputeApiError {
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("control plane returned {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("malformed control-plane response: {0}")]
    Malformed(String),

    #[error("token request failed with {status}: {body}")]
    Token { status: u16, body: String },

    #[error("invalid control-plane URL: {0}")]
    Url(#[from] url::ParseError),
}

/// An action verb outside {start, stop, restart}.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0} is not a valid container action")]
pub struct InvalidAction(pub String);
