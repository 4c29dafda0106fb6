//! Core data models for the controller

use crate::error::InvalidAction;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// One configured game server and the container group hosting it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub host: String,
    pub port: u16,
    /// Container group name on the control plane
    pub instance: String,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16, instance: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            instance: instance.into(),
        }
    }

    /// `host:port`, used in logs and errors
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parsed status payload reported by a game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// `players.online`; `None` when the field is missing or not a number
    pub online_players: Option<u32>,
    pub max_players: Option<u32>,
    pub version: Option<String>,
    pub description: Option<String>,
    /// The JSON string exactly as received
    pub raw: String,
}

impl StatusResponse {
    /// Parse the status JSON. Never fails: anything unreadable is left as `None`.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let json: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);

        let players = json.get("players");
        let count = |key: &str| {
            players
                .and_then(|p| p.get(key))
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
        };

        let description = match json.get("description") {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Object(obj)) => obj.get("text").and_then(Value::as_str).map(str::to_owned),
            _ => None,
        };

        Self {
            online_players: count("online"),
            max_players: count("max"),
            version: json
                .pointer("/version/name")
                .and_then(Value::as_str)
                .map(str::to_owned),
            description,
            raw,
        }
    }
}

/// Run state of a container group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunState {
    Running,
    Terminated,
    Other(String),
}

impl From<&str> for RunState {
    fn from(value: &str) -> Self {
        match value {
            "Running" => RunState::Running,
            "Terminated" => RunState::Terminated,
            other => RunState::Other(other.to_string()),
        }
    }
}

impl From<String> for RunState {
    fn from(value: String) -> Self {
        RunState::from(value.as_str())
    }
}

impl From<RunState> for String {
    fn from(value: RunState) -> Self {
        value.to_string()
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Running => f.write_str("Running"),
            RunState::Terminated => f.write_str("Terminated"),
            RunState::Other(s) => f.write_str(s),
        }
    }
}

/// Current state of a container group as read from the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeState {
    pub state: RunState,
    /// Start time when running, finish time when stopped. Kept raw so that
    /// unparsable values reach the decision engine.
    pub state_since: Option<String>,
    /// Public address, if one is assigned
    pub fqdn: Option<String>,
}

impl ComputeState {
    /// State assumed when the control plane reports no instance view
    pub fn long_stopped() -> Self {
        Self {
            state: RunState::Terminated,
            state_since: None,
            fqdn: None,
        }
    }
}

/// Actions accepted by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeAction {
    Start,
    Stop,
    Restart,
}

impl ComputeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeAction::Start => "start",
            ComputeAction::Stop => "stop",
            ComputeAction::Restart => "restart",
        }
    }
}

impl FromStr for ComputeAction {
    type Err = InvalidAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(ComputeAction::Start),
            "stop" => Ok(ComputeAction::Stop),
            "restart" => Ok(ComputeAction::Restart),
            other => Err(InvalidAction(other.to_string())),
        }
    }
}

impl fmt::Display for ComputeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Occupancy of a game server, as far as the status query could tell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    /// At least one player online
    Occupied(u32),
    /// Reachable, with zero or unknown players
    Empty,
    /// Status query failed
    Unreachable,
}

impl Occupancy {
    pub fn from_status(status: &StatusResponse) -> Self {
        match status.online_players {
            Some(n) if n > 0 => Occupancy::Occupied(n),
            _ => Occupancy::Empty,
        }
    }

    pub fn is_occupied(&self) -> bool {
        matches!(self, Occupancy::Occupied(_))
    }
}

/// Why a target was left alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoActionReason {
    Occupied { players: u32 },
    NotRunning { state: RunState },
    GracePeriod { uptime: Duration, min_uptime: Duration },
    UptimeUnknown,
}

/// Why a target is being stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Idle { uptime: Duration },
    UptimeUnknown,
}

/// Outcome of evaluating one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    NoAction(NoActionReason),
    Stop(StopReason),
}

impl Decision {
    pub fn is_stop(&self) -> bool {
        matches!(self, Decision::Stop(_))
    }

    /// Short label used for metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            Decision::NoAction(NoActionReason::Occupied { .. }) => "occupied",
            Decision::NoAction(NoActionReason::NotRunning { .. }) => "not_running",
            Decision::NoAction(NoActionReason::GracePeriod { .. }) => "grace_period",
            Decision::NoAction(NoActionReason::UptimeUnknown) => "uptime_unknown",
            Decision::Stop(_) => "stop",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::NoAction(NoActionReason::Occupied { players }) => {
                write!(f, "{players} player(s) online")
            }
            Decision::NoAction(NoActionReason::NotRunning { state }) => {
                write!(f, "container is not running ({state})")
            }
            Decision::NoAction(NoActionReason::GracePeriod { uptime, min_uptime }) => write!(
                f,
                "up for {}s, below the minimum uptime of {}s",
                uptime.as_secs(),
                min_uptime.as_secs()
            ),
            Decision::NoAction(NoActionReason::UptimeUnknown) => {
                f.write_str("uptime unknown, keeping container")
            }
            Decision::Stop(StopReason::Idle { uptime }) => {
                write!(f, "empty and up for {}s", uptime.as_secs())
            }
            Decision::Stop(StopReason::UptimeUnknown) => {
                f.write_str("empty and uptime unknown")
            }
        }
    }
}
