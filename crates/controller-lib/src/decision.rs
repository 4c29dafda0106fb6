//! Per-target stop/no-op decision
//!
//! The engine is pure: callers feed it the occupancy they observed, the
//! compute state they fetched and the current time. Evaluation runs
//! occupancy -> compute state -> grace period, stopping at the first
//! terminal outcome.

use crate::models::{ComputeState, Decision, NoActionReason, Occupancy, RunState, StopReason};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Grace period applied when none is configured
pub const DEFAULT_MIN_UPTIME: Duration = Duration::from_secs(10 * 60);

/// What to do with an empty, running instance whose uptime cannot be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UptimePolicy {
    /// Stop it (fail open toward cost control)
    #[default]
    Stop,
    /// Leave it running
    Keep,
}

impl FromStr for UptimePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop" => Ok(UptimePolicy::Stop),
            "keep" => Ok(UptimePolicy::Keep),
            other => Err(format!("unknown uptime policy {other:?}, expected stop or keep")),
        }
    }
}

impl fmt::Display for UptimePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UptimePolicy::Stop => f.write_str("stop"),
            UptimePolicy::Keep => f.write_str("keep"),
        }
    }
}

/// Decides whether an instance should be stopped
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    min_uptime: Duration,
    unknown_uptime: UptimePolicy,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_UPTIME)
    }
}

impl DecisionEngine {
    pub fn new(min_uptime: Duration) -> Self {
        Self {
            min_uptime,
            unknown_uptime: UptimePolicy::default(),
        }
    }

    pub fn with_uptime_policy(mut self, policy: UptimePolicy) -> Self {
        self.unknown_uptime = policy;
        self
    }

    pub fn min_uptime(&self) -> Duration {
        self.min_uptime
    }

    pub fn uptime_policy(&self) -> UptimePolicy {
        self.unknown_uptime
    }

    /// Occupancy stage. Returns a terminal decision when the server has
    /// players; `None` means the compute state must be consulted.
    pub fn check_occupancy(&self, occupancy: Occupancy) -> Option<Decision> {
        match occupancy {
            Occupancy::Occupied(players) => {
                Some(Decision::NoAction(NoActionReason::Occupied { players }))
            }
            Occupancy::Empty | Occupancy::Unreachable => None,
        }
    }

    /// Compute-state and grace-period stages for an empty server
    pub fn decide(&self, compute: &ComputeState, now: DateTime<Utc>) -> Decision {
        if compute.state != RunState::Running {
            return Decision::NoAction(NoActionReason::NotRunning {
                state: compute.state.clone(),
            });
        }

        match uptime(compute.state_since.as_deref(), now) {
            Some(uptime) if uptime < self.min_uptime => {
                Decision::NoAction(NoActionReason::GracePeriod {
                    uptime,
                    min_uptime: self.min_uptime,
                })
            }
            Some(uptime) => Decision::Stop(StopReason::Idle { uptime }),
            None => match self.unknown_uptime {
                UptimePolicy::Stop => Decision::Stop(StopReason::UptimeUnknown),
                UptimePolicy::Keep => Decision::NoAction(NoActionReason::UptimeUnknown),
            },
        }
    }

    /// Full evaluation from already gathered inputs
    pub fn evaluate(
        &self,
        occupancy: Occupancy,
        compute: &ComputeState,
        now: DateTime<Utc>,
    ) -> Decision {
        self.check_occupancy(occupancy)
            .unwrap_or_else(|| self.decide(compute, now))
    }
}

/// Parse a state-transition timestamp. Accepts RFC 3339, and naive
/// ISO 8601 timestamps which are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Time elapsed since `since`. A timestamp in the future counts as zero uptime.
pub fn uptime(since: Option<&str>, now: DateTime<Utc>) -> Option<Duration> {
    let since = parse_timestamp(since?)?;
    Some((now - since).to_std().unwrap_or(Duration::ZERO))
}
