//! Fleet evaluation
//!
//! Walks the configured targets in order, one at a time, and turns each into
//! a [`TargetOutcome`]. Status-query failures are always absorbed (the server
//! counts as empty); control-plane failures are isolated or abort the rest of
//! the run depending on the [`FailurePolicy`].

mod driver;


pub use driver::{FleetDriver, FleetDriverBuilder};

use crate::error::ComputeApiError;
use crate::models::{Decision, Occupancy, Target};
use std::fmt;
use std::str::FromStr;

/// How a control-plane failure on one target affects the others
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and move on to the next target
    #[default]
    Continue,
    /// Stop evaluating the remaining targets
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(FailurePolicy::Continue),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(format!(
                "unknown failure policy {other:?}, expected continue or abort"
            )),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Continue => f.write_str("continue"),
            FailurePolicy::Abort => f.write_str("abort"),
        }
    }
}

/// Result of evaluating one target
#[derive(Debug)]
pub struct TargetOutcome {
    pub target: Target,
    pub occupancy: Occupancy,
    /// The decision taken; for `Stop` the stop request has been accepted
    pub result: Result<Decision, ComputeApiError>,
}

impl TargetOutcome {
    pub fn decision(&self) -> Option<&Decision> {
        self.result.as_ref().ok()
    }

    pub fn stopped(&self) -> bool {
        self.decision().is_some_and(Decision::is_stop)
    }
}

/// Everything that happened during one run
#[derive(Debug, Default)]
pub struct FleetReport {
    pub outcomes: Vec<TargetOutcome>,
    /// True when a failure stopped the run before every target was evaluated
    pub aborted: bool,
    /// Targets never evaluated because of an abort
    pub skipped: usize,
}

impl FleetReport {
    pub fn evaluated(&self) -> usize {
        self.outcomes.len()
    }

    pub fn stopped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.stopped()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    pub fn is_clean(&self) -> bool {
        !self.aborted && self.failed() == 0
    }
}
