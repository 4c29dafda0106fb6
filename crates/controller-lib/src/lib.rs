//! Library for the idle game-server controller
//!
//! This crate provides the core functionality for:
//! - Querying game-server occupancy over the status-ping protocol
//! - Reading and actuating container groups on the cloud control plane
//! - Deciding whether an empty instance should be stopped
//! - Driving those decisions across a fleet of targets
//! - Observability (metrics and structured event logs)

pub mod compute;
pub mod decision;
pub mod error;
pub mod fleet;
pub mod models;
pub mod observability;
pub mod protocol;
pub mod targets;

pub use decision::{DecisionEngine, UptimePolicy};
pub use error::{ComputeApiError, ConfigError, InvalidAction, ProtocolError, ServerUnreachable};
pub use fleet::{FailurePolicy, FleetDriver, FleetReport, TargetOutcome};
pub use models::*;
pub use observability::{ControllerMetrics, StructuredLogger};
