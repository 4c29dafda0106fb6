//! Observability infrastructure for the controller
//!
//! Provides:
//! - Prometheus metrics (runs, decisions, stop actions, status-query latency)
//! - Structured JSON logging with tracing

use crate::models::{Decision, Target};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for status-query latency (in seconds)
const STATUS_LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Histogram buckets for whole-run duration (in seconds)
const RUN_DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ControllerMetricsInner> = OnceLock::new();

struct ControllerMetricsInner {
    runs: IntCounter,
    run_failures: IntCounter,
    run_duration_seconds: Histogram,
    decisions: IntCounterVec,
    stop_actions: IntCounter,
    target_failures: IntCounter,
    unreachable_servers: IntCounter,
    targets_configured: IntGauge,
    status_latency_seconds: Histogram,
}

impl ControllerMetricsInner {
    fn new() -> Self {
        Self {
            runs: register_int_counter!(
                "idle_controller_runs_total",
                "Number of fleet evaluation runs started"
            )
            .expect("Failed to register runs_total"),

            run_failures: register_int_counter!(
                "idle_controller_run_failures_total",
                "Runs that ended early (token failure or aborted fleet)"
            )
            .expect("Failed to register run_failures_total"),

            run_duration_seconds: register_histogram!(
                "idle_controller_run_duration_seconds",
                "Wall time of one fleet evaluation run",
                RUN_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register run_duration_seconds"),

            decisions: register_int_counter_vec!(
                "idle_controller_decisions_total",
                "Target decisions by outcome",
                &["outcome"]
            )
            .expect("Failed to register decisions_total"),

            stop_actions: register_int_counter!(
                "idle_controller_stop_actions_total",
                "Stop requests accepted by the control plane"
            )
            .expect("Failed to register stop_actions_total"),

            target_failures: register_int_counter!(
                "idle_controller_target_failures_total",
                "Targets whose evaluation failed on the control plane"
            )
            .expect("Failed to register target_failures_total"),

            unreachable_servers: register_int_counter!(
                "idle_controller_unreachable_servers_total",
                "Status queries that found the game server unreachable"
            )
            .expect("Failed to register unreachable_servers_total"),

            targets_configured: register_int_gauge!(
                "idle_controller_targets_configured",
                "Number of configured targets"
            )
            .expect("Failed to register targets_configured"),

            status_latency_seconds: register_histogram!(
                "idle_controller_status_query_latency_seconds",
                "Time spent querying game-server status",
                STATUS_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register status_query_latency_seconds"),
        }
    }
}

/// Controller metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct ControllerMetrics {
    _private: (),
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ControllerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ControllerMetricsInner {
        GLOBAL_METRICS.get_or_init(ControllerMetricsInner::new)
    }

    pub fn inc_runs(&self) {
        self.inner().runs.inc();
    }

    pub fn inc_run_failures(&self) {
        self.inner().run_failures.inc();
    }

    pub fn observe_run_duration(&self, duration_secs: f64) {
        self.inner().run_duration_seconds.observe(duration_secs);
    }

    pub fn record_decision(&self, decision: &Decision) {
        self.inner()
            .decisions
            .with_label_values(&[decision.outcome()])
            .inc();
    }

    pub fn inc_stop_actions(&self) {
        self.inner().stop_actions.inc();
    }

    pub fn inc_target_failures(&self) {
        self.inner().target_failures.inc();
    }

    pub fn inc_unreachable(&self) {
        self.inner().unreachable_servers.inc();
    }

    pub fn set_targets_configured(&self, count: i64) {
        self.inner().targets_configured.set(count);
    }

    pub fn observe_status_latency(&self, duration_secs: f64) {
        self.inner().status_latency_seconds.observe(duration_secs);
    }

    pub fn decisions_for(&self, outcome: &str) -> u64 {
        self.inner().decisions.with_label_values(&[outcome]).get()
    }
}

/// Structured logger for controller events
///
/// Every event carries a fixed `event` field so runs can be followed in the
/// JSON log stream.
#[derive(Clone)]
pub struct StructuredLogger {
    resource_group: String,
}

impl StructuredLogger {
    pub fn new(resource_group: impl Into<String>) -> Self {
        Self {
            resource_group: resource_group.into(),
        }
    }

    pub fn log_startup(&self, version: &str, targets: usize, schedule: Option<&str>) {
        info!(
            event = "controller_started",
            resource_group = %self.resource_group,
            version = %version,
            targets = targets,
            schedule = schedule.unwrap_or("once"),
            "Idle controller started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "controller_shutdown",
            resource_group = %self.resource_group,
            reason = %reason,
            "Idle controller shutting down"
        );
    }

    pub fn log_run_started(&self, targets: usize) {
        info!(
            event = "run_started",
            resource_group = %self.resource_group,
            targets = targets,
            "Beginning fleet evaluation"
        );
    }

    pub fn log_run_finished(&self, evaluated: usize, stopped: usize, failed: usize, aborted: bool, elapsed_ms: u128) {
        if aborted || failed > 0 {
            warn!(
                event = "run_finished",
                resource_group = %self.resource_group,
                evaluated = evaluated,
                stopped = stopped,
                failed = failed,
                aborted = aborted,
                elapsed_ms = elapsed_ms,
                "Fleet evaluation finished with failures"
            );
        } else {
            info!(
                event = "run_finished",
                resource_group = %self.resource_group,
                evaluated = evaluated,
                stopped = stopped,
                elapsed_ms = elapsed_ms,
                "Fleet evaluation finished"
            );
        }
    }

    pub fn log_run_failed(&self, error: &dyn std::error::Error) {
        error!(
            event = "run_failed",
            resource_group = %self.resource_group,
            error = %error,
            "Fleet evaluation could not start"
        );
    }

    pub fn log_occupied(&self, target: &Target, players: u32) {
        info!(
            event = "server_occupied",
            server = %target.address(),
            container_group = %target.instance,
            players = players,
            "People on the server"
        );
    }

    pub fn log_empty(&self, target: &Target) {
        info!(
            event = "server_empty",
            server = %target.address(),
            container_group = %target.instance,
            "Game server is empty"
        );
    }

    pub fn log_unreachable(&self, target: &Target, error: &dyn std::error::Error) {
        let cause = error
            .source()
            .map(ToString::to_string)
            .unwrap_or_default();
        info!(
            event = "server_unreachable",
            server = %target.address(),
            container_group = %target.instance,
            cause = %cause,
            "Game server not responding, treating it as empty"
        );
    }

    pub fn log_decision(&self, target: &Target, decision: &Decision) {
        info!(
            event = "decision",
            server = %target.address(),
            container_group = %target.instance,
            outcome = decision.outcome(),
            reason = %decision,
            "Target evaluated"
        );
    }

    pub fn log_stop_issued(&self, target: &Target) {
        info!(
            event = "container_stop",
            resource_group = %self.resource_group,
            container_group = %target.instance,
            "Shutting down container group"
        );
    }

    pub fn log_target_failed(&self, target: &Target, error: &dyn std::error::Error) {
        error!(
            event = "target_failed",
            resource_group = %self.resource_group,
            server = %target.address(),
            container_group = %target.instance,
            error = %error,
            "Control-plane call failed for target"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NoActionReason;

    #[test]
    fn test_controller_metrics_usage() {
        let metrics = ControllerMetrics::new();

        metrics.inc_runs();
        metrics.observe_run_duration(0.4);
        metrics.observe_status_latency(0.02);
        metrics.set_targets_configured(3);
        metrics.inc_unreachable();

        let decision = Decision::NoAction(NoActionReason::UptimeUnknown);
        let before = metrics.decisions_for("uptime_unknown");
        metrics.record_decision(&decision);
        assert_eq!(metrics.decisions_for("uptime_unknown"), before + 1);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("games-rg");
        assert_eq!(logger.resource_group, "games-rg");
    }
}
