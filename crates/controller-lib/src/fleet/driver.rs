//! Sequential fleet driver

use super::{FailurePolicy, FleetReport, TargetOutcome};
use crate::compute::{BearerToken, ComputeControl, TokenSource};
use crate::decision::DecisionEngine;
use crate::error::{ComputeApiError, ConfigError};
use crate::models::{ComputeAction, Decision, Occupancy, Target};
use crate::observability::{ControllerMetrics, StructuredLogger};
use crate::protocol::StatusProbe;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

/// Evaluates every configured target once per run
pub struct FleetDriver {
    probe: Arc<dyn StatusProbe>,
    compute: Arc<dyn ComputeControl>,
    engine: DecisionEngine,
    targets: Vec<Target>,
    failure_policy: FailurePolicy,
    metrics: ControllerMetrics,
    logger: StructuredLogger,
}

impl FleetDriver {
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Acquire one token and evaluate the fleet with it. A token failure
    /// ends the run before any target is touched.
    pub async fn run_with(&self, tokens: &dyn TokenSource) -> Result<FleetReport, ComputeApiError> {
        let token = match tokens.acquire().await {
            Ok(token) => token,
            Err(e) => {
                self.metrics.inc_run_failures();
                self.logger.log_run_failed(&e);
                return Err(e);
            }
        };
        Ok(self.run(&token).await)
    }

    /// Evaluate all targets in configuration order. The token is only read.
    pub async fn run(&self, token: &BearerToken) -> FleetReport {
        let start = Instant::now();
        self.metrics.inc_runs();
        self.logger.log_run_started(self.targets.len());

        let mut report = FleetReport::default();
        for (index, target) in self.targets.iter().enumerate() {
            let outcome = self.evaluate_target(target, token).await;
            let failed = outcome.result.is_err();
            report.outcomes.push(outcome);

            if failed && self.failure_policy == FailurePolicy::Abort {
                report.aborted = true;
                report.skipped = self.targets.len() - index - 1;
                break;
            }
        }

        let elapsed = start.elapsed();
        self.metrics.observe_run_duration(elapsed.as_secs_f64());
        if report.aborted {
            self.metrics.inc_run_failures();
        }
        self.logger.log_run_finished(
            report.evaluated(),
            report.stopped(),
            report.failed(),
            report.aborted,
            elapsed.as_millis(),
        );

        report
    }

    async fn evaluate_target(&self, target: &Target, token: &BearerToken) -> TargetOutcome {
        let occupancy = self.check_occupancy(target).await;

        let result = match self.engine.check_occupancy(occupancy) {
            Some(decision) => Ok(decision),
            None => self.check_compute(target, token).await,
        };

        match &result {
            Ok(decision) => {
                self.metrics.record_decision(decision);
                self.logger.log_decision(target, decision);
            }
            Err(e) => {
                self.metrics.inc_target_failures();
                self.logger.log_target_failed(target, e);
            }
        }

        TargetOutcome {
            target: target.clone(),
            occupancy,
            result,
        }
    }

    async fn check_occupancy(&self, target: &Target) -> Occupancy {
        let start = Instant::now();
        let status = self.probe.query(target).await;
        self.metrics
            .observe_status_latency(start.elapsed().as_secs_f64());

        match status {
            Ok(status) => {
                let occupancy = Occupancy::from_status(&status);
                match occupancy {
                    Occupancy::Occupied(players) => self.logger.log_occupied(target, players),
                    _ => self.logger.log_empty(target),
                }
                occupancy
            }
            Err(e) => {
                self.metrics.inc_unreachable();
                self.logger.log_unreachable(target, &e);
                Occupancy::Unreachable
            }
        }
    }

    async fn check_compute(
        &self,
        target: &Target,
        token: &BearerToken,
    ) -> Result<Decision, ComputeApiError> {
        let state = self.compute.get_state(&target.instance, token).await?;
        debug!(
            container_group = %target.instance,
            state = %state.state,
            state_since = ?state.state_since,
            fqdn = ?state.fqdn,
            "Fetched container state"
        );

        let decision = self.engine.decide(&state, Utc::now());
        if decision.is_stop() {
            self.logger.log_stop_issued(target);
            self.compute
                .apply_action(&target.instance, ComputeAction::Stop, token)
                .await?;
            self.metrics.inc_stop_actions();
        }

        Ok(decision)
    }
}

/// Builder for a [`FleetDriver`]
pub struct FleetDriverBuilder {
    probe: Option<Arc<dyn StatusProbe>>,
    compute: Option<Arc<dyn ComputeControl>>,
    engine: DecisionEngine,
    targets: Vec<Target>,
    failure_policy: FailurePolicy,
    logger: Option<StructuredLogger>,
}

impl FleetDriverBuilder {
    /// Create a new builder with default engine and policy
    pub fn new() -> Self {
        Self {
            probe: None,
            compute: None,
            engine: DecisionEngine::default(),
            targets: Vec::new(),
            failure_policy: FailurePolicy::default(),
            logger: None,
        }
    }

    /// Set the status probe
    pub fn probe(mut self, probe: Arc<dyn StatusProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Set the control-plane client
    pub fn compute(mut self, compute: Arc<dyn ComputeControl>) -> Self {
        self.compute = Some(compute);
        self
    }

    pub fn engine(mut self, engine: DecisionEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn targets(mut self, targets: Vec<Target>) -> Self {
        self.targets = targets;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the driver
    pub fn build(self) -> Result<FleetDriver, ConfigError> {
        let probe = self.probe.ok_or(ConfigError::MissingComponent("status probe"))?;
        let compute = self
            .compute
            .ok_or(ConfigError::MissingComponent("compute client"))?;

        let metrics = ControllerMetrics::new();
        metrics.set_targets_configured(self.targets.len() as i64);

        Ok(FleetDriver {
            probe,
            compute,
            engine: self.engine,
            targets: self.targets,
            failure_policy: self.failure_policy,
            metrics,
            logger: self
                .logger
                .unwrap_or_else(|| StructuredLogger::new("unscoped")),
        })
    }
}

impl Default for FleetDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}
