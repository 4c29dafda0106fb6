//! Controller configuration
//!
//! Read from the process environment (optionally seeded from `.env`). Target
//! hostnames, ports and container groups are parallel `;`-separated lists.

use anyhow::{anyhow, Context, Result};
use controller_lib::compute::{DEFAULT_AUTHORITY_URL, DEFAULT_MANAGEMENT_URL};
use controller_lib::targets::parse_targets;
use controller_lib::{ConfigError, FailurePolicy, Target, UptimePolicy};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use crate::schedule::Trigger;

/// Controller configuration
#[derive(Clone, Deserialize)]
pub struct ControllerConfig {
    /// Game-server hostnames
    pub minecraft_url: String,
    /// Game-server ports, aligned with `minecraft_url`
    pub minecraft_port: String,
    /// Container-group names, aligned with `minecraft_url`
    pub azure_container_groups: String,

    /// Six-field cron expression; absent means run once and exit
    #[serde(default)]
    pub azure_cron_timer: Option<String>,

    pub azure_tenant_id: String,
    pub azure_client_id: String,
    pub azure_client_secret: String,
    pub azure_subscription_id: String,
    pub azure_resource_group: String,

    /// Minimum uptime before an empty instance may be stopped
    #[serde(default = "default_min_uptime_ms")]
    pub min_uptime_ms: u64,

    /// Status-ping timeout
    #[serde(default = "default_status_timeout_ms")]
    pub status_timeout_ms: u64,

    /// `stop` or `keep` when the instance uptime cannot be computed
    #[serde(default = "default_unparsable_uptime")]
    pub unparsable_uptime: String,

    /// `continue` or `abort` after a control-plane failure
    #[serde(default = "default_on_compute_error")]
    pub on_compute_error: String,

    #[serde(default = "default_management_url")]
    pub azure_management_url: String,

    #[serde(default = "default_authority_url")]
    pub azure_authority_url: String,

    /// Serve /metrics and /healthz on this port when set
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_min_uptime_ms() -> u64 {
    10 * 60 * 1000
}

fn default_status_timeout_ms() -> u64 {
    10_000
}

fn default_unparsable_uptime() -> String {
    "stop".to_string()
}

fn default_on_compute_error() -> String {
    "continue".to_string()
}

fn default_management_url() -> String {
    DEFAULT_MANAGEMENT_URL.to_string()
}

fn default_authority_url() -> String {
    DEFAULT_AUTHORITY_URL.to_string()
}

impl ControllerConfig {
    /// Load configuration from `.env` (if present) and the environment
    pub fn load() -> Result<Self> {
        // A missing .env file is the normal case outside local development
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        Self::from_config(config)
    }

    /// Deserialize from an already built configuration
    pub fn from_config(config: config::Config) -> Result<Self> {
        config
            .try_deserialize()
            .context("Incomplete controller configuration")
    }

    /// Targets zipped from the three lists
    pub fn targets(&self) -> Result<Vec<Target>, ConfigError> {
        parse_targets(
            &self.minecraft_url,
            &self.minecraft_port,
            &self.azure_container_groups,
        )
    }

    pub fn min_uptime(&self) -> Duration {
        Duration::from_millis(self.min_uptime_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn uptime_policy(&self) -> Result<UptimePolicy> {
        self.unparsable_uptime.parse().map_err(|e: String| anyhow!(e))
    }

    pub fn failure_policy(&self) -> Result<FailurePolicy> {
        self.on_compute_error.parse().map_err(|e: String| anyhow!(e))
    }

    pub fn trigger(&self) -> Result<Trigger, ConfigError> {
        Trigger::parse(self.azure_cron_timer.as_deref())
    }
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("minecraft_url", &self.minecraft_url)
            .field("minecraft_port", &self.minecraft_port)
            .field("azure_container_groups", &self.azure_container_groups)
            .field("azure_cron_timer", &self.azure_cron_timer)
            .field("azure_tenant_id", &self.azure_tenant_id)
            .field("azure_client_id", &self.azure_client_id)
            .field("azure_subscription_id", &self.azure_subscription_id)
            .field("azure_resource_group", &self.azure_resource_group)
            .field("min_uptime_ms", &self.min_uptime_ms)
            .field("status_timeout_ms", &self.status_timeout_ms)
            .field("unparsable_uptime", &self.unparsable_uptime)
            .field("on_compute_error", &self.on_compute_error)
            .field("metrics_port", &self.metrics_port)
            .finish_non_exhaustive()
    }
}
