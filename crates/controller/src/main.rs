//! Idle controller - stops empty game-server containers
//!
//! On every trigger this binary asks each configured game server how many
//! players are online and stops the backing container group when the server
//! is empty (or unreachable) and has been up longer than the grace period.

use anyhow::{Context, Result};
use chrono::Utc;
use controller_lib::{
    compute::{ClientCredentials, ContainerGroupClient},
    fleet::FleetDriverBuilder,
    protocol::StatusClient,
    DecisionEngine, StructuredLogger,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod schedule;

const CONTROLLER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting idle-controller");

    // Everything configuration-related fails here, before any network call
    let config = config::ControllerConfig::load()?;
    let targets = config.targets().context("Invalid target configuration")?;
    let trigger = config.trigger()?;
    let engine = DecisionEngine::new(config.min_uptime()).with_uptime_policy(config.uptime_policy()?);
    let failure_policy = config.failure_policy()?;

    let logger = StructuredLogger::new(&config.azure_resource_group);
    logger.log_startup(
        CONTROLLER_VERSION,
        targets.len(),
        config.azure_cron_timer.as_deref(),
    );
    info!(
        min_uptime_secs = engine.min_uptime().as_secs(),
        unparsable_uptime = %engine.uptime_policy(),
        on_compute_error = %failure_policy,
        "Controller configured"
    );

    let credentials = ClientCredentials::new(
        &config.azure_authority_url,
        &config.azure_tenant_id,
        &config.azure_client_id,
        &config.azure_client_secret,
    )?;
    let compute = ContainerGroupClient::new(
        &config.azure_management_url,
        &config.azure_subscription_id,
        &config.azure_resource_group,
    )?;

    let fleet = FleetDriverBuilder::new()
        .probe(Arc::new(StatusClient::new(config.status_timeout())))
        .compute(Arc::new(compute))
        .engine(engine)
        .targets(targets)
        .failure_policy(failure_policy)
        .logger(logger.clone())
        .build()?;

    if let Some(port) = config.metrics_port {
        tokio::spawn(api::serve(port));
    }

    loop {
        // Token failures are already logged by the driver
        let clean = match fleet.run_with(&credentials).await {
            Ok(report) => report.is_clean(),
            Err(_) => false,
        };

        let Some(delay) = trigger.next_delay(Utc::now()) else {
            logger.log_shutdown("single run complete");
            if !clean {
                anyhow::bail!("fleet run finished with failures");
            }
            break;
        };

        info!(next_run_in_secs = delay.as_secs(), "Waiting for next scheduled run");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => {
                logger.log_shutdown("SIGINT received");
                break;
            }
        }
    }

    Ok(())
}
