//! Clinical Triage Failover - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Provider credentials usually live in .env
    dotenv::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging(&config.logging)?;

    info!("=== Clinical Triage Failover v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        threshold = config.failover.failure_threshold,
        cooldown_secs = config.failover.cooldown_secs,
        call_timeout_ms = config.failover.call_timeout_ms,
        "Failover settings"
    );

    run_server(config).await?;

    Ok(())
}
