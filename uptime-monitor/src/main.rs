use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use uptime_monitor::api::{AppState, HealthServer, HealthServerConfig};
use uptime_monitor::config::MonitorConfig;
use uptime_monitor::logging::{LogFormat, init_logging};
use uptime_monitor::monitor::{AlertDispatcher, RateLimiter, SiteChecker, StatusStore};
use uptime_monitor::notification::channel_for_target;
use uptime_monitor::scheduler::CheckScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging; the guard flushes pending lines on exit
    let _log_guard = init_logging(LogFormat::from_env())?;

    let config = match MonitorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e).context("failed to load configuration");
        }
    };

    info!(
        sites = config.sites.len(),
        cron = %config.cron,
        alert_burst = config.alert_burst,
        alert_window_secs = config.alert_window_secs,
        "Starting uptime monitor v{}",
        env!("CARGO_PKG_VERSION")
    );

    let checker = Arc::new(SiteChecker::new()?);
    let limiter = RateLimiter::new(config.rate_limiter_config())?;
    let store = Arc::new(StatusStore::new());
    let channel = channel_for_target(&config.notify);
    info!(channel = channel.channel_type(), "Alert channel configured");
    if config.notify_test_on_start {
        match channel.test().await {
            Ok(()) => info!("Test notification delivered"),
            Err(e) => warn!(error = %e, "Test notification failed"),
        }
    }

    let dispatcher = Arc::new(AlertDispatcher::new(store.clone(), limiter, channel));
    let scheduler = CheckScheduler::new(
        config.sites.clone(),
        config.schedule()?,
        checker,
        dispatcher,
    );

    let cancel_token = CancellationToken::new();

    let health_server = HealthServer::new(
        HealthServerConfig::from_env_or_default(),
        AppState::new(store, config.sites.len()),
    )
    .with_cancel_token(cancel_token.child_token());
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            error!(error = %e, "Health server failed");
        }
    });

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Received Ctrl+C, shutting down");
        shutdown_token.cancel();
    });

    scheduler.run(cancel_token.clone()).await;

    cancel_token.cancel();
    if let Err(e) = health_handle.await {
        error!(error = %e, "Health server task panicked");
    }

    info!("Uptime monitor stopped");
    Ok(())
}
