//! Cron-driven check scheduling.
//!
//! Every tick probes all configured sites concurrently, then hands the
//! results to the alert dispatcher, also concurrently. One failing site or
//! one failed alert never stops the rest of the batch.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::monitor::{AlertDispatcher, AlertOutcome, CheckResult, SiteChecker};

/// Delay from `now` until the next tick of `schedule`.
pub fn next_delay(schedule: &cron::Schedule, now: DateTime<Utc>) -> Option<Duration> {
    let next = schedule.after(&now).next()?;
    Some((next - now).to_std().unwrap_or(Duration::ZERO))
}

/// Runs batches of checks on a cron schedule.
pub struct CheckScheduler {
    sites: Vec<String>,
    schedule: cron::Schedule,
    checker: Arc<SiteChecker>,
    dispatcher: Arc<AlertDispatcher>,
}

impl CheckScheduler {
    pub fn new(
        sites: Vec<String>,
        schedule: cron::Schedule,
        checker: Arc<SiteChecker>,
        dispatcher: Arc<AlertDispatcher>,
    ) -> Self {
        Self {
            sites,
            schedule,
            checker,
            dispatcher,
        }
    }

    pub fn sites(&self) -> &[String] {
        &self.sites
    }

    /// Probe every site once and dispatch the results.
    ///
    /// Results are returned in the configured site order.
    pub async fn run_once(&self) -> Vec<CheckResult> {
        let checks = self.sites.iter().map(|site| self.checker.check_site(site));
        let results = join_all(checks).await;

        let up = results.iter().filter(|r| r.status.is_up()).count();
        info!(
            total = results.len(),
            up,
            down = results.len() - up,
            "check batch finished"
        );

        // Deliveries for different sites run concurrently.
        let dispatches = results.iter().map(|result| async move {
            match self.dispatcher.dispatch(result.clone()).await {
                Ok(AlertOutcome::Suppressed { retry_after }) => {
                    debug!(url = %result.url, ?retry_after, "alert deferred");
                }
                Ok(_) => {}
                Err(e) => {
                    error!(url = %result.url, error = %e, "failed to dispatch alert");
                }
            }
        });
        join_all(dispatches).await;

        results
    }

    /// Run batches on the schedule until `cancel_token` fires.
    pub async fn run(&self, cancel_token: CancellationToken) {
        info!(sites = self.sites.len(), "check scheduler started");

        loop {
            let Some(delay) = next_delay(&self.schedule, Utc::now()) else {
                warn!("cron schedule has no upcoming ticks; stopping scheduler");
                break;
            };
            debug!(?delay, "waiting for next check batch");

            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("check scheduler shutting down");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    self.run_once().await;
                }
            }
        }

        info!("check scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_cron_expression;
    use chrono::TimeZone;

    #[test]
    fn test_next_delay_every_minute() {
        let schedule = parse_cron_expression("*/1 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 15).unwrap();

        assert_eq!(next_delay(&schedule, now), Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_next_delay_on_boundary_waits_full_period() {
        let schedule = parse_cron_expression("*/5 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();

        assert_eq!(next_delay(&schedule, now), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_next_delay_daily() {
        let schedule = parse_cron_expression("0 9 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();

        assert_eq!(
            next_delay(&schedule, now),
            Some(Duration::from_secs(23 * 3600))
        );
    }
}
