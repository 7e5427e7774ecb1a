//! Alert dispatching.
//!
//! Turns check results into notifications. A site alerts when its status
//! differs from the last status it was alerted for, and every alert first
//! has to get a token from the per-site rate limiter, so a flapping site
//! cannot flood the notification channel. A transition that was suppressed
//! or failed to deliver is retried on the next result that still differs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::checker::{CheckResult, SiteStatus};
use super::rate_limiter::RateLimiter;
use super::store::StatusStore;
use crate::Result;
use crate::notification::{NotificationChannel, NotificationEvent};

/// What happened to a result handed to [`AlertDispatcher::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    /// First result seen for the site; nothing to compare against.
    Baseline,
    /// Same status as the last alerted one.
    Unchanged,
    /// Status changed and a notification was sent.
    Sent,
    /// Status changed but the site's alert budget is spent.
    Suppressed { retry_after: Duration },
}

/// Decides which results become notifications.
pub struct AlertDispatcher {
    store: Arc<StatusStore>,
    limiter: Mutex<RateLimiter>,
    /// Status each site was last alerted for (or baselined at).
    alerted: Mutex<HashMap<String, SiteStatus>>,
    channel: Arc<dyn NotificationChannel>,
}

impl AlertDispatcher {
    pub fn new(
        store: Arc<StatusStore>,
        limiter: RateLimiter,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        Self {
            store,
            limiter: Mutex::new(limiter),
            alerted: Mutex::new(HashMap::new()),
            channel,
        }
    }

    pub fn store(&self) -> &Arc<StatusStore> {
        &self.store
    }

    /// Record `result` and alert if the site changed status.
    pub async fn dispatch(&self, result: CheckResult) -> Result<AlertOutcome> {
        let url = result.url.clone();
        let current = result.status;
        self.store.record(result.clone());

        // Locks are released before the channel is awaited.
        let previous = {
            let mut alerted = self.alerted.lock();
            match alerted.get(&url).copied() {
                Some(previous) => previous,
                None => {
                    alerted.insert(url.clone(), current);
                    debug!(url = %url, status = %current, "first result for site");
                    return Ok(AlertOutcome::Baseline);
                }
            }
        };

        if previous == current {
            return Ok(AlertOutcome::Unchanged);
        }

        let denied = {
            let mut limiter = self.limiter.lock();
            if limiter.consume(&url)? {
                None
            } else {
                Some(limiter.time_until_next_token(&url)?)
            }
        };

        if let Some(wait_ms) = denied {
            warn!(
                url = %url,
                from = %previous,
                to = %current,
                retry_after_ms = wait_ms,
                "alert suppressed by rate limit"
            );
            return Ok(AlertOutcome::Suppressed {
                retry_after: Duration::from_millis(wait_ms),
            });
        }

        let event = NotificationEvent::status_changed(previous, result);
        self.channel.send(&event).await?;
        self.alerted.lock().insert(url.clone(), current);

        info!(
            url = %url,
            from = %previous,
            to = %current,
            channel = self.channel.channel_type(),
            "status change alert sent"
        );
        Ok(AlertOutcome::Sent)
    }
}
