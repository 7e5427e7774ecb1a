//! Discord webhook notification channel.
//!
//! Follows Discord's rate limit guidance: no hardcoded limits, and a 429
//! is retried after the wait the response asks for.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use super::NotificationChannel;
use crate::Result;
use crate::monitor::SiteStatus;
use crate::notification::events::NotificationEvent;
use crate::utils::http_client::build_notify_client;

/// Attempts per message, the first one included.
const MAX_ATTEMPTS: u32 = 3;

/// Upper bound on a server-requested wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Wait used when a 429 carries no usable hint.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

const COLOR_DOWN: u32 = 0xe74c3c;
const COLOR_UP: u32 = 0x2ecc71;
const COLOR_TEST: u32 = 0x3498db;

/// Discord channel configuration.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub webhook_url: String,
    /// Name shown as the message author.
    pub username: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Discord notification channel.
pub struct DiscordChannel {
    config: DiscordConfig,
    client: Client,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig) -> Self {
        let client = build_notify_client(Duration::from_secs(config.timeout_secs));
        Self { config, client }
    }

    fn build_payload(&self, event: &NotificationEvent) -> serde_json::Value {
        let result = event.result();
        let color = match result.status {
            SiteStatus::Down => COLOR_DOWN,
            SiteStatus::Up => COLOR_UP,
        };

        json!({
            "username": self.config.username,
            "embeds": [{
                "title": event.title(),
                "url": result.url,
                "description": event.description(),
                "color": color,
                "timestamp": event.timestamp().to_rfc3339(),
                "footer": {
                    "text": format!("Priority: {} | Type: {}", event.priority(), event.event_type())
                }
            }]
        })
    }

    /// POST `payload`, retrying 429 responses.
    async fn send_with_retry(&self, payload: &serde_json::Value) -> Result<()> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = self
                .client
                .post(&self.config.webhook_url)
                .json(payload)
                .send()
                .await
                .map_err(|e| crate::Error::notification(format!("Discord request failed: {}", e)))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after = parse_retry_after(response.headers());

                if attempts >= MAX_ATTEMPTS {
                    warn!(
                        attempts,
                        ?retry_after,
                        "Discord rate limit: giving up"
                    );
                    return Err(crate::Error::notification(format!(
                        "Discord rate limit exceeded after {} attempts",
                        attempts
                    )));
                }

                let wait = retry_after.unwrap_or(DEFAULT_RETRY_AFTER);
                debug!(
                    ?wait,
                    attempt = attempts,
                    max_attempts = MAX_ATTEMPTS,
                    "Discord rate limited (429), waiting before retry"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            warn!("Discord webhook failed: {} - {}", status, body);
            return Err(crate::Error::notification(format!(
                "Discord webhook failed: {} - {}",
                status, body
            )));
        }
    }
}

/// Parse the wait hinted by a 429 response, capped at [`MAX_RETRY_AFTER`].
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    // Discord sets Retry-After; X-RateLimit-Reset-After is the fallback.
    ["Retry-After", "X-RateLimit-Reset-After"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok()?.trim().parse::<f64>().ok())
        .find(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .map_or(MAX_RETRY_AFTER, |wait| wait.min(MAX_RETRY_AFTER))
        })
}

#[async_trait]
impl NotificationChannel for DiscordChannel {
    fn channel_type(&self) -> &'static str {
        "discord"
    }

    fn is_enabled(&self) -> bool {
        !self.config.webhook_url.is_empty()
    }

    async fn send(&self, event: &NotificationEvent) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        self.send_with_retry(&self.build_payload(event)).await?;
        debug!("Discord notification sent: {}", event.event_type());
        Ok(())
    }

    async fn test(&self) -> Result<()> {
        let payload = json!({
            "username": self.config.username,
            "embeds": [{
                "title": "Uptime monitor test notification",
                "description": "Alerts for status changes will be posted here.",
                "color": COLOR_TEST,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }]
        });
        self.send_with_retry(&payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::CheckResult;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn channel() -> DiscordChannel {
        DiscordChannel::new(DiscordConfig {
            webhook_url: "https://discord.com/api/webhooks/1/token".to_string(),
            username: "Status Bot".to_string(),
            timeout_secs: 5,
        })
    }

    fn down_event() -> NotificationEvent {
        NotificationEvent::status_changed(
            SiteStatus::Up,
            CheckResult {
                url: "https://example.com".to_string(),
                status: SiteStatus::Down,
                code: Some(502),
                response_time: 310,
                checked_at: chrono::Utc::now(),
                error: Some("HTTP 502".to_string()),
            },
        )
    }

    #[test]
    fn test_build_payload() {
        let payload = channel().build_payload(&down_event());

        let embed = &payload["embeds"][0];
        assert!(embed["title"].as_str().unwrap().contains("https://example.com"));
        assert!(embed["description"].as_str().unwrap().contains("502"));
        assert_eq!(embed["color"], COLOR_DOWN as i64);
        assert_eq!(payload["username"], "Status Bot");
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert("X-RateLimit-Reset-After", HeaderValue::from_static("0.5"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_millis(500)));

        headers.insert("Retry-After", HeaderValue::from_static("2"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_parse_retry_after_is_capped() {
        for value in ["1e30", "3600", "1.8e19"] {
            let mut headers = HeaderMap::new();
            headers.insert("Retry-After", HeaderValue::from_static(value));
            assert_eq!(parse_retry_after(&headers), Some(MAX_RETRY_AFTER), "{value}");
        }
    }

    #[test]
    fn test_parse_retry_after_skips_invalid() {
        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", HeaderValue::from_static("-1"));
        headers.insert("X-RateLimit-Reset-After", HeaderValue::from_static("0.25"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_millis(250)));

        headers.insert("X-RateLimit-Reset-After", HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
    }
}
