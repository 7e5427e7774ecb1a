//! Generic webhook notification channel.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use super::NotificationChannel;
use crate::Result;
use crate::notification::events::NotificationEvent;
use crate::utils::http_client::build_notify_client;

/// Webhook channel configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub bearer_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// POSTs events as JSON to an arbitrary URL.
pub struct WebhookChannel {
    config: WebhookConfig,
    client: Client,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Self {
        let client = build_notify_client(Duration::from_secs(config.timeout_secs));
        Self { config, client }
    }

    fn build_payload(event: &NotificationEvent) -> serde_json::Value {
        json!({
            "event_type": event.event_type(),
            "priority": event.priority(),
            "title": event.title(),
            "description": event.description(),
            "timestamp": event.timestamp().to_rfc3339(),
            "previous_status": event.previous(),
            "result": event.result(),
        })
    }

    async fn post(&self, payload: &serde_json::Value) -> Result<()> {
        let mut request = self.client.post(&self.config.url).json(payload);
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| crate::Error::notification(format!("Webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Webhook failed: {} - {}", status, body);
            return Err(crate::Error::notification(format!(
                "Webhook failed: {} - {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn channel_type(&self) -> &'static str {
        "webhook"
    }

    fn is_enabled(&self) -> bool {
        !self.config.url.is_empty()
    }

    async fn send(&self, event: &NotificationEvent) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        self.post(&Self::build_payload(event)).await?;
        debug!("Webhook notification sent: {}", event.event_type());
        Ok(())
    }

    async fn test(&self) -> Result<()> {
        self.post(&json!({
            "event_type": "test",
            "title": "Uptime monitor test notification",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
        .await
    }
}
