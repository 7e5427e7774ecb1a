//! Notification channels.
//!
//! Alerts go to either a Discord webhook or a generic JSON webhook,
//! depending on the configured target.

mod discord;
mod webhook;

pub use discord::{DiscordChannel, DiscordConfig};
pub use webhook::{WebhookChannel, WebhookConfig};

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use super::events::NotificationEvent;
use crate::Result;
use crate::utils::url::is_discord_webhook;

pub const DEFAULT_USERNAME: &str = "Uptime Monitor";
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Check if the channel is enabled.
    fn is_enabled(&self) -> bool;

    /// Send a notification through this channel.
    async fn send(&self, event: &NotificationEvent) -> Result<()>;

    /// Deliver a test message to verify the channel works.
    async fn test(&self) -> Result<()>;
}

/// Where and how alerts are delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyTarget {
    pub url: Url,
    /// Sent as `Authorization: Bearer ...` to generic webhooks.
    pub bearer_token: Option<String>,
    /// Display name for Discord messages.
    pub username: String,
    pub timeout_secs: u64,
}

impl NotifyTarget {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            bearer_token: None,
            username: DEFAULT_USERNAME.to_string(),
            timeout_secs: DEFAULT_NOTIFY_TIMEOUT_SECS,
        }
    }
}

/// Pick a channel for a notify target.
///
/// Discord webhook URLs get Discord embeds; anything else receives the
/// generic JSON payload.
pub fn channel_for_target(target: &NotifyTarget) -> Arc<dyn NotificationChannel> {
    if is_discord_webhook(&target.url) {
        Arc::new(DiscordChannel::new(DiscordConfig {
            webhook_url: target.url.to_string(),
            username: target.username.clone(),
            timeout_secs: target.timeout_secs,
        }))
    } else {
        Arc::new(WebhookChannel::new(WebhookConfig {
            url: target.url.to_string(),
            bearer_token: target.bearer_token.clone(),
            timeout_secs: target.timeout_secs,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_for_target() {
        let discord = Url::parse("https://discord.com/api/webhooks/123/token").unwrap();
        let generic = Url::parse("https://hooks.example.com/alerts").unwrap();

        let channel = channel_for_target(&NotifyTarget::new(discord));
        assert_eq!(channel.channel_type(), "discord");
        assert!(channel.is_enabled());

        let channel = channel_for_target(&NotifyTarget::new(generic));
        assert_eq!(channel.channel_type(), "webhook");
        assert!(channel.is_enabled());
    }
}
