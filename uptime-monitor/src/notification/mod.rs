//! Alert delivery.
//!
//! Status transitions become [`NotificationEvent`]s and are delivered
//! through a [`NotificationChannel`].

pub mod channels;
mod events;

pub use channels::{
    DiscordChannel, DiscordConfig, NotificationChannel, NotifyTarget, WebhookChannel,
    WebhookConfig, channel_for_target,
};
pub use events::{NotificationEvent, NotificationPriority};
