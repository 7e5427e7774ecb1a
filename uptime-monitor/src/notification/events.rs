//! Notification events.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::monitor::{CheckResult, SiteStatus};

/// Priority level for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Normal,
    Critical,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Events that trigger notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NotificationEvent {
    /// A site's status differs from the last one alerted for it.
    StatusChanged {
        previous: SiteStatus,
        result: CheckResult,
    },
}

impl NotificationEvent {
    pub fn status_changed(previous: SiteStatus, result: CheckResult) -> Self {
        Self::StatusChanged { previous, result }
    }

    pub fn result(&self) -> &CheckResult {
        match self {
            Self::StatusChanged { result, .. } => result,
        }
    }

    pub fn previous(&self) -> SiteStatus {
        match self {
            Self::StatusChanged { previous, .. } => *previous,
        }
    }

    /// Critical when a site goes down.
    pub fn priority(&self) -> NotificationPriority {
        match self.result().status {
            SiteStatus::Down => NotificationPriority::Critical,
            SiteStatus::Up => NotificationPriority::Normal,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self.result().status {
            SiteStatus::Down => "site_down",
            SiteStatus::Up => "site_recovered",
        }
    }

    pub fn title(&self) -> String {
        let result = self.result();
        match result.status {
            SiteStatus::Down => format!("🔴 {} is DOWN", result.url),
            SiteStatus::Up => format!("🟢 {} is back UP", result.url),
        }
    }

    pub fn description(&self) -> String {
        let result = self.result();
        let code = result
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "n/a".to_string());

        let mut lines = vec![
            format!("Status: {} → {}", self.previous(), result.status),
            format!("Status code: {}", code),
            format!("Response time: {}ms", result.response_time),
        ];
        if let Some(error) = &result.error {
            lines.push(format!("Error: {}", error));
        }
        lines.join("\n")
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.result().checked_at
    }
}
