//! Environment-derived monitor configuration.
//!
//! Everything is validated once at start-up. A single bad variable fails
//! the whole load with a message naming that variable. Only the site list
//! and the notify target are required.

use std::collections::BTreeSet;
use std::str::FromStr;

use crate::monitor::RateLimiterConfig;
use crate::notification::NotifyTarget;
use crate::notification::channels::{DEFAULT_NOTIFY_TIMEOUT_SECS, DEFAULT_USERNAME};
use crate::utils::url::parse_http_url;
use crate::{Error, Result};

pub const ENV_SITES: &str = "SITES";
pub const ENV_CRON: &str = "CHECK_INTERVAL_CRON";
pub const ENV_ALERT_BURST: &str = "ALERT_BURST";
pub const ENV_ALERT_WINDOW: &str = "ALERT_WINDOW_SEC";
pub const ENV_NOTIFY_TARGET: &str = "DISCORD_WEBHOOK";
pub const ENV_NOTIFY_BEARER_TOKEN: &str = "NOTIFY_BEARER_TOKEN";
pub const ENV_NOTIFY_USERNAME: &str = "NOTIFY_USERNAME";
pub const ENV_NOTIFY_TIMEOUT: &str = "NOTIFY_TIMEOUT_SEC";
pub const ENV_NOTIFY_TEST_ON_START: &str = "NOTIFY_TEST_ON_START";

pub const DEFAULT_CRON: &str = "*/1 * * * *";
pub const DEFAULT_ALERT_BURST: u32 = 3;
pub const DEFAULT_ALERT_WINDOW_SECS: u64 = 300;

/// Validated monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Sites to probe, in configured order, as written.
    pub sites: Vec<String>,
    /// 5-field cron expression driving the checks.
    pub cron: String,
    /// Alerts allowed per site in a burst.
    pub alert_burst: u32,
    /// Seconds for a site's alert budget to refill completely.
    pub alert_window_secs: u64,
    /// Where and how alerts are delivered.
    pub notify: NotifyTarget,
    /// Send a test notification before the first batch.
    pub notify_test_on_start: bool,
}

impl MonitorConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let sites = parse_sites(get(ENV_SITES))?;

        let cron = get(ENV_CRON).unwrap_or_else(|| DEFAULT_CRON.to_string());
        parse_cron_expression(&cron)?;

        let alert_burst = match get(ENV_ALERT_BURST) {
            Some(raw) => parse_positive::<u32>(ENV_ALERT_BURST, &raw)?,
            None => DEFAULT_ALERT_BURST,
        };
        let alert_window_secs = match get(ENV_ALERT_WINDOW) {
            Some(raw) => parse_positive::<u64>(ENV_ALERT_WINDOW, &raw)?,
            None => DEFAULT_ALERT_WINDOW_SECS,
        };

        let notify_url = match get(ENV_NOTIFY_TARGET) {
            Some(raw) => parse_http_url(&raw).map_err(|e| {
                Error::config(format!("{ENV_NOTIFY_TARGET} must be a valid http(s) URL: {e}"))
            })?,
            None => {
                return Err(Error::config(format!(
                    "{ENV_NOTIFY_TARGET} environment variable is required"
                )));
            }
        };

        let mut notify = NotifyTarget::new(notify_url);
        notify.bearer_token = get(ENV_NOTIFY_BEARER_TOKEN).map(|t| t.trim().to_string());
        notify.username = get(ENV_NOTIFY_USERNAME)
            .map(|u| u.trim().to_string())
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string());
        notify.timeout_secs = match get(ENV_NOTIFY_TIMEOUT) {
            Some(raw) => parse_positive::<u64>(ENV_NOTIFY_TIMEOUT, &raw)?,
            None => DEFAULT_NOTIFY_TIMEOUT_SECS,
        };

        let notify_test_on_start = match get(ENV_NOTIFY_TEST_ON_START) {
            Some(raw) => parse_flag(ENV_NOTIFY_TEST_ON_START, &raw)?,
            None => false,
        };

        Ok(Self {
            sites,
            cron,
            alert_burst,
            alert_window_secs,
            notify,
            notify_test_on_start,
        })
    }

    /// Parsed schedule for [`Self::cron`].
    pub fn schedule(&self) -> Result<cron::Schedule> {
        parse_cron_expression(&self.cron)
    }

    /// Rate limiter settings for alerting.
    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig::new(self.alert_burst as f64, self.alert_window_secs as f64)
    }
}

fn parse_sites(raw: Option<String>) -> Result<Vec<String>> {
    let raw = raw.ok_or_else(|| {
        Error::config(format!("{ENV_SITES} environment variable is required"))
    })?;

    let entries: Vec<String> = serde_json::from_str(&raw).map_err(|e| {
        Error::config(format!("{ENV_SITES} must be a JSON array of URL strings: {e}"))
    })?;

    if entries.is_empty() {
        return Err(Error::config(format!(
            "{ENV_SITES} must contain at least one URL"
        )));
    }

    entries
        .into_iter()
        .map(|entry| {
            let entry = entry.trim().to_string();
            parse_http_url(&entry).map_err(|e| {
                Error::config(format!("{ENV_SITES} contains an invalid URL '{entry}': {e}"))
            })?;
            Ok(entry)
        })
        .collect()
}

fn parse_positive<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr + PartialOrd + Default,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(Error::config(format!(
            "{name} must be a positive integer, got '{raw}'"
        ))),
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!(
            "{name} must be true or false, got '{raw}'"
        ))),
    }
}

/// Parse a standard 5-field cron expression.
///
/// The `cron` crate expects a leading seconds field and numbers weekdays
/// 1-7 from Sunday, so the expression is pinned to second zero and its
/// day-of-week field renumbered before parsing.
pub fn parse_cron_expression(expr: &str) -> Result<cron::Schedule> {
    let mut fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(Error::config(format!(
            "{ENV_CRON} must be a 5-field cron expression, got '{expr}' ({} fields)",
            fields.len()
        )));
    }

    let day_of_week = normalize_day_of_week(fields[4]).ok_or_else(|| {
        Error::config(format!(
            "{ENV_CRON} has an invalid day-of-week field '{}' in '{expr}'",
            fields[4]
        ))
    })?;
    fields[4] = &day_of_week;

    cron::Schedule::from_str(&format!("0 {}", fields.join(" "))).map_err(|e| {
        Error::config(format!("{ENV_CRON} is not a valid cron expression '{expr}': {e}"))
    })
}

/// Renumber a day-of-week field from Sunday = 0 (or 7) to Sunday = 1.
///
/// Numeric items, ranges and steps are expanded to an explicit day list.
/// Named items (`MON-FRI`) mean the same thing to both and pass through.
fn normalize_day_of_week(field: &str) -> Option<String> {
    if field == "*" || field == "?" {
        return Some(field.to_string());
    }

    let mut days = BTreeSet::new();
    let mut named = Vec::new();

    for item in field.split(',') {
        if item.chars().any(|c| c.is_ascii_alphabetic()) {
            named.push(item.to_string());
            continue;
        }

        let (base, step) = match item.split_once('/') {
            Some((base, step)) => (base, Some(step.parse::<usize>().ok()?)),
            None => (item, None),
        };
        let (start, end) = match (base, base.split_once('-')) {
            ("*", _) => (0, 6),
            (_, Some((from, to))) => (parse_weekday(from)?, parse_weekday(to)?),
            (_, None) => {
                let day = parse_weekday(base)?;
                (day, if step.is_some() { 6.max(day) } else { day })
            }
        };
        if start > end || step == Some(0) {
            return None;
        }

        for day in (start..=end).step_by(step.unwrap_or(1)) {
            days.insert(day % 7 + 1);
        }
    }

    let mut items: Vec<String> = days.iter().map(u8::to_string).collect();
    items.extend(named);
    Some(items.join(","))
}

fn parse_weekday(raw: &str) -> Option<u8> {
    raw.parse::<u8>().ok().filter(|day| *day <= 7)
}
