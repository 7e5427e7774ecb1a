//! Logging setup.
//!
//! Logs go to stdout through a non-blocking writer, with local timezone
//! timestamps. `RUST_LOG` controls the filter and `LOG_FORMAT` picks
//! between human-readable and JSON lines.

use std::str::FromStr;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "uptime_monitor=info,tower_http=info";

pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

/// Timestamps in the server's local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Read from `LOG_FORMAT`, falling back to pretty output.
    pub fn from_env() -> Self {
        std::env::var(ENV_LOG_FORMAT)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for LogFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" | "" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(crate::Error::config(format!(
                "{ENV_LOG_FORMAT} must be 'pretty' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes buffered lines on drop and must be held for
/// the life of the process.
pub fn init_logging(format: LogFormat) -> crate::Result<WorkerGuard> {
    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(filter);

    let init = match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(true)
                    .with_timer(LocalTimer),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_timer(LocalTimer),
            )
            .try_init(),
    };

    init.map_err(|e| {
        crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
    })?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(DEFAULT_LOG_FILTER.contains("uptime_monitor=info"));
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_local_timer_format() {
        let mut buf = String::new();
        LocalTimer.format_time(&mut Writer::new(&mut buf)).unwrap();
        // 2026-03-01T12:30:15.123+01:00
        assert_eq!(buf.len(), 29, "{buf}");
        assert_eq!(&buf[10..11], "T");
    }
}
