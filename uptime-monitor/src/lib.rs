//! Website uptime monitor.
//!
//! Probes a list of sites on a cron schedule, keeps the last known status
//! of each and sends a rate-limited alert whenever a site goes down or
//! recovers.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod scheduler;
pub mod utils;

pub use error::{Error, Result};
