//! Site monitoring.
//!
//! The monitor is responsible for:
//! - Probing individual sites and classifying the outcome
//! - Remembering the last known status of every site
//! - Rate limiting alerts per site
//! - Turning status transitions into notifications

mod alerter;
mod checker;
mod rate_limiter;
mod store;

pub use alerter::{AlertDispatcher, AlertOutcome};
pub use checker::{
    CheckResult, CheckerConfig, DEFAULT_PROBE_TIMEOUT, FailureKind, ProbeFailure, SiteChecker,
    SiteStatus,
};
pub use rate_limiter::{Clock, ManualClock, RateLimiter, RateLimiterConfig, SystemClock};
pub use store::StatusStore;
