use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA};
use tracing::debug;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate may have installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Default user agent sent with every request.
pub fn default_user_agent() -> String {
    format!("uptime-monitor/{}", env!("CARGO_PKG_VERSION"))
}

/// Build the client used for reachability probes.
///
/// Redirects are never followed and caching is disabled, so the status of
/// the first response is what gets reported. No client-level timeout is
/// set; callers bound each request themselves.
pub fn build_probe_client(user_agent: &str) -> reqwest::Result<reqwest::Client> {
    install_rustls_provider();

    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

    reqwest::Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

/// Build a client for notification delivery.
pub fn build_notify_client(timeout: Duration) -> reqwest::Client {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder().user_agent(default_user_agent());
    if timeout > Duration::ZERO {
        builder = builder.timeout(timeout);
    }

    builder.build().unwrap_or_else(|error| {
        debug!(error = %error, "Failed to build notification client; using reqwest defaults");
        reqwest::Client::new()
    })
}
