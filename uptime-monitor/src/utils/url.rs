//! URL helpers.

use std::fmt;

use url::Url;

/// Why a string was rejected as an http(s) URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpUrlError {
    /// Not an absolute URL at all.
    Malformed(url::ParseError),
    /// Absolute, but not `http` or `https`.
    UnsupportedScheme(String),
}

impl fmt::Display for HttpUrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "Invalid URL: {e}"),
            Self::UnsupportedScheme(_) => f.write_str("Only HTTP and HTTPS protocols are supported"),
        }
    }
}

impl std::error::Error for HttpUrlError {}

/// Parse an absolute `http` or `https` URL.
pub fn parse_http_url(raw: &str) -> Result<Url, HttpUrlError> {
    let url = Url::parse(raw.trim()).map_err(HttpUrlError::Malformed)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(HttpUrlError::UnsupportedScheme(other.to_string())),
    }
}

/// Whether `url` points at a Discord webhook endpoint.
pub fn is_discord_webhook(url: &Url) -> bool {
    let host_matches = matches!(
        url.host_str(),
        Some("discord.com" | "discordapp.com" | "ptb.discord.com" | "canary.discord.com")
    );
    host_matches && url.path().starts_with("/api/webhooks/")
}
