use std::time::Duration;

use crate::core::error::{ReportError, ReportResult};

/// Validate that an endpoint URL uses HTTPS before credentials are sent to it.
///
/// Plain HTTP is accepted only for loopback hosts, which is what local fake
/// servers use.
pub fn validate_endpoint(url: &str, what: &str) -> ReportResult<()> {
    if url.starts_with("https://") || is_loopback_http(url) {
        return Ok(());
    }
    Err(ReportError::Configuration(format!(
        "{}: endpoint must use HTTPS, got: {}",
        what, url
    )))
}

fn is_loopback_http(url: &str) -> bool {
    let Some(rest) = url.strip_prefix("http://") else {
        return false;
    };
    let host = rest.split(['/', ':']).next().unwrap_or_default();
    matches!(host, "127.0.0.1" | "localhost")
}

/// HTTP client shared by the token exchange and the report requests.
pub fn build_client(timeout: Duration) -> ReportResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("ga4xl/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ReportError::Configuration(format!("Failed to build HTTP client: {}", e)))
}
