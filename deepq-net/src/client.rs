//! HTTP client construction
//!
//! Builds reqwest clients that look like a regular browser to the sites
//! being scraped.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, UPGRADE_INSECURE_REQUESTS};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Skip TLS certificate verification
    pub accept_invalid_certs: bool,
    /// Send browser-like Accept headers
    pub browser_headers: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            accept_invalid_certs: false,
            browser_headers: true,
        }
    }
}

impl HttpConfig {
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn insecure(mut self) -> Self {
        self.accept_invalid_certs = true;
        self
    }

    /// Plain API client (JSON endpoints)
    pub fn api() -> Self {
        Self {
            timeout_secs: 30,
            accept_invalid_certs: false,
            browser_headers: false,
        }
    }
}

/// Errors from the network layer
#[derive(Debug, Error)]
pub enum NetError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected status {0}")]
    Status(StatusCode),

    #[error("Max retries ({0}) exceeded, last status {1}")]
    MaxRetries(u32, StatusCode),
}

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:137.0) Gecko/20100101 Firefox/137.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.7; rv:137.0) Gecko/20100101 Firefox/137.0",
];

/// Get a random user agent
pub fn random_user_agent() -> &'static str {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers
}

/// Create an HTTP client
pub fn create_client(config: &HttpConfig) -> Result<Client, NetError> {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(random_user_agent());

    if config.browser_headers {
        builder = builder.default_headers(browser_headers());
    }
    if config.accept_invalid_certs {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|e| NetError::ClientBuild(e.to_string()))
}

/// Whether a request failed during TLS certificate verification
pub fn is_certificate_error(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        let msg = e.to_string().to_lowercase();
        if msg.contains("certificate") || msg.contains("unknownissuer") || msg.contains("self signed") {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout_secs, 15);
        assert!(!config.accept_invalid_certs);
        assert!(config.insecure().accept_invalid_certs);
    }

    #[test]
    fn test_random_user_agent() {
        let ua = random_user_agent();
        assert!(ua.contains("Mozilla"));
    }

    #[tokio::test]
    async fn test_certificate_error_detection() {
        let client = create_client(&HttpConfig::default()).unwrap();

        let untrusted = client.get(crate::tls_fixture::spawn_https("ok")).send().await.unwrap_err();
        assert!(is_certificate_error(&untrusted));

        let refused = client.get("http://127.0.0.1:9/").send().await.unwrap_err();
        assert!(refused.is_connect());
        assert!(!is_certificate_error(&refused));
    }

    #[tokio::test]
    async fn test_insecure_client_accepts_self_signed() {
        let client = create_client(&HttpConfig::default().insecure()).unwrap();
        let response = client.get(crate::tls_fixture::spawn_https("ok")).send().await.unwrap();
        assert!(response.status().is_success());
        assert_eq!(response.text().await.unwrap(), "ok");
    }

    #[test]
    fn test_create_clients() {
        assert!(create_client(&HttpConfig::default()).is_ok());
        assert!(create_client(&HttpConfig::default().insecure()).is_ok());
        assert!(create_client(&HttpConfig::api()).is_ok());
    }
}
