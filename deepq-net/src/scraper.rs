//! Page scraper
//!
//! Fetches a URL and extracts its readable text. Every failure is logged
//! and reported as `None`; scraping never aborts a research run.

use async_trait::async_trait;
use reqwest::{Client, Response};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};

use deepq_core::{normalize_whitespace, truncate_chars, ScrapedDoc};

use crate::{create_client, is_certificate_error, send_with_retry, HttpConfig, NetError, RetryPolicy};

/// The scrape collaborator seen by the research controller. Never fails.
#[async_trait]
pub trait ScrapeAdapter: Send + Sync {
    async fn scrape(&self, url: &str) -> Option<ScrapedDoc>;
}

/// Scraper configuration
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Pause after every successful fetch
    pub politeness_delay: Duration,
    /// Maximum characters of extracted text
    pub max_content_chars: usize,
    /// Transport retry schedule
    pub retry: RetryPolicy,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            politeness_delay: Duration::from_secs(1),
            max_content_chars: 50_000,
            retry: RetryPolicy::default(),
        }
    }
}

/// Elements whose text never counts as page content
const EXCLUDED_ELEMENTS: &[&str] = &["script", "style", "noscript", "nav", "footer", "header"];

/// HTTP page scraper
pub struct WebScraper {
    config: ScrapeConfig,
    client: Client,
    insecure_client: Client,
}

impl WebScraper {
    pub fn new(config: ScrapeConfig) -> Result<Self, NetError> {
        let http = HttpConfig::default().with_timeout(config.timeout_secs);
        Ok(Self {
            client: create_client(&http)?,
            insecure_client: create_client(&http.insecure())?,
            config,
        })
    }

    /// Fetch with certificate verification, falling back to an unverified
    /// client when the certificate is rejected
    async fn fetch(&self, url: &str) -> Result<Response, NetError> {
        match send_with_retry(self.client.get(url), &self.config.retry).await {
            Err(NetError::Request(e)) if is_certificate_error(&e) => {
                warn!("SSL verification failed for {}, retrying without verification", url);
                send_with_retry(self.insecure_client.get(url), &self.config.retry).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl ScrapeAdapter for WebScraper {
    async fn scrape(&self, url: &str) -> Option<ScrapedDoc> {
        info!("Scraping URL: {}", url);

        let response = match self.fetch(url).await {
            Ok(response) => response,
            Err(NetError::Request(e)) if e.is_timeout() => {
                warn!("Timeout while scraping URL {}", url);
                return None;
            }
            Err(NetError::Request(e)) if e.is_connect() => {
                warn!("Connection error while scraping URL {}: {}", url, e);
                return None;
            }
            Err(e) => {
                warn!("Error scraping URL {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Failed to fetch URL: {}, status code: {}", url, response.status());
            return None;
        }

        let html = match response.text().await {
            Ok(html) => html,
            Err(e) => {
                warn!("Failed to read body of {}: {}", url, e);
                return None;
            }
        };

        if !self.config.politeness_delay.is_zero() {
            tokio::time::sleep(self.config.politeness_delay).await;
        }

        let (title, text) = extract_content(&html);
        let capped = truncate_chars(&text, self.config.max_content_chars);
        let truncated = capped.len() < text.len();

        debug!("Scraped {} chars from {}", capped.len(), url);
        Some(ScrapedDoc::success(
            url,
            &title.unwrap_or_default(),
            capped.to_string(),
            truncated,
        ))
    }
}

/// Extract title and text content from HTML
fn extract_content(html: &str) -> (Option<String>, String) {
    use scraper::node::Node;

    let document = Html::parse_document(html);

    let title_selector = Selector::parse("title").expect("static selector");
    let title = document
        .select(&title_selector)
        .next()
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let body_selector = Selector::parse("body").expect("static selector");
    let body = document.select(&body_selector).next();

    let text = if let Some(body) = body {
        let mut text_parts = Vec::new();

        for node_ref in body.descendants() {
            if let Node::Text(text_node) = node_ref.value() {
                let in_excluded = node_ref.ancestors().any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .map(|el| EXCLUDED_ELEMENTS.contains(&el.name()))
                        .unwrap_or(false)
                });

                if !in_excluded {
                    let trimmed = text_node.trim();
                    if !trimmed.is_empty() {
                        text_parts.push(trimmed.to_string());
                    }
                }
            }
        }

        normalize_whitespace(&text_parts.join(" "))
    } else {
        String::new()
    };

    (title, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_scraper(max_content_chars: usize) -> WebScraper {
        polite_scraper(max_content_chars, Duration::ZERO)
    }

    fn polite_scraper(max_content_chars: usize, politeness_delay: Duration) -> WebScraper {
        WebScraper::new(ScrapeConfig {
            timeout_secs: 5,
            politeness_delay,
            max_content_chars,
            retry: RetryPolicy::immediate(1),
        })
        .unwrap()
    }

    const PAGE: &str = r#"
        <html>
        <head><title>Test   Page</title></head>
        <body>
            <header>Site header</header>
            <nav>Home | About</nav>
            <script>var x = 1;</script>
            <h1>Hello World</h1>
            <p>This is test content.</p>
            <style>.x { color: red; }</style>
            <footer>Copyright</footer>
        </body>
        </html>
    "#;

    #[test]
    fn test_extract_content() {
        let (title, text) = extract_content(PAGE);

        assert_eq!(title, Some("Test Page".to_string()));
        assert_eq!(text, "Hello World This is test content.");
    }

    #[test]
    fn test_extract_without_title() {
        let (title, text) = extract_content("<html><body><p>Only text</p></body></html>");
        assert_eq!(title, None);
        assert_eq!(text, "Only text");
    }

    #[tokio::test]
    async fn test_scrape_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let url = format!("{}/article", server.uri());
        let doc = test_scraper(50_000).scrape(&url).await.unwrap();

        assert_eq!(doc.url, url);
        assert_eq!(doc.title, "Test Page");
        assert_eq!(doc.status, "success");
        assert!(doc.content.contains("Hello World"));
        assert!(!doc.truncated);
    }

    #[tokio::test]
    async fn test_scrape_caps_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let doc = test_scraper(5).scrape(&server.uri()).await.unwrap();
        assert_eq!(doc.content, "Hello");
        assert!(doc.truncated);
    }

    #[tokio::test]
    async fn test_scrape_non_success_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(test_scraper(50_000).scrape(&server.uri()).await.is_none());
    }

    #[tokio::test]
    async fn test_scrape_retries_server_errors_then_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(2)
            .mount(&server)
            .await;

        assert!(test_scraper(50_000).scrape(&server.uri()).await.is_none());
    }

    #[tokio::test]
    async fn test_scrape_falls_back_on_untrusted_certificate() {
        let url = crate::tls_fixture::spawn_https(PAGE);

        let doc = test_scraper(50_000).scrape(&url).await.unwrap();

        assert_eq!(doc.title, "Test Page");
        assert!(doc.content.contains("Hello World"));
    }

    #[tokio::test]
    async fn test_politeness_delay_after_each_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;
        let delay = Duration::from_millis(50);
        let scraper = polite_scraper(50_000, delay);

        let started = Instant::now();
        assert!(scraper.scrape(&server.uri()).await.is_some());
        assert!(scraper.scrape(&server.uri()).await.is_some());

        assert!(started.elapsed() >= delay * 2);
    }

    #[tokio::test]
    async fn test_no_politeness_delay_after_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let scraper = polite_scraper(50_000, Duration::from_secs(5));

        let started = Instant::now();
        assert!(scraper.scrape(&server.uri()).await.is_none());

        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_scrape_unreachable_is_none() {
        // Port 9 (discard) is closed on test hosts
        assert!(test_scraper(50_000).scrape("http://127.0.0.1:9/").await.is_none());
    }
}
