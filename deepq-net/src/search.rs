//! Web search providers
//!
//! A [`SearchProvider`] talks to one search API and may fail. The
//! [`WebSearcher`] adapter in front of it normalizes the query and turns
//! every provider failure into an empty result list, so a bad search only
//! makes its cycle unproductive.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use deepq_core::{clean_query, SearchHit, SearchProviderKind};

use crate::{create_client, send_with_retry, HttpConfig, NetError, RetryPolicy};

/// Errors from search providers
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Net(#[from] NetError),

    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to parse {0} response: {1}")]
    Parse(&'static str, String),

    #[error("Missing API key for {0}")]
    MissingKey(&'static str),
}

/// A web search API
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider tag stamped on hits
    fn name(&self) -> &'static str;

    /// Run a query, returning hits in provider rank order
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// The search collaborator seen by the research controller. Never fails.
#[async_trait]
pub trait SearchAdapter: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchHit>;
}

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid year regex"));

/// First plausible year in a provider date string
pub fn year_from_date(date: &str) -> Option<String> {
    YEAR.find(date).map(|m| m.as_str().to_string())
}

/// Tavily search API (https://tavily.com)
pub struct TavilyProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    retry: RetryPolicy,
}

impl TavilyProvider {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.tavily.com";

    pub fn new(api_key: &str) -> Result<Self, SearchError> {
        Self::with_endpoint(api_key, Self::DEFAULT_ENDPOINT, RetryPolicy::default())
    }

    pub fn with_endpoint(api_key: &str, endpoint: &str, retry: RetryPolicy) -> Result<Self, SearchError> {
        if api_key.trim().is_empty() {
            return Err(SearchError::MissingKey("tavily"));
        }
        Ok(Self {
            client: create_client(&HttpConfig::api())?,
            api_key: api_key.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            retry,
        })
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
        });

        let request = self
            .client
            .post(format!("{}/search", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&body);

        let response = send_with_retry(request, &self.retry).await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status { provider: "tavily", status, body });
        }

        let data: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse("tavily", e.to_string()))?;

        Ok(data
            .results
            .into_iter()
            .enumerate()
            .map(|(i, r)| SearchHit {
                index: i,
                title: r.title,
                body: r.content,
                url: r.url,
                provider: self.name().to_string(),
                year: r.published_date.as_deref().and_then(year_from_date),
            })
            .collect())
    }
}

/// Brave Search API (https://brave.com/search/api)
pub struct BraveProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    retry: RetryPolicy,
}

impl BraveProvider {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.search.brave.com/res/v1";

    pub fn new(api_key: &str) -> Result<Self, SearchError> {
        Self::with_endpoint(api_key, Self::DEFAULT_ENDPOINT, RetryPolicy::default())
    }

    pub fn with_endpoint(api_key: &str, endpoint: &str, retry: RetryPolicy) -> Result<Self, SearchError> {
        if api_key.trim().is_empty() {
            return Err(SearchError::MissingKey("brave"));
        }
        Ok(Self {
            client: create_client(&HttpConfig::api())?,
            api_key: api_key.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            retry,
        })
    }
}

#[async_trait]
impl SearchProvider for BraveProvider {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        // Brave caps `count` at 20
        let url = format!(
            "{}/web/search?q={}&count={}",
            self.endpoint,
            urlencoding::encode(query),
            max_results.min(20)
        );

        let request = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key);

        let response = send_with_retry(request, &self.retry).await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status { provider: "brave", status, body });
        }

        let data: BraveSearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse("brave", e.to_string()))?;

        Ok(data
            .web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, r)| SearchHit {
                index: i,
                title: r.title,
                body: r.description,
                url: r.url,
                provider: self.name().to_string(),
                year: r.page_age.as_deref().and_then(year_from_date),
            })
            .collect())
    }
}

/// Build the provider selected in the research config
pub fn create_provider(kind: SearchProviderKind, api_key: &str) -> Result<Box<dyn SearchProvider>, SearchError> {
    Ok(match kind {
        SearchProviderKind::Tavily => Box::new(TavilyProvider::new(api_key)?),
        SearchProviderKind::Brave => Box::new(BraveProvider::new(api_key)?),
    })
}

/// Search adapter that never fails
pub struct WebSearcher {
    provider: Box<dyn SearchProvider>,
}

impl WebSearcher {
    pub fn new(provider: Box<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl SearchAdapter for WebSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchHit> {
        let cleaned = clean_query(query);
        debug!("Original query: {}", query);
        info!("Searching {} for: {}", self.provider.name(), cleaned);

        match self.provider.search(&cleaned, max_results).await {
            Ok(mut hits) => {
                hits.truncate(max_results);
                for (i, hit) in hits.iter_mut().enumerate() {
                    hit.index = i;
                }
                info!("Found {} results", hits.len());
                hits
            }
            Err(e) => {
                warn!("Error during web search: {}", e);
                Vec::new()
            }
        }
    }
}

// Tavily API response types
#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    published_date: Option<String>,
}

// Brave Search API response types
#[derive(Debug, Deserialize)]
struct BraveSearchResponse {
    #[serde(default)]
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    #[serde(default)]
    results: Vec<BraveWebResult>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    page_age: Option<String>,
}
