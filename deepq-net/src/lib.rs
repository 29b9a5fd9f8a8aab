//! DeepQ Network Layer
//!
//! Provides the open-web collaborators of a research run:
//! - HTTP client construction with browser-like headers
//! - Bounded retry with exponential backoff for transient failures
//! - Search providers (Tavily, Brave) behind a never-failing adapter
//! - Page scraping with TLS fallback and politeness throttling

pub mod client;
pub mod retry;
pub mod search;
pub mod scraper;

#[cfg(test)]
mod tls_fixture;

pub use client::*;
pub use retry::*;
pub use search::*;
pub use scraper::*;
