//! Research data model
//!
//! Wire names follow the HTTP interface: a hit's URL is `href` and its
//! provider tag is `source`.

use serde::{Deserialize, Serialize};

use crate::UNKNOWN_YEAR;

/// A ranked search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Provider rank, 0-based
    pub index: usize,
    pub title: String,
    /// Provider snippet
    pub body: String,
    #[serde(rename = "href")]
    pub url: String,
    /// Provider tag (tavily, brave, ...)
    #[serde(rename = "source")]
    pub provider: String,
    /// Publication year, when the provider reports a date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
}

impl SearchHit {
    pub fn new(index: usize, title: &str, body: &str, url: &str, provider: &str) -> Self {
        Self {
            index,
            title: title.to_string(),
            body: body.to_string(),
            url: url.to_string(),
            provider: provider.to_string(),
            year: None,
        }
    }

    pub fn with_year(mut self, year: &str) -> Self {
        self.year = Some(year.to_string());
        self
    }

    /// Citation record for this hit
    pub fn to_source(&self) -> Source {
        Source {
            title: self.title.clone(),
            url: self.url.clone(),
            year: self.year.clone().unwrap_or_else(|| UNKNOWN_YEAR.to_string()),
        }
    }
}

/// Readable text extracted from one fetched page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedDoc {
    pub url: String,
    pub title: String,
    /// Extracted text, capped by the scraper
    pub content: String,
    pub status: String,
    /// Whether `content` hit the scraper's cap
    #[serde(default)]
    pub truncated: bool,
}

impl ScrapedDoc {
    pub const SUCCESS: &'static str = "success";

    pub fn success(url: &str, title: &str, content: String, truncated: bool) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            content,
            status: Self::SUCCESS.to_string(),
            truncated,
        }
    }
}

/// A citation entry. Two sources are the same only if every field matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    pub year: String,
}

impl Source {
    pub fn new(title: &str, url: &str, year: &str) -> Self {
        Self {
            title: title.to_string(),
            url: url.to_string(),
            year: year.to_string(),
        }
    }
}

/// Final artifact of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub topic: String,
    #[serde(rename = "research_cycles_completed")]
    pub cycles_completed: u32,
    pub final_summary: String,
    pub final_report: String,
    #[serde(rename = "all_search_results")]
    pub all_hits: Vec<SearchHit>,
}

/// Body returned when a run fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEnvelope {
    pub error: String,
    pub topic: String,
    pub status: String,
}

impl FailureEnvelope {
    pub fn new(topic: &str, error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
            topic: topic.to_string(),
            status: "failed".to_string(),
        }
    }
}

/// Search sub-interface request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_search_results")]
    pub max_results: usize,
}

fn default_search_results() -> usize {
    5
}

/// Search sub-interface response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_wire_names() {
        let hit = SearchHit::new(0, "Rust", "Systems language", "https://rust-lang.org", "tavily");
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["href"], "https://rust-lang.org");
        assert_eq!(json["source"], "tavily");
        assert!(json.get("year").is_none());
    }

    #[test]
    fn test_to_source_defaults_year() {
        let hit = SearchHit::new(0, "Rust", "", "https://rust-lang.org", "tavily");
        assert_eq!(hit.to_source(), Source::new("Rust", "https://rust-lang.org", "N/A"));

        let dated = hit.with_year("2024");
        assert_eq!(dated.to_source().year, "2024");
    }

    #[test]
    fn test_report_wire_names() {
        let report = ResearchReport {
            topic: "rust".into(),
            cycles_completed: 2,
            final_summary: "s".into(),
            final_report: "r".into(),
            all_hits: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["research_cycles_completed"], 2);
        assert!(json["all_search_results"].is_array());
    }

    #[test]
    fn test_failure_envelope() {
        let envelope = FailureEnvelope::new("rust", "model unavailable");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["topic"], "rust");
        assert_eq!(json["error"], "model unavailable");
    }

    #[test]
    fn test_search_request_default_max_results() {
        let req: SearchRequest = serde_json::from_str(r#"{"query":"rust async"}"#).unwrap();
        assert_eq!(req.max_results, 5);
    }
}
