//! Research run configuration
//!
//! A `ResearchConfig` is built once per run and never mutated afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{MAX_CYCLES, MIN_CYCLES};

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Topic must not be empty")]
    EmptyTopic,

    #[error("Research cycles must be between {min} and {max}, got {got}")]
    CyclesOutOfRange { min: u32, max: u32, got: u32 },

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}

/// Which LLM API the model identifier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvider {
    #[default]
    OpenAI,
    OpenRouter,
    Anthropic,
}

/// Which web search API executes queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchProviderKind {
    #[default]
    Tavily,
    Brave,
}

impl SearchProviderKind {
    /// Provider tag stamped on every hit
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchProviderKind::Tavily => "tavily",
            SearchProviderKind::Brave => "brave",
        }
    }
}

/// Character budgets that keep model prompts bounded across cycles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBudget {
    /// Prior summary as quoted inside a prompt
    pub summary_chars: usize,
    /// Body of a single search hit
    pub hit_body_chars: usize,
    /// Snippet of a single scraped document
    pub scraped_snippet_chars: usize,
    /// The whole findings block of a summarization prompt
    pub findings_chars: usize,
    /// Summary retained between cycles
    pub stored_summary_chars: usize,
}

impl Default for PromptBudget {
    fn default() -> Self {
        Self {
            summary_chars: 12_000,
            hit_body_chars: 1_000,
            scraped_snippet_chars: 500,
            findings_chars: 24_000,
            stored_summary_chars: 16_000,
        }
    }
}

/// Configuration for one research run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Research topic
    pub topic: String,
    /// Outer iterations to attempt (1-5)
    pub max_cycles: u32,
    /// Hits kept from each search
    pub max_results_per_query: usize,
    /// Hits whose URL gets scraped each cycle
    pub max_urls_per_cycle: usize,
    /// Model identifier (e.g. gpt-4o)
    pub model_id: String,
    /// LLM API family
    pub model_provider: ModelProvider,
    /// LLM API key
    #[serde(skip_serializing)]
    pub model_api_key: Option<String>,
    /// Search API family
    pub search_provider: SearchProviderKind,
    /// Search API key
    #[serde(skip_serializing)]
    pub search_api_key: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token limit per model call
    pub max_tokens: u16,
    /// Prompt size budgets
    #[serde(default)]
    pub budget: PromptBudget,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            topic: String::new(),
            max_cycles: 3,
            max_results_per_query: 10,
            max_urls_per_cycle: 5,
            model_id: "gpt-4o".to_string(),
            model_provider: ModelProvider::OpenAI,
            model_api_key: None,
            search_provider: SearchProviderKind::Tavily,
            search_api_key: None,
            temperature: 0.1,
            max_tokens: 4096,
            budget: PromptBudget::default(),
        }
    }
}

impl ResearchConfig {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            ..Default::default()
        }
    }

    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.max_cycles = cycles;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results_per_query = max_results;
        self
    }

    pub fn with_max_urls(mut self, max_urls: usize) -> Self {
        self.max_urls_per_cycle = max_urls;
        self
    }

    pub fn with_model(mut self, provider: ModelProvider, model_id: &str) -> Self {
        self.model_provider = provider;
        self.model_id = model_id.to_string();
        self
    }

    pub fn with_model_key(mut self, key: Option<String>) -> Self {
        self.model_api_key = key;
        self
    }

    pub fn with_search(mut self, provider: SearchProviderKind, key: Option<String>) -> Self {
        self.search_provider = provider;
        self.search_api_key = key;
        self
    }

    pub fn with_budget(mut self, budget: PromptBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Check the run bounds. Credentials are checked separately by
    /// [`ResearchConfig::require_credentials`] because tests run without them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic.trim().is_empty() {
            return Err(ConfigError::EmptyTopic);
        }
        if !(MIN_CYCLES..=MAX_CYCLES).contains(&self.max_cycles) {
            return Err(ConfigError::CyclesOutOfRange {
                min: MIN_CYCLES,
                max: MAX_CYCLES,
                got: self.max_cycles,
            });
        }
        if self.max_results_per_query == 0 {
            return Err(ConfigError::ZeroLimit("max_results_per_query"));
        }
        if self.max_urls_per_cycle == 0 {
            return Err(ConfigError::ZeroLimit("max_urls_per_cycle"));
        }
        Ok(())
    }

    /// Both API keys must be present and non-blank
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        if self.model_api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(ConfigError::MissingCredential("model_api_key"));
        }
        if self.search_api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(ConfigError::MissingCredential("search_api_key"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResearchConfig::default();
        assert_eq!(config.max_cycles, 3);
        assert_eq!(config.max_results_per_query, 10);
        assert_eq!(config.max_urls_per_cycle, 5);
        assert_eq!(config.model_id, "gpt-4o");
        assert_eq!(config.search_provider, SearchProviderKind::Tavily);
    }

    #[test]
    fn test_validate_cycles_bounds() {
        assert!(ResearchConfig::new("rust").with_cycles(1).validate().is_ok());
        assert!(ResearchConfig::new("rust").with_cycles(5).validate().is_ok());
        assert_eq!(
            ResearchConfig::new("rust").with_cycles(0).validate(),
            Err(ConfigError::CyclesOutOfRange { min: 1, max: 5, got: 0 })
        );
        assert!(ResearchConfig::new("rust").with_cycles(6).validate().is_err());
    }

    #[test]
    fn test_validate_topic_and_limits() {
        assert_eq!(ResearchConfig::new("   ").validate(), Err(ConfigError::EmptyTopic));
        assert_eq!(
            ResearchConfig::new("rust").with_max_urls(0).validate(),
            Err(ConfigError::ZeroLimit("max_urls_per_cycle"))
        );
    }

    #[test]
    fn test_require_credentials() {
        let config = ResearchConfig::new("rust").with_model_key(Some("sk-test".into()));
        assert_eq!(
            config.require_credentials(),
            Err(ConfigError::MissingCredential("search_api_key"))
        );

        let config = config.with_search(SearchProviderKind::Brave, Some("bsa".into()));
        assert!(config.require_credentials().is_ok());
    }

    #[test]
    fn test_keys_not_serialized() {
        let config = ResearchConfig::new("rust")
            .with_model_key(Some("sk-secret".into()))
            .with_search(SearchProviderKind::Tavily, Some("tvly-secret".into()));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
