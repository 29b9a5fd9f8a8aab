//! Query Generator
//!
//! Asks the model to reason about gaps in the running summary and commit to
//! one search query on its last line.

use tracing::{debug, info};

use deepq_core::{extract_query, truncate_chars, PromptBudget, NO_RESEARCH_YET};

use crate::{AgentError, PromptTemplate, PromptedCall, SharedBackend};

/// A query plus the completion it was extracted from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuery {
    pub raw: String,
    pub query: String,
}

/// Chain-of-thought query generator
#[derive(Clone)]
pub struct QueryGenerator {
    call: PromptedCall,
}

impl QueryGenerator {
    pub fn new(backend: SharedBackend, template: PromptTemplate) -> Self {
        Self {
            call: PromptedCall::new(backend, template),
        }
    }

    pub fn model_name(&self) -> &str {
        self.call.model_name()
    }

    /// One model call, no retry. An empty query is returned as-is.
    pub async fn generate(
        &self,
        topic: &str,
        current_summary: &str,
        budget: &PromptBudget,
    ) -> Result<GeneratedQuery, AgentError> {
        let summary = if current_summary.is_empty() {
            NO_RESEARCH_YET
        } else {
            truncate_chars(current_summary, budget.summary_chars)
        };

        let raw = self
            .call
            .call(&[("topic", topic), ("current_summary", summary)])
            .await?;

        let query = extract_query(&raw);
        debug!("Raw query completion: {}", raw);
        info!("Generated search query: {}", query);

        Ok(GeneratedQuery { raw, query })
    }
}
