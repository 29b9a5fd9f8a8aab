//! Common types for research agents

use thiserror::Error;

use crate::{LlmError, PromptError, PromptSet, PromptTemplate, SharedBackend};

/// Errors from agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),
}

/// Shared plumbing of every model-backed step: one template, one backend
#[derive(Clone)]
pub struct PromptedCall {
    backend: SharedBackend,
    template: PromptTemplate,
}

impl PromptedCall {
    pub fn new(backend: SharedBackend, template: PromptTemplate) -> Self {
        Self { backend, template }
    }

    /// Render the template and issue exactly one model call
    pub async fn call(&self, vars: &[(&str, &str)]) -> Result<String, AgentError> {
        let user = self.template.render(vars);
        let text = self
            .backend
            .generate(self.template.system_prompt(), &user)
            .await?;
        Ok(text)
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}

/// Every agent of a run, wired to one backend
#[derive(Clone)]
pub struct ResearchAgents {
    pub query: crate::QueryGenerator,
    pub summarizer: crate::SummaryUpdater,
    pub reflector: crate::Reflector,
    pub reporter: crate::ReportGenerator,
}

impl ResearchAgents {
    pub fn new(backend: SharedBackend, prompts: &PromptSet) -> Self {
        Self {
            query: crate::QueryGenerator::new(backend.clone(), prompts.query.clone()),
            summarizer: crate::SummaryUpdater::new(backend.clone(), prompts.summarize.clone()),
            reflector: crate::Reflector::new(backend.clone(), prompts.reflect.clone()),
            reporter: crate::ReportGenerator::new(backend, prompts.report.clone()),
        }
    }

    /// Model every agent talks to
    pub fn model_name(&self) -> &str {
        self.query.model_name()
    }

    /// Wire agents with the embedded prompts
    pub fn with_embedded_prompts(backend: SharedBackend) -> Result<Self, PromptError> {
        Ok(Self::new(backend, &PromptSet::load_embedded()?))
    }
}


#[cfg(test)]
mod tests {
    use super::mock::RecordingBackend;
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_prompted_call_renders_and_calls_once() {
        let backend = Arc::new(RecordingBackend::new("ok"));
        let prompts = PromptSet::load_embedded().unwrap();
        let call = PromptedCall::new(backend.clone(), prompts.reflect.clone());

        let out = call
            .call(&[("topic", "rust"), ("current_summary", "Rust is fast.")])
            .await
            .unwrap();

        assert_eq!(out, "ok");
        assert_eq!(backend.calls.lock().len(), 1);
        assert!(backend.last_user_prompt().contains("TOPIC: rust"));
        assert!(backend.last_user_prompt().contains("Rust is fast."));
    }
}
