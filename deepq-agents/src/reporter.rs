//! Report Generator
//!
//! The model writes the narrative from the final summary. Citations are
//! never shown to the model; the numbered source list is appended
//! verbatim afterwards.

use tracing::info;

use deepq_core::{append_citations, Source};

use crate::{AgentError, PromptTemplate, PromptedCall, SharedBackend};

/// Final report writer
#[derive(Clone)]
pub struct ReportGenerator {
    call: PromptedCall,
}

impl ReportGenerator {
    pub fn new(backend: SharedBackend, template: PromptTemplate) -> Self {
        Self {
            call: PromptedCall::new(backend, template),
        }
    }

    /// One model call, then `narrative + "\n\n" + citation section`
    pub async fn generate(
        &self,
        topic: &str,
        final_summary: &str,
        cycles_completed: u32,
        sources: &[Source],
    ) -> Result<String, AgentError> {
        let cycles = cycles_completed.to_string();
        let source_count = sources.len().to_string();

        let narrative = self
            .call
            .call(&[
                ("topic", topic),
                ("current_summary", final_summary),
                ("cycles_completed", cycles.as_str()),
                ("sources_count", source_count.as_str()),
            ])
            .await?;

        info!("Generated final research report");
        Ok(append_citations(&narrative, sources))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::mock::RecordingBackend;
    use crate::PromptSet;
    use std::sync::Arc;

    fn reporter(reply: &str) -> (Arc<RecordingBackend>, ReportGenerator) {
        let backend = Arc::new(RecordingBackend::new(reply));
        let template = PromptSet::load_embedded().unwrap().report;
        (backend.clone(), ReportGenerator::new(backend, template))
    }

    #[tokio::test]
    async fn test_citations_appended_outside_model_view() {
        let (backend, reporter) = reporter("# Report");
        let sources = vec![Source::new("Secret Title", "https://a.example", "2020")];

        let report = reporter.generate("topic", "summary", 2, &sources).await.unwrap();

        assert_eq!(
            report,
            "# Report\n\n\n\n## Sources\n\n1. [Secret Title] (2020) - https://a.example\n"
        );
        let prompt = backend.last_user_prompt();
        assert!(!prompt.contains("Secret Title"));
        assert!(prompt.contains("after 2 research cycles drawing on 1 sources"));
    }

    #[tokio::test]
    async fn test_empty_sources_still_has_header() {
        let (_, reporter) = reporter("Nothing found.");
        let report = reporter.generate("topic", "", 0, &[]).await.unwrap();
        assert!(report.ends_with("## Sources\n\n"));
    }
}
