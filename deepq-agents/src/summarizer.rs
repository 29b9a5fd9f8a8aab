//! Summary Updater
//!
//! Builds one prompt from a cycle's hits, scraped pages and the prior
//! summary. The model's answer replaces the summary wholesale.

use tracing::{debug, info};

use deepq_core::{
    truncate_chars, truncate_with_ellipsis, PromptBudget, ScrapedDoc, SearchHit, NO_PREVIOUS_SUMMARY,
};

use crate::{AgentError, PromptTemplate, PromptedCall, SharedBackend};

/// Result of one summary update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryUpdate {
    pub summary: String,
    /// Whether the model output exceeded the stored-summary budget
    pub clipped: bool,
}

/// Running summary updater
#[derive(Clone)]
pub struct SummaryUpdater {
    call: PromptedCall,
}

impl SummaryUpdater {
    pub fn new(backend: SharedBackend, template: PromptTemplate) -> Self {
        Self {
            call: PromptedCall::new(backend, template),
        }
    }

    /// Render hits then scraped documents, each truncated to its budget,
    /// and cap the whole block
    pub fn format_findings(hits: &[SearchHit], docs: &[ScrapedDoc], budget: &PromptBudget) -> String {
        let mut blocks = Vec::with_capacity(hits.len() + docs.len());

        for (i, hit) in hits.iter().enumerate() {
            blocks.push(format!(
                "Result {}:\nTitle: {}\nSource: {}\nSummary: {}\n",
                i + 1,
                hit.title,
                hit.url,
                truncate_with_ellipsis(&hit.body, budget.hit_body_chars)
            ));
        }

        for (i, doc) in docs.iter().enumerate() {
            blocks.push(format!(
                "Scraped Content {}:\nTitle: {}\nSource: {}\nContent: {}\n",
                i + 1,
                doc.title,
                doc.url,
                truncate_with_ellipsis(&doc.content, budget.scraped_snippet_chars)
            ));
        }

        let findings = blocks.join("\n");
        truncate_chars(&findings, budget.findings_chars).to_string()
    }

    /// One model call; the returned summary is meant to replace the prior one
    pub async fn update(
        &self,
        topic: &str,
        prior_summary: &str,
        hits: &[SearchHit],
        docs: &[ScrapedDoc],
        budget: &PromptBudget,
    ) -> Result<SummaryUpdate, AgentError> {
        let findings = Self::format_findings(hits, docs, budget);
        let prior = if prior_summary.is_empty() {
            NO_PREVIOUS_SUMMARY
        } else {
            truncate_chars(prior_summary, budget.summary_chars)
        };

        debug!(
            "Summarizing {} results and {} pages ({} chars of findings)",
            hits.len(),
            docs.len(),
            findings.chars().count()
        );

        let output = self
            .call
            .call(&[
                ("topic", topic),
                ("search_results", findings.as_str()),
                ("current_summary", prior),
            ])
            .await?;

        let kept = truncate_chars(&output, budget.stored_summary_chars);
        let clipped = kept.len() < output.len();
        info!("Summary updated successfully");

        Ok(SummaryUpdate {
            summary: kept.to_string(),
            clipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::mock::RecordingBackend;
    use crate::PromptSet;
    use std::sync::Arc;

    fn hit(i: usize, body: &str) -> SearchHit {
        SearchHit::new(i, &format!("Title {}", i), body, &format!("https://site{}.example", i), "tavily")
    }

    #[test]
    fn test_format_findings_layout() {
        let docs = vec![ScrapedDoc::success("https://site0.example", "Page 0", "y".repeat(600), false)];
        let text = SummaryUpdater::format_findings(&[hit(0, "short body")], &docs, &PromptBudget::default());

        assert!(text.starts_with("Result 1:\nTitle: Title 0\nSource: https://site0.example\nSummary: short body\n"));
        assert!(text.contains("Scraped Content 1:\nTitle: Page 0"));
        assert!(text.contains(&format!("Content: {}...", "y".repeat(500))));
        assert!(!text.contains(&"y".repeat(501)));
    }

    #[test]
    fn test_findings_block_budget() {
        let budget = PromptBudget {
            findings_chars: 100,
            ..Default::default()
        };
        let hits: Vec<_> = (0..20).map(|i| hit(i, "body text")).collect();
        let text = SummaryUpdater::format_findings(&hits, &[], &budget);
        assert_eq!(text.chars().count(), 100);
    }

    #[tokio::test]
    async fn test_update_replaces_and_clips() {
        let backend = Arc::new(RecordingBackend::new("NEW SUMMARY that is long"));
        let updater = SummaryUpdater::new(backend.clone(), PromptSet::load_embedded().unwrap().summarize);
        let budget = PromptBudget {
            stored_summary_chars: 11,
            ..Default::default()
        };

        let update = updater
            .update("topic", "", &[hit(0, "b")], &[], &budget)
            .await
            .unwrap();

        assert_eq!(update.summary, "NEW SUMMARY");
        assert!(update.clipped);
        let prompt = backend.last_user_prompt();
        assert!(prompt.contains(NO_PREVIOUS_SUMMARY));
        assert!(prompt.contains("Result 1:"));
    }

    #[tokio::test]
    async fn test_update_includes_prior_summary() {
        let backend = Arc::new(RecordingBackend::new("merged"));
        let updater = SummaryUpdater::new(backend.clone(), PromptSet::load_embedded().unwrap().summarize);

        let update = updater
            .update("topic", "OLD FINDINGS", &[hit(0, "b")], &[], &PromptBudget::default())
            .await
            .unwrap();

        assert_eq!(update.summary, "merged");
        assert!(!update.clipped);
        assert!(backend.last_user_prompt().contains("OLD FINDINGS"));
    }
}
