//! Reflector
//!
//! Critiques the running summary. The critique is for observation only;
//! nothing downstream reads it back.

use tracing::info;

use deepq_core::{truncate_chars, PromptBudget};

use crate::{AgentError, PromptTemplate, PromptedCall, SharedBackend};

/// Research progress critic
#[derive(Clone)]
pub struct Reflector {
    call: PromptedCall,
}

impl Reflector {
    pub fn new(backend: SharedBackend, template: PromptTemplate) -> Self {
        Self {
            call: PromptedCall::new(backend, template),
        }
    }

    pub async fn reflect(
        &self,
        topic: &str,
        current_summary: &str,
        budget: &PromptBudget,
    ) -> Result<String, AgentError> {
        let critique = self
            .call
            .call(&[
                ("topic", topic),
                ("current_summary", truncate_chars(current_summary, budget.summary_chars)),
            ])
            .await?;

        info!("Completed reflection on current research");
        Ok(critique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::mock::RecordingBackend;
    use crate::PromptSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reflect_on_empty_summary() {
        let backend = Arc::new(RecordingBackend::new("Everything is missing."));
        let reflector = Reflector::new(backend.clone(), PromptSet::load_embedded().unwrap().reflect);

        let critique = reflector.reflect("quantum sensors", "", &PromptBudget::default()).await.unwrap();

        assert_eq!(critique, "Everything is missing.");
        assert!(backend.last_user_prompt().contains("TOPIC: quantum sensors"));
    }
}
