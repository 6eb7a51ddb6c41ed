use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::info;

use crate::core::config::ContentConfig;
use crate::core::llm::CompletionClient;
use crate::core::pipeline::types::{Idea, IdeaGenerator};

/// Idea stage: one JSON-mode completion shaped by the content config.
pub struct LlmIdeaGenerator {
    client: Arc<CompletionClient>,
}

impl LlmIdeaGenerator {
    pub fn new(client: Arc<CompletionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdeaGenerator for LlmIdeaGenerator {
    async fn generate(&self, content: &ContentConfig) -> Result<Idea> {
        let section = &content.content_idea;
        let prompt = content.idea_prompt();

        let raw = self
            .client
            .complete_json(&section.model, section.temperature, &prompt)
            .await?;

        let value: serde_json::Value =
            serde_json::from_str(&raw).context("Idea response was not valid JSON")?;

        // The config names the key carrying the subject; fall back to
        // the literal "subject" for configs that use it directly.
        let subject = value
            .get(&section.subject_key)
            .or_else(|| value.get("subject"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .trim()
            .to_string();

        let concept = value
            .get("concept")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .trim()
            .to_string();

        if subject.is_empty() {
            bail!("Idea subject was empty after normalization");
        }

        info!("Idea: subject={subject:?} concept={concept:?}");
        Ok(Idea { subject, concept })
    }
}
