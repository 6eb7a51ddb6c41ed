use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::info;

use crate::core::config::ContentConfig;
use crate::core::llm::CompletionClient;
use crate::core::pipeline::types::{Script, ScriptWriter};

/// Script stage: one completion, then a sentence split that feeds the
/// narration and media stages.
pub struct LlmScriptWriter {
    client: Arc<CompletionClient>,
}

impl LlmScriptWriter {
    pub fn new(client: Arc<CompletionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScriptWriter for LlmScriptWriter {
    async fn write(
        &self,
        concept: &str,
        duration_secs: u32,
        content: &ContentConfig,
    ) -> Result<Script> {
        let section = &content.story_writer;
        let prompt = content.script_prompt(concept, duration_secs);

        let raw = self
            .client
            .complete(&section.model, section.temperature, &prompt)
            .await?;

        let sentences = split_sentences(&raw);
        if sentences.is_empty() {
            bail!("Script contained no usable sentences");
        }

        info!("Script written: {} sentences", sentences.len());
        Ok(Script { sentences, raw })
    }
}

/// Split narration text into sentences on periods. A trailing fragment
/// under 10 characters is discarded as an artifact of generation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences: Vec<String> = text
        .replace('\n', " ")
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    let tail_is_fragment = sentences.last().is_some_and(|s| s.len() < 10);
    if tail_is_fragment {
        sentences.pop();
    }

    sentences
}
