use std::time::Duration;

use anyhow::{Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Thin chat-completions client shared by the idea and script stages.
/// One prompt in, one message out; the stages own their prompts.
pub struct CompletionClient {
    api_key: String,
    client: Client,
}

impl CompletionClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client");
        Self { api_key, client }
    }

    pub async fn complete(&self, model: &str, temperature: f32, prompt: &str) -> Result<String> {
        self.request(model, temperature, prompt, None).await
    }

    /// Same call with JSON-object output forced.
    pub async fn complete_json(
        &self,
        model: &str,
        temperature: f32,
        prompt: &str,
    ) -> Result<String> {
        self.request(model, temperature, prompt, Some("json_object"))
            .await
    }

    async fn request(
        &self,
        model: &str,
        temperature: f32,
        prompt: &str,
        format: Option<&str>,
    ) -> Result<String> {
        let req = ChatRequest {
            model,
            messages: vec![ChatRequestMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens: 1000,
            response_format: format.map(|kind| ResponseFormat { kind }),
        };

        let res = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(anyhow!(
                "Completion API error: {}",
                res.text().await.unwrap_or_default()
            ));
        }

        let parsed: ChatResponse = res.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("Completion response contained no choices"))
    }
}
