use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::StatusCode;

use crate::prompt;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";

pub const ROAST_TEMPERATURE: f32 = 0.9;
pub const ROAST_MAX_TOKENS: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("POST {endpoint}: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("OpenAI API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("parse OpenAI response: {0}")]
    MalformedResponse(String),

    #[error("OpenAI output text is empty")]
    EmptyOutput,

    #[error("completion did not finish within {}s", .0.as_secs())]
    Timeout(Duration),
}

/// The one outbound dependency besides the target fetch.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

pub fn chat_completions_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/chat/completions")
}

#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("build completion http client")?;

        Ok(Self {
            client,
            endpoint: chat_completions_endpoint(base_url),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt::ROAST_SYSTEM_PROMPT },
                { "role": "user", "content": prompt::user_message(prompt) },
            ],
            "temperature": ROAST_TEMPERATURE,
            "max_tokens": ROAST_MAX_TOKENS,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "request completion");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|source| CompletionError::Request {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|err| CompletionError::MalformedResponse(format!("read body: {err}")))?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or(raw);
            return Err(CompletionError::Api { status, message });
        }

        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|err| CompletionError::MalformedResponse(err.to_string()))?;
        extract_message_text(&value)
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn extract_message_text(value: &serde_json::Value) -> Result<String, CompletionError> {
    let choices = value
        .get("choices")
        .and_then(|v| v.as_array())
        .ok_or_else(|| CompletionError::MalformedResponse("missing `choices` array".to_owned()))?;

    let text = choices
        .first()
        .and_then(|choice| choice.pointer("/message/content"))
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(CompletionError::EmptyOutput);
    }
    Ok(text.to_owned())
}
