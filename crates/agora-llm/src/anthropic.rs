//! Anthropic Messages API provider
//!
//! The system block and the accumulated history carry ephemeral
//! `cache_control` markers; the task block is always sent uncached.

use agora_core::PromptBundle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::provider::{ensure_success, LlmError, LlmProvider, LlmResponse, TokenUsage};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct TextBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

impl<'a> TextBlock<'a> {
    fn cached(text: &'a str) -> Self {
        Self {
            kind: "text",
            text,
            cache_control: Some(CacheControl { kind: "ephemeral" }),
        }
    }

    fn plain(text: &'a str) -> Self {
        Self {
            kind: "text",
            text,
            cache_control: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: Vec<TextBlock<'a>>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: Vec<TextBlock<'a>>,
    messages: Vec<UserMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
}

fn build_request<'a>(model: &'a str, temperature: f32, bundle: &'a PromptBundle) -> MessagesRequest<'a> {
    let mut content = Vec::with_capacity(2);
    if !bundle.history.is_empty() {
        content.push(TextBlock::cached(&bundle.history));
    }
    content.push(TextBlock::plain(&bundle.task));

    MessagesRequest {
        model,
        max_tokens: MAX_TOKENS,
        temperature,
        system: vec![TextBlock::cached(&bundle.system)],
        messages: vec![UserMessage { role: "user", content }],
    }
}

/// Anthropic provider
#[derive(Debug)]
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, model: &str, temperature: f32) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, bundle: &PromptBundle) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();
        let request = build_request(&self.model, self.temperature, bundle);

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let api_response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = api_response
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                cached_tokens: u.cache_read_input_tokens,
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: api_response.model.unwrap_or_else(|| self.model.clone()),
            usage,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_only_task_is_uncached() {
        let bundle = PromptBundle::new("system", "[Timeline]\n(empty)", "[Task]\nspeak");
        let request = build_request("claude-haiku-4-5-20251001", 0.7, &bundle);
        let json: Value = serde_json::to_value(&request).unwrap();

        assert_eq!(json["system"][0]["cache_control"]["type"], "ephemeral");
        assert_eq!(json["messages"][0]["content"][0]["cache_control"]["type"], "ephemeral");
        assert!(json["messages"][0]["content"][1].get("cache_control").is_none());
    }
}
