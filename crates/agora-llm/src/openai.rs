//! OpenAI-compatible chat completions provider
//!
//! Serves OpenAI itself plus Moonshot and EXAONE (Friendli), which expose the
//! same wire format under a different base URL.

use agora_core::PromptBundle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::provider::{ensure_success, LlmError, LlmProvider, LlmResponse, TokenUsage};

/// Chat completions request format
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Chat completions response format
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: u64,
}

impl From<Usage> for TokenUsage {
    fn from(u: Usage) -> Self {
        TokenUsage {
            cached_tokens: u.prompt_tokens_details.map(|d| d.cached_tokens).unwrap_or(0),
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        }
    }
}

/// OpenAI-compatible provider
#[derive(Debug)]
pub struct OpenAiCompatibleProvider {
    /// Provider label used in logs
    label: String,
    /// API key or bearer token
    api_key: String,
    /// Model id sent on the wire
    model: String,
    /// Base URL up to and including the version segment
    base_url: String,
    /// Sampling temperature; omitted from the request when unset
    temperature: Option<f32>,
    /// HTTP client
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(label: &str, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            label: label.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature: None,
            client: reqwest::Client::new(),
        }
    }

    /// OpenAI. Reasoning models reject custom temperatures, so none is sent.
    pub fn openai(api_key: &str, model: &str) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Moonshot (Kimi)
    pub fn moonshot(api_key: &str, model: &str) -> Self {
        Self::new("moonshot", "https://api.moonshot.ai/v1", api_key, model)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, bundle: &PromptBundle) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();
        let url = format!("{}/chat/completions", self.base_url);
        let user = bundle.user_message();

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &bundle.system,
                },
                Message {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: api_response.model.unwrap_or_else(|| self.model.clone()),
            usage: api_response.usage.map(TokenUsage::from).unwrap_or_default(),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
