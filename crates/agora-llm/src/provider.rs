//! LLM Provider trait and common types

use agora_core::PromptBundle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Whether a failure is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network, timeout, empty response, rate limiting, server errors
    Transient,
    /// Authentication, invalid request, disabled provider
    Permanent,
}

/// Errors from LLM providers, classified once at the adapter boundary
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Empty response from {0}")]
    EmptyResponse(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Server error (status {status}): {body}")]
    Server { status: u16, body: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Provider disabled: {0}")]
    Disabled(String),
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
    #[error("All {attempts} attempts failed, last error: {last}")]
    RetriesExhausted { attempts: u32, last: Box<LlmError> },
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::ConnectionFailed(_)
            | LlmError::Timeout(_)
            | LlmError::EmptyResponse(_)
            | LlmError::RateLimited(_)
            | LlmError::Server { .. }
            | LlmError::InvalidResponse(_)
            | LlmError::RetriesExhausted { .. } => ErrorKind::Transient,
            LlmError::Authentication(_)
            | LlmError::InvalidRequest(_)
            | LlmError::Disabled(_)
            | LlmError::UnknownModel(_)
            | LlmError::MissingCredentials(_) => ErrorKind::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn is_permanent(&self) -> bool {
        self.kind() == ErrorKind::Permanent
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => LlmError::Authentication(body),
            429 => LlmError::RateLimited(body),
            400 | 404 | 422 => LlmError::InvalidRequest(body),
            _ => LlmError::Server { status, body },
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::ConnectionFailed(format!("timeout: {}", e))
        } else if e.is_decode() {
            LlmError::InvalidResponse(e.to_string())
        } else {
            LlmError::ConnectionFailed(e.to_string())
        }
    }
}

/// Token accounting reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub cached_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Response from an LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub content: String,
    /// Model used
    pub model: String,
    /// Token usage of this call
    pub usage: TokenUsage,
    /// Time taken in milliseconds
    pub latency_ms: u64,
}

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync + std::fmt::Debug {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Generate a completion for a prompt bundle
    async fn complete(&self, bundle: &PromptBundle) -> Result<LlmResponse, LlmError>;

    /// Generate with a bare task prompt (convenience method)
    async fn ask(&self, prompt: &str) -> Result<String, LlmError> {
        let bundle = PromptBundle::new("You are a helpful assistant. Be concise.", "", prompt);
        let response = self.complete(&bundle).await?;
        Ok(response.content)
    }
}

/// Turn a non-success response into a classified error
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::from_status(status.as_u16(), body))
}
