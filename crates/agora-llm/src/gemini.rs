//! Gemini provider with explicit context caching
//!
//! The static system prefix is uploaded once per session as a
//! `cachedContents` resource and referenced by handle on later calls. Handles
//! live in a Moka cache whose TTL matches the server-side TTL, and each one
//! remembers the SHA-256 of the prefix it was built from: when the prefix
//! changes the old handle is deleted and a fresh one created. A failed upload
//! only costs the caching; the call itself goes out uncached.

use agora_core::PromptBundle;
use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::provider::{ensure_success, LlmError, LlmProvider, LlmResponse, TokenUsage};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Server-side lifetime of an uploaded prefix
pub const CACHE_TTL: Duration = Duration::from_secs(3600);

/// SHA-256 of a cached prefix
pub fn content_hash(prefix: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hex::encode(hasher.finalize())
}

/// A live server-side cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHandle {
    /// Resource name, e.g. `cachedContents/abc123`
    pub name: String,
    pub content_hash: String,
}

/// Remote operations on cached prefixes
#[async_trait]
pub trait CacheApi: Send + Sync + std::fmt::Debug {
    /// Upload `prefix` and return the resource name
    async fn create(&self, prefix: &str) -> Result<String, LlmError>;
    /// Drop a resource
    async fn delete(&self, name: &str) -> Result<(), LlmError>;
}

/// Session-keyed handle cache
#[derive(Debug)]
pub struct PromptCache<A: CacheApi> {
    api: A,
    handles: Cache<String, CacheHandle>,
    created: AtomicU64,
    reused: AtomicU64,
}

impl<A: CacheApi> PromptCache<A> {
    pub fn new(api: A, ttl: Duration) -> Self {
        Self {
            api,
            handles: Cache::builder().max_capacity(1024).time_to_live(ttl).build(),
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    /// Handle for `prefix` under `session`, creating or replacing as needed.
    /// `None` means the caller should send the prefix inline.
    pub async fn resolve(&self, session: &str, prefix: &str) -> Option<String> {
        let hash = content_hash(prefix);

        if let Some(existing) = self.handles.get(session).await {
            if existing.content_hash == hash {
                self.reused.fetch_add(1, Ordering::Relaxed);
                return Some(existing.name);
            }
            tracing::debug!(session, handle = %existing.name, "Cached prefix changed, replacing");
            if let Err(e) = self.api.delete(&existing.name).await {
                tracing::debug!(session, error = %e, "Failed to delete stale cache handle");
            }
            self.handles.invalidate(session).await;
        }

        match self.api.create(prefix).await {
            Ok(name) => {
                self.created.fetch_add(1, Ordering::Relaxed);
                self.handles
                    .insert(
                        session.to_string(),
                        CacheHandle {
                            name: name.clone(),
                            content_hash: hash,
                        },
                    )
                    .await;
                Some(name)
            }
            Err(e) => {
                tracing::warn!(session, error = %e, "Context cache creation failed, sending prompt uncached");
                None
            }
        }
    }

    /// (created, reused)
    pub fn stats(&self) -> (u64, u64) {
        (self.created.load(Ordering::Relaxed), self.reused.load(Ordering::Relaxed))
    }
}

/// Thin REST client for the Generative Language API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CachedContent {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    cached_content_token_count: u64,
}

impl GeminiClient {
    fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn generate(&self, body: &Value) -> Result<GenerateResponse, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;
        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl CacheApi for GeminiClient {
    async fn create(&self, prefix: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": format!("models/{}", self.model),
            "systemInstruction": { "parts": [{ "text": prefix }] },
            "ttl": format!("{}s", CACHE_TTL.as_secs()),
        });
        let response = self
            .client
            .post(format!("{}/cachedContents", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let created: CachedContent = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(created.name)
    }

    async fn delete(&self, name: &str) -> Result<(), LlmError> {
        let response = self
            .client
            .delete(format!("{}/{}", self.base_url, name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

fn request_body(bundle: &PromptBundle, temperature: f32, handle: Option<&str>) -> Value {
    let mut body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": bundle.user_message() }] }],
        "generationConfig": { "temperature": temperature },
    });
    match handle {
        Some(name) => body["cachedContent"] = Value::String(name.to_string()),
        None => body["systemInstruction"] = json!({ "parts": [{ "text": bundle.system }] }),
    }
    body
}

/// Gemini provider
#[derive(Debug)]
pub struct GeminiProvider {
    client: GeminiClient,
    cache: PromptCache<GeminiClient>,
    temperature: f32,
}

impl GeminiProvider {
    pub fn new(api_key: &str, model: &str, temperature: f32) -> Self {
        let client = GeminiClient::new(api_key, model);
        Self {
            cache: PromptCache::new(client.clone(), CACHE_TTL),
            client,
            temperature,
        }
    }

    /// (handles created, handles reused)
    pub fn cache_stats(&self) -> (u64, u64) {
        self.cache.stats()
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn complete(&self, bundle: &PromptBundle) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();

        let handle = match bundle.session.as_deref() {
            Some(session) if !bundle.system.is_empty() => self.cache.resolve(session, &bundle.system).await,
            _ => None,
        };

        let body = request_body(bundle, self.temperature, handle.as_deref());
        let api_response = self.client.generate(&body).await?;

        let content = api_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
            .unwrap_or_default();

        let usage = api_response
            .usage_metadata
            .map(|u| TokenUsage {
                cached_tokens: u.cached_content_token_count,
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: api_response.model_version.unwrap_or_else(|| self.client.model.clone()),
            usage,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
