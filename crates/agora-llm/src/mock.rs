//! Mock LLM provider for testing and offline runs

use agora_core::PromptBundle;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::provider::{LlmError, LlmProvider, LlmResponse, TokenUsage};

type Responder = Box<dyn Fn(&PromptBundle) -> Result<String, LlmError> + Send + Sync>;

/// One scripted outcome
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(LlmError),
}

/// A mock LLM provider.
///
/// Scripted replies are consumed first, in order. After that the provider
/// falls back to its responder closure, then to its cycling canned responses,
/// and finally to a debate-aware "smart" reply that satisfies every
/// structured response shape.
pub struct MockProvider {
    /// Name of this mock
    pub name: String,
    script: Mutex<VecDeque<MockReply>>,
    responder: Option<Responder>,
    responses: Vec<String>,
    index: AtomicUsize,
    calls: Mutex<Vec<PromptBundle>>,
    latency: Duration,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("name", &self.name)
            .field("responses", &self.responses.len())
            .field("latency", &self.latency)
            .finish()
    }
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockProvider {
    /// Create a new mock provider with given responses (cycles through them)
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            name: "mock".to_string(),
            script: Mutex::new(VecDeque::new()),
            responder: None,
            responses,
            index: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Create a mock that always returns the same response
    pub fn constant(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// Create a mock that answers every debate task with well-formed JSON
    pub fn smart() -> Self {
        Self::new(Vec::new())
    }

    /// Create a mock whose reply is computed from the prompt
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&PromptBundle) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        let mut mock = Self::new(Vec::new());
        mock.responder = Some(Box::new(responder));
        mock
    }

    /// Create a mock that fails every call with `error`
    pub fn failing(error: LlmError) -> Self {
        Self::with_responder(move |_| Err(error.clone()))
    }

    /// Builder: queue scripted replies ahead of the fallback behavior
    pub fn with_script(self, replies: Vec<MockReply>) -> Self {
        guard(&self.script).extend(replies);
        self
    }

    /// Builder: simulated latency per call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Builder: rename the mock
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Every bundle received so far
    pub fn calls(&self) -> Vec<PromptBundle> {
        guard(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        guard(&self.calls).len()
    }

    fn next_reply(&self, bundle: &PromptBundle) -> Result<String, LlmError> {
        if let Some(reply) = guard(&self.script).pop_front() {
            return match reply {
                MockReply::Text(text) => Ok(text),
                MockReply::Fail(err) => Err(err),
            };
        }
        if let Some(responder) = &self.responder {
            return responder(bundle);
        }
        if !self.responses.is_empty() {
            let idx = self.index.fetch_add(1, Ordering::Relaxed);
            return Ok(self.responses[idx % self.responses.len()].clone());
        }
        Ok(smart_reply(bundle))
    }
}

/// One object carrying every field any debate task asks for
fn universal_object(who: &str) -> Value {
    json!({
        "thought": format!("{} weighed the proposal against daily life in the neighbourhood.", who),
        "stance": "conditional_support",
        "utterance": format!("{} supports the plan if current tenants are protected.", who),
        "nominations": [],
        "reaction_type": "question",
        "referenced_code": null,
        "vote": "conditional_accept",
        "issues": ["tenant relocation", "contribution costs"],
        "consensus": "Proceed in phases with a relocation fund for current tenants."
    })
}

/// Well-formed reply for any debate task: one universal object, or one per
/// id when the task carries a `Participants:` line
pub fn smart_reply(bundle: &PromptBundle) -> String {
    let listed = bundle
        .task
        .lines()
        .find_map(|line| line.trim().strip_prefix("Participants:"))
        .map(|ids| {
            ids.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

    match listed {
        Some(ids) => {
            let items: Vec<Value> = ids
                .iter()
                .map(|id| {
                    let mut item = universal_object(id);
                    item["id"] = Value::String(id.clone());
                    item
                })
                .collect();
            Value::Array(items).to_string()
        }
        None => universal_object(bundle.session.as_deref().unwrap_or("participant")).to_string(),
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, bundle: &PromptBundle) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();
        guard(&self.calls).push(bundle.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let content = self.next_reply(bundle)?;
        let prompt_chars = bundle.system.len() + bundle.history.len() + bundle.task.len();

        Ok(LlmResponse {
            usage: TokenUsage {
                cached_tokens: 0,
                prompt_tokens: (prompt_chars / 4) as u64,
                completion_tokens: (content.len() / 4) as u64,
            },
            content,
            model: self.name.clone(),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider() {
        let mock = MockProvider::constant("Hello, world!");
        let response = mock.ask("test").await.unwrap();
        assert_eq!(response, "Hello, world!");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_script_runs_before_fallback() {
        let mock = MockProvider::constant("fallback").with_script(vec![
            MockReply::Fail(LlmError::ConnectionFailed("reset".into())),
            MockReply::Text("scripted".into()),
        ]);
        assert!(mock.ask("a").await.is_err());
        assert_eq!(mock.ask("b").await.unwrap(), "scripted");
        assert_eq!(mock.ask("c").await.unwrap(), "fallback");
    }

    #[tokio::test]
    async fn test_smart_mock_answers_batches_per_participant() {
        let mock = MockProvider::smart();
        let bundle = PromptBundle::new("", "", "Speak.\nParticipants: resident_01, resident_02");
        let response = mock.complete(&bundle).await.unwrap();
        let items: Vec<Value> = serde_json::from_str(&response.content).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["id"], "resident_02");
    }

    #[tokio::test]
    async fn test_smart_mock_single_object() {
        let mock = MockProvider::smart();
        let bundle = PromptBundle::new("", "", "Reflect.").with_session("resident_04");
        let response = mock.complete(&bundle).await.unwrap();
        let value: Value = serde_json::from_str(&response.content).unwrap();
        assert!(value["utterance"].as_str().unwrap().starts_with("resident_04"));
        assert!(response.usage.prompt_tokens > 0);
    }
}
