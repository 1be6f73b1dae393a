//! LLM invocation gateway with bounded retry and exponential backoff
//!
//! Every model call in a run goes through [`Gateway::invoke`]. Transient
//! failures (including empty responses and per-attempt timeouts) are retried
//! up to [`RetryPolicy::max_attempts`] times with `base_delay * 2^attempt`
//! between attempts; permanent failures return immediately without consuming
//! retry budget.

use agora_core::PromptBundle;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::provider::{LlmError, LlmResponse};
use crate::registry::ProviderRegistry;

/// Retry/backoff configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each time
    pub base_delay: Duration,
    /// Upper bound on a single attempt
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Fast settings for tests and offline runs
    pub fn immediate() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Delay after failed attempt `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Gateway counters for the run summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GatewayStats {
    /// Calls made through `invoke`
    pub calls: u64,
    /// Extra attempts after a transient failure
    pub retries: u64,
    /// Calls that ended in an error
    pub failures: u64,
    /// Calls that ran out of attempts
    pub exhausted: u64,
}

/// Retry-wrapped call contract over a provider registry
#[derive(Debug)]
pub struct Gateway {
    registry: ProviderRegistry,
    policy: RetryPolicy,
    calls: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
    exhausted: AtomicU64,
}

impl Gateway {
    pub fn new(registry: ProviderRegistry, policy: RetryPolicy) -> Self {
        Self {
            registry,
            policy,
            calls: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            exhausted: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            calls: self.calls.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }

    /// Invoke `model` with `bundle`. The returned usage belongs to the
    /// attempt that succeeded.
    pub async fn invoke(&self, model: &str, bundle: &PromptBundle) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let provider = match self.registry.get(model) {
            Ok(p) => p,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            let outcome = match tokio::time::timeout(self.policy.request_timeout, provider.complete(bundle)).await {
                Ok(Ok(response)) if response.content.trim().is_empty() => {
                    Err(LlmError::EmptyResponse(model.to_string()))
                }
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(self.policy.request_timeout)),
            };

            match outcome {
                Ok(response) => {
                    tracing::debug!(
                        model,
                        provider = provider.name(),
                        attempt = attempt + 1,
                        latency_ms = response.latency_ms,
                        chars = response.content.len(),
                        "LLM call succeeded"
                    );
                    return Ok(response);
                }
                Err(e) if e.is_permanent() => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(model, provider = provider.name(), error = %e, "Non-retryable LLM error");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        model,
                        provider = provider.name(),
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %e,
                        "LLM call failed"
                    );
                    last_error = Some(e);
                    if attempt + 1 < attempts {
                        self.retries.fetch_add(1, Ordering::Relaxed);
                        let delay = self.policy.delay_for(attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        self.failures.fetch_add(1, Ordering::Relaxed);
        self.exhausted.fetch_add(1, Ordering::Relaxed);
        tracing::error!(model, attempts, "All LLM attempts failed");
        Err(LlmError::RetriesExhausted {
            attempts,
            last: Box::new(last_error.unwrap_or_else(|| LlmError::EmptyResponse(model.to_string()))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockProvider, MockReply};
    use std::sync::Arc;

    fn gateway(mock: MockProvider, policy: RetryPolicy) -> (Gateway, Arc<MockProvider>) {
        let mock = Arc::new(mock);
        let registry = ProviderRegistry::new().with("mock", mock.clone());
        (Gateway::new(registry, policy), mock)
    }

    fn bundle() -> PromptBundle {
        PromptBundle::new("system", "history", "task")
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let mock = MockProvider::constant("ok").with_script(vec![
            MockReply::Fail(LlmError::ConnectionFailed("reset".into())),
            MockReply::Text("   ".into()),
        ]);
        let (gw, mock) = gateway(mock, RetryPolicy::immediate());

        let response = gw.invoke("mock", &bundle()).await.unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(mock.call_count(), 3);
        assert_eq!(gw.stats().retries, 2);
        assert_eq!(gw.stats().failures, 0);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let (gw, mock) = gateway(
            MockProvider::failing(LlmError::Authentication("bad key".into())),
            RetryPolicy::immediate(),
        );
        let err = gw.invoke("mock", &bundle()).await.unwrap_err();
        assert!(matches!(err, LlmError::Authentication(_)));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_wraps_last_error() {
        let (gw, mock) = gateway(
            MockProvider::failing(LlmError::Server {
                status: 503,
                body: "overloaded".into(),
            }),
            RetryPolicy::immediate(),
        );
        let err = gw.invoke("mock", &bundle()).await.unwrap_err();
        match err {
            LlmError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, LlmError::Server { status: 503, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.call_count(), 3);
        assert_eq!(gw.stats().exhausted, 1);
    }

    #[tokio::test]
    async fn test_slow_attempts_time_out() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::ZERO,
            request_timeout: Duration::from_millis(20),
        };
        let (gw, _) = gateway(
            MockProvider::constant("late").with_latency(Duration::from_millis(500)),
            policy,
        );
        let err = gw.invoke("mock", &bundle()).await.unwrap_err();
        match err {
            LlmError::RetriesExhausted { last, .. } => assert!(matches!(*last, LlmError::Timeout(_))),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_model_fails_fast() {
        let (gw, _) = gateway(MockProvider::smart(), RetryPolicy::immediate());
        let err = gw.invoke("gpt-5-mini", &bundle()).await.unwrap_err();
        assert!(err.is_permanent());
    }
}
