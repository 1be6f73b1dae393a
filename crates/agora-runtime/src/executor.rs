//! Agent executor - one model call plus parse/repair
//!
//! Failure policy lives here: a transient failure that survives the gateway's
//! retries becomes a degraded result carrying the error text, while a
//! permanent failure is returned as [`RunError::Provider`] and aborts the run.

use agora_core::PromptBundle;
use agora_debate::{parse_structured, ParseFailure, ParsedResult, Repairer, StructuredResponse};
use agora_llm::{Gateway, GatewayStats, LlmError};
use agora_persist::{CallSite, TokenLog};
use async_trait::async_trait;
use std::sync::Arc;

use crate::error::RunError;

/// Owned description of one call, for the token log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    pub participant_id: String,
    pub model: String,
    pub task_type: &'static str,
    pub target: String,
    pub round: u32,
    pub turn: u32,
}

impl CallSpec {
    pub fn new(participant_id: &str, model: &str, task_type: &'static str, round: u32, turn: u32) -> Self {
        Self {
            participant_id: participant_id.to_string(),
            model: model.to_string(),
            task_type,
            target: String::new(),
            round,
            turn,
        }
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = target.to_string();
        self
    }

    fn site(&self) -> CallSite<'_> {
        CallSite {
            participant_id: &self.participant_id,
            task_type: self.task_type,
            target: &self.target,
            round: self.round,
            turn: self.turn,
        }
    }
}

/// Text of a completed call, or the transient failure that exhausted retries
#[derive(Debug, Clone)]
pub enum RawReply {
    Text(String),
    Failed(LlmError),
}

/// Sends repair prompts to the model that produced the broken output
struct GatewayRepairer<'a> {
    executor: &'a AgentExecutor,
    call: &'a CallSpec,
    system: &'a str,
    session: Option<&'a str>,
}

#[async_trait]
impl Repairer for GatewayRepairer<'_> {
    async fn repair(&self, prompt: &str) -> Result<String, LlmError> {
        let mut bundle = PromptBundle::new(self.system, "", prompt);
        bundle.session = self.session.map(str::to_string);

        let response = self.executor.gateway.invoke(&self.call.model, &bundle).await?;
        let mut site = self.call.site();
        site.task_type = "repair";
        self.executor.tokens.record(site, &self.call.model, response.usage);
        Ok(response.content)
    }
}

/// Runs single calls against the gateway
#[derive(Debug, Clone)]
pub struct AgentExecutor {
    gateway: Arc<Gateway>,
    tokens: Arc<TokenLog>,
    repair_retries: u32,
}

impl AgentExecutor {
    pub fn new(gateway: Arc<Gateway>, tokens: Arc<TokenLog>, repair_retries: u32) -> Self {
        Self {
            gateway,
            tokens,
            repair_retries,
        }
    }

    pub fn gateway_stats(&self) -> GatewayStats {
        self.gateway.stats()
    }

    /// Invoke without parsing; usage of a successful call is logged
    pub async fn complete(&self, call: &CallSpec, bundle: &PromptBundle) -> Result<RawReply, RunError> {
        match self.gateway.invoke(&call.model, bundle).await {
            Ok(response) => {
                self.tokens.record(call.site(), &call.model, response.usage);
                Ok(RawReply::Text(response.content))
            }
            Err(e) if e.is_permanent() => Err(RunError::Provider(e)),
            Err(e) => {
                tracing::error!(
                    participant = %call.participant_id,
                    task = call.task_type,
                    round = call.round,
                    error = %e,
                    "Call failed after retries, degrading"
                );
                Ok(RawReply::Failed(e))
            }
        }
    }

    /// Invoke and parse as `T`, repairing through the same model
    pub async fn call<T: StructuredResponse>(
        &self,
        call: &CallSpec,
        bundle: &PromptBundle,
    ) -> Result<ParsedResult<T>, RunError> {
        let raw = match self.complete(call, bundle).await? {
            RawReply::Text(text) => text,
            RawReply::Failed(e) => {
                let text = e.to_string();
                return Ok(ParsedResult::degraded(&text, 0, ParseFailure::Provider(text.clone())));
            }
        };

        let repairer = GatewayRepairer {
            executor: self,
            call,
            system: &bundle.system,
            session: bundle.session.as_deref(),
        };
        let parsed = parse_structured::<T>(&raw, &repairer, self.repair_retries).await?;
        if parsed.is_degraded() {
            tracing::warn!(
                participant = %call.participant_id,
                task = call.task_type,
                round = call.round,
                turn = call.turn,
                "Recording degraded result"
            );
        }
        Ok(parsed)
    }
}
