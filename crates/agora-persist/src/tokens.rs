//! Token usage log, shared across parallel phase tasks

use agora_llm::TokenUsage;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// One model call's usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub timestamp: String,
    pub participant_id: String,
    pub model: String,
    pub task_type: String,
    /// Code or participant the call was about, if any
    pub target: String,
    pub round: u32,
    pub turn: u32,
    pub cached_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Where in the run a call happened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallSite<'a> {
    pub participant_id: &'a str,
    pub task_type: &'a str,
    pub target: &'a str,
    pub round: u32,
    pub turn: u32,
}

/// Append-only usage log. Workers hold an `Arc<TokenLog>` and record from
/// inside their own tasks.
#[derive(Debug, Default)]
pub struct TokenLog {
    entries: Mutex<Vec<TokenEntry>>,
}

impl TokenLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, site: CallSite<'_>, model: &str, usage: TokenUsage) {
        let entry = TokenEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            participant_id: site.participant_id.to_string(),
            model: model.to_string(),
            task_type: site.task_type.to_string(),
            target: site.target.to_string(),
            round: site.round,
            turn: site.turn,
            cached_tokens: usage.cached_tokens,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        };
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }

    /// Copy of all entries in recording order
    pub fn entries(&self) -> Vec<TokenEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summed usage over every entry
    pub fn totals(&self) -> TokenUsage {
        self.entries().iter().fold(TokenUsage::default(), |acc, e| TokenUsage {
            cached_tokens: acc.cached_tokens + e.cached_tokens,
            prompt_tokens: acc.prompt_tokens + e.prompt_tokens,
            completion_tokens: acc.completion_tokens + e.completion_tokens,
        })
    }
}
