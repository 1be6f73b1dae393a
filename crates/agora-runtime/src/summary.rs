//! Run summary

use agora_debate::VoteTally;
use agora_llm::{GatewayStats, TokenUsage};
use serde::Serialize;

/// What a completed run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub set_id: u32,
    pub level: u8,
    pub participants: usize,
    pub rounds: u32,
    pub utterances: usize,
    pub think_records: usize,
    /// Records flagged degraded in either table
    pub degraded: usize,
    /// Shared-context rounds whose speaking batch never decoded
    pub skipped_rounds: Vec<u32>,
    pub gateway: GatewayStats,
    pub tokens: TokenUsage,
    pub votes: Option<VoteTally>,
    pub consensus: Option<String>,
}

impl RunSummary {
    /// Majority decision on the compromise, when a vote was held
    pub fn adopted(&self) -> Option<bool> {
        self.votes.as_ref().and_then(VoteTally::adopted)
    }
}
