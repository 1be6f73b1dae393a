//! Log record types and code generation

use agora_core::{ReactionType, Stance, VoteStance, NO_RESPONSE};
use agora_debate::Nomination;
use serde::{Deserialize, Serialize};

/// Which record set a code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// Public utterance (`r`)
    Utterance,
    /// Private think record (`t`)
    Think,
}

impl RecordKind {
    pub fn suffix(&self) -> char {
        match self {
            RecordKind::Utterance => 'r',
            RecordKind::Think => 't',
        }
    }
}

/// `{participant}_r{round}_{turn:02}_{r|t}`
pub fn record_code(participant_id: &str, round: u32, turn: u32, kind: RecordKind) -> String {
    format!("{}_r{}_{:02}_{}", participant_id, round, turn, kind.suffix())
}

/// A logged public utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtteranceRecord {
    pub code: String,
    pub round: u32,
    pub turn: u32,
    pub participant_id: String,
    pub model: String,
    pub is_vulnerable: bool,
    pub persona_summary: String,
    pub content: String,
    pub nominations: Vec<Nomination>,
    pub degraded: bool,
}

impl UtteranceRecord {
    /// The `attitude` column: first nomination's attitude, or the sentinel
    /// for degraded records
    pub fn attitude_column(&self) -> String {
        if self.degraded {
            return NO_RESPONSE.to_string();
        }
        self.nominations
            .first()
            .and_then(|n| n.attitude)
            .map(|a| a.to_string())
            .unwrap_or_default()
    }
}

/// Phase-specific think content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "think_type", rename_all = "snake_case")]
pub enum ThinkPayload {
    Narrative {
        content: String,
    },
    Initial {
        stance: Option<Stance>,
        content: String,
    },
    Reaction {
        referenced_code: String,
        reaction_type: Option<ReactionType>,
        content: String,
    },
    Reflection {
        content: String,
    },
    Final {
        stance: Option<Stance>,
        content: String,
    },
    Planner {
        content: String,
    },
    Vote {
        vote: Option<VoteStance>,
        content: String,
    },
}

fn label_or_sentinel<T: std::fmt::Display>(label: &Option<T>) -> String {
    match label {
        Some(l) => l.to_string(),
        None => NO_RESPONSE.to_string(),
    }
}

impl ThinkPayload {
    pub fn think_type(&self) -> &'static str {
        match self {
            ThinkPayload::Narrative { .. } => "narrative",
            ThinkPayload::Initial { .. } => "initial",
            ThinkPayload::Reaction { .. } => "reaction",
            ThinkPayload::Reflection { .. } => "reflection",
            ThinkPayload::Final { .. } => "final",
            ThinkPayload::Planner { .. } => "planner",
            ThinkPayload::Vote { .. } => "vote",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            ThinkPayload::Narrative { content }
            | ThinkPayload::Initial { content, .. }
            | ThinkPayload::Reaction { content, .. }
            | ThinkPayload::Reflection { content }
            | ThinkPayload::Final { content, .. }
            | ThinkPayload::Planner { content }
            | ThinkPayload::Vote { content, .. } => content,
        }
    }

    pub fn referenced_code(&self) -> &str {
        match self {
            ThinkPayload::Reaction { referenced_code, .. } => referenced_code,
            _ => "",
        }
    }

    /// The `reaction_type` column
    pub fn reaction_column(&self) -> String {
        match self {
            ThinkPayload::Reaction { reaction_type, .. } => label_or_sentinel(reaction_type),
            _ => String::new(),
        }
    }

    /// The `stance` column: opinion stance or vote
    pub fn stance_column(&self) -> String {
        match self {
            ThinkPayload::Initial { stance, .. } | ThinkPayload::Final { stance, .. } => label_or_sentinel(stance),
            ThinkPayload::Vote { vote, .. } => label_or_sentinel(vote),
            _ => String::new(),
        }
    }
}

/// A logged private think record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkRecord {
    pub code: String,
    pub round: u32,
    pub turn: u32,
    pub participant_id: String,
    pub payload: ThinkPayload,
    pub degraded: bool,
}
