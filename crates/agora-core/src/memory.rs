//! Per-participant agent memory
//!
//! Memory is monotonic for the run: there is no removal operation. Public
//! utterances by *other* participants and the owner's private thoughts share
//! one chronological timeline so prompts read in the order things happened,
//! but the two views ([`AgentMemory::conversation_history`] and
//! [`AgentMemory::think_trace`]) are kept separately countable.

use serde::{Deserialize, Serialize};

use crate::prompt::PromptBundle;

/// Memory mutation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// A participant's own utterance belongs in its think trace
    #[error("participant {0} cannot receive its own utterance as conversation history")]
    OwnUtterance(String),
}

/// The four fixed static slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticContext {
    /// Response-format and behavior guidance
    pub system_guide: String,
    /// Debate background and rules
    pub debate_rules: String,
    /// Local-area context
    pub local_context: String,
    /// Rendered persona description
    pub persona: String,
}

impl StaticContext {
    pub fn new(system_guide: &str, debate_rules: &str, local_context: &str, persona: &str) -> Self {
        Self {
            system_guide: system_guide.to_string(),
            debate_rules: debate_rules.to_string(),
            local_context: local_context.to_string(),
            persona: persona.to_string(),
        }
    }
}

/// Origin of a private think-trace entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtKind {
    Narrative,
    Opinion,
    OwnUtterance,
    Reaction,
    Reflection,
    Vote,
}

/// One timeline item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEntry {
    /// Another participant's public utterance
    Utterance { speaker_id: String, content: String },
    /// The owner's private thought
    Thought { kind: ThoughtKind, content: String },
}

/// Read-only view of every memory slot
#[derive(Debug, Clone, Copy)]
pub struct MemorySnapshot<'a> {
    pub owner_id: &'a str,
    pub static_context: &'a StaticContext,
    pub timeline: &'a [TimelineEntry],
    pub current_task: &'a str,
}

/// Accumulating conversation state owned by exactly one participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMemory {
    owner_id: String,
    static_context: StaticContext,
    timeline: Vec<TimelineEntry>,
    history_len: usize,
    think_len: usize,
    current_task: String,
}

impl AgentMemory {
    /// Create memory for `owner_id` with fixed static slots
    pub fn new(owner_id: &str, static_context: StaticContext) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            static_context,
            timeline: Vec::new(),
            history_len: 0,
            think_len: 0,
            current_task: String::new(),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Append another participant's public utterance
    pub fn add_utterance(&mut self, speaker_id: &str, content: &str) -> Result<(), MemoryError> {
        if speaker_id == self.owner_id {
            return Err(MemoryError::OwnUtterance(speaker_id.to_string()));
        }
        self.timeline.push(TimelineEntry::Utterance {
            speaker_id: speaker_id.to_string(),
            content: content.to_string(),
        });
        self.history_len += 1;
        Ok(())
    }

    /// Append a private thought
    pub fn add_thought(&mut self, kind: ThoughtKind, content: &str) {
        self.timeline.push(TimelineEntry::Thought {
            kind,
            content: content.to_string(),
        });
        self.think_len += 1;
    }

    /// Record the owner's own utterance in its think trace
    pub fn add_own_utterance(&mut self, content: &str) {
        self.add_thought(ThoughtKind::OwnUtterance, content);
    }

    /// Overwrite the current task slot
    pub fn set_task(&mut self, task: &str) {
        self.current_task = task.to_string();
    }

    pub fn snapshot(&self) -> MemorySnapshot<'_> {
        MemorySnapshot {
            owner_id: &self.owner_id,
            static_context: &self.static_context,
            timeline: &self.timeline,
            current_task: &self.current_task,
        }
    }

    /// Build the prompt bundle for the current task, labelled with the owner id
    pub fn prompt_bundle(&self) -> PromptBundle {
        PromptBundle::from_snapshot(&self.snapshot()).with_session(&self.owner_id)
    }

    /// `(speaker_id, content)` pairs in arrival order
    pub fn conversation_history(&self) -> impl Iterator<Item = (&str, &str)> {
        self.timeline.iter().filter_map(|entry| match entry {
            TimelineEntry::Utterance { speaker_id, content } => Some((speaker_id.as_str(), content.as_str())),
            TimelineEntry::Thought { .. } => None,
        })
    }

    /// Private thoughts in order
    pub fn think_trace(&self) -> impl Iterator<Item = (ThoughtKind, &str)> {
        self.timeline.iter().filter_map(|entry| match entry {
            TimelineEntry::Thought { kind, content } => Some((*kind, content.as_str())),
            TimelineEntry::Utterance { .. } => None,
        })
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }

    pub fn think_len(&self) -> usize {
        self.think_len
    }
}
