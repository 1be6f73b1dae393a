//! Prompt bundle construction
//!
//! A [`PromptBundle`] is rebuilt from a [`MemorySnapshot`] before every call
//! and never persisted. Building it has no side effects.

use serde::{Deserialize, Serialize};

use crate::memory::{MemorySnapshot, ThoughtKind, TimelineEntry};

/// The three text blocks sent to a model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBundle {
    /// Static prefix (guide, rules, local context, persona)
    pub system: String,
    /// Accumulated history and thoughts
    pub history: String,
    /// Current task
    pub task: String,
    /// Cache/session label; providers with explicit prompt caching key on it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

fn section(title: &str, body: &str) -> String {
    format!("[{}]\n{}", title, body)
}

fn render_entry(entry: &TimelineEntry) -> String {
    match entry {
        TimelineEntry::Utterance { speaker_id, content } => format!("[{}]: {}", speaker_id, content),
        TimelineEntry::Thought {
            kind: ThoughtKind::OwnUtterance,
            content,
        } => format!("[Me]: {}", content),
        TimelineEntry::Thought { content, .. } => format!("[My Thought]: {}", content),
    }
}

impl PromptBundle {
    /// Bundle with no accumulated history (planner, repair and batch calls)
    pub fn new(system: &str, history: &str, task: &str) -> Self {
        Self {
            system: system.to_string(),
            history: history.to_string(),
            task: task.to_string(),
            session: None,
        }
    }

    /// Render all memory slots
    pub fn from_snapshot(snapshot: &MemorySnapshot<'_>) -> Self {
        let ctx = snapshot.static_context;
        let system = [
            ("System Context", ctx.system_guide.as_str()),
            ("Debate Rule", ctx.debate_rules.as_str()),
            ("Local Context", ctx.local_context.as_str()),
            ("Your Persona", ctx.persona.as_str()),
        ]
        .iter()
        .filter(|(_, body)| !body.is_empty())
        .map(|(title, body)| section(title, body))
        .collect::<Vec<_>>()
        .join("\n\n");

        let history = if snapshot.timeline.is_empty() {
            section("Timeline", "(empty)")
        } else {
            let lines = snapshot.timeline.iter().map(render_entry).collect::<Vec<_>>();
            section("Timeline", &lines.join("\n"))
        };

        let task = if snapshot.current_task.is_empty() {
            section("Task", "(empty)")
        } else {
            section("Task", snapshot.current_task)
        };

        Self {
            system,
            history,
            task,
            session: None,
        }
    }

    pub fn with_session(mut self, session: &str) -> Self {
        self.session = Some(session.to_string());
        self
    }

    /// History and task joined by a blank line, for single-message providers
    pub fn user_message(&self) -> String {
        if self.history.is_empty() {
            self.task.clone()
        } else {
            format!("{}\n\n{}", self.history, self.task)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::memory::{AgentMemory, StaticContext, ThoughtKind};

    #[test]
    fn test_sections_and_timeline_markers() {
        let mut memory = AgentMemory::new("resident_01", StaticContext::new("guide", "rules", "", "age: 30s"));
        memory.add_thought(ThoughtKind::Narrative, "I moved here in 2010.");
        memory.add_utterance("resident_02", "Rents are rising.").unwrap();
        memory.add_own_utterance("I agree with resident_02.");
        memory.set_task("Reflect on the round.");

        let bundle = memory.prompt_bundle();
        assert_eq!(
            bundle.system,
            "[System Context]\nguide\n\n[Debate Rule]\nrules\n\n[Your Persona]\nage: 30s"
        );
        assert_eq!(
            bundle.history,
            "[Timeline]\n[My Thought]: I moved here in 2010.\n[resident_02]: Rents are rising.\n[Me]: I agree with resident_02."
        );
        assert_eq!(bundle.task, "[Task]\nReflect on the round.");
        assert_eq!(bundle.session.as_deref(), Some("resident_01"));
    }

    #[test]
    fn test_empty_slots_render_placeholders() {
        let memory = AgentMemory::new("resident_01", StaticContext::new("g", "r", "l", "p"));
        let bundle = memory.prompt_bundle();
        assert_eq!(bundle.history, "[Timeline]\n(empty)");
        assert_eq!(bundle.task, "[Task]\n(empty)");
        assert!(bundle.user_message().starts_with("[Timeline]"));
    }

    #[test]
    fn test_building_is_pure() {
        let mut memory = AgentMemory::new("resident_01", StaticContext::new("g", "r", "l", "p"));
        memory.set_task("speak");
        let a = memory.prompt_bundle();
        let b = memory.prompt_bundle();
        assert_eq!(a, b);
        assert_eq!(memory.think_len(), 0);
    }
}
