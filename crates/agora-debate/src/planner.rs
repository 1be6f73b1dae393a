//! Synthesis input compilation
//!
//! The planner sees no per-agent memory: its bundle is rebuilt from the
//! logged utterances (grouped by round) and the final opinions.

use agora_core::PromptBundle;
use std::collections::BTreeMap;

use crate::tasks::planner_task;

/// Group `(round, speaker, content)` triples into a round-by-round transcript
pub fn compile_transcript<'a, I>(utterances: I) -> String
where
    I: IntoIterator<Item = (u32, &'a str, &'a str)>,
{
    let mut rounds: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for (round, speaker, content) in utterances {
        rounds
            .entry(round)
            .or_default()
            .push(format!("{}: {}", speaker, content));
    }

    let mut lines = Vec::new();
    for (round, entries) in rounds {
        lines.push(format!("=== Round {} ===", round));
        lines.extend(entries);
    }
    lines.join("\n")
}

/// `id: opinion` lines in the given order
pub fn compile_opinions<'a, I>(opinions: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    opinions
        .into_iter()
        .map(|(id, text)| format!("{}: {}", id, text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Everything the planner needs, in one bundle
pub fn planner_bundle(
    planner_guide: &str,
    debate_rules: &str,
    local_context: &str,
    transcript: &str,
    opinions: &str,
) -> PromptBundle {
    let mut history = String::new();
    if !debate_rules.is_empty() {
        history.push_str(&format!("[Debate Agenda and Proposal]\n{}\n\n", debate_rules));
    }
    if !local_context.is_empty() {
        history.push_str(&format!("[Local Context]\n{}\n\n", local_context));
    }
    history.push_str(&format!("[Debate Transcript]\n{}\n\n[Final Opinions]\n{}", transcript, opinions));

    PromptBundle::new(planner_guide, &history, &format!("[Task]\n{}", planner_task()))
}
