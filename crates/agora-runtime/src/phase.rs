//! Debate phases

use std::fmt;

/// One stage of the fixed phase sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Narrative,
    InitialOpinion,
    Speaking,
    Reaction,
    Reflection,
    FinalOpinion,
    Synthesis,
    Vote,
}

impl Phase {
    /// Phases run in every debate, in order (the round loop covers
    /// speaking through reflection)
    pub const SEQUENCE: [Phase; 8] = [
        Phase::Narrative,
        Phase::InitialOpinion,
        Phase::Speaking,
        Phase::Reaction,
        Phase::Reflection,
        Phase::FinalOpinion,
        Phase::Synthesis,
        Phase::Vote,
    ];

    /// Task type recorded in the token log
    pub fn task_type(&self) -> &'static str {
        match self {
            Phase::Narrative => "narrative",
            Phase::InitialOpinion => "initial",
            Phase::Speaking => "speak",
            Phase::Reaction => "reaction",
            Phase::Reflection => "reflection",
            Phase::FinalOpinion => "final",
            Phase::Synthesis => "synthesize",
            Phase::Vote => "vote",
        }
    }

    /// Whether calls in this phase may run concurrently
    pub fn is_parallel(&self) -> bool {
        !matches!(self, Phase::Speaking | Phase::Synthesis)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Narrative => "NARRATIVE",
            Phase::InitialOpinion => "INITIAL_OPINION",
            Phase::Speaking => "SPEAKING",
            Phase::Reaction => "REACTION",
            Phase::Reflection => "REFLECTION",
            Phase::FinalOpinion => "FINAL_OPINION",
            Phase::Synthesis => "SYNTHESIS",
            Phase::Vote => "VOTE",
        };
        f.write_str(name)
    }
}
