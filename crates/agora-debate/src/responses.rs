//! Structured response shapes for each debate task
//!
//! Each shape knows how to describe itself to the repair loop. Closed-set
//! fields (stance, reaction type, vote) are validated during decode, so an
//! out-of-set label is a parse failure rather than a coerced value.

use agora_core::{Attitude, ReactionType, Stance, VoteStance};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::nomination::{optional_label, Nomination, NominationField};

/// A shape the parser can decode and the repair loop can describe
pub trait StructuredResponse: DeserializeOwned + Send + Sync + 'static {
    /// Short name used in logs
    const NAME: &'static str;

    /// JSON shape shown to the model when asking for a repair
    fn shape() -> String;
}

/// Background narrative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeResponse {
    pub thought: String,
}

impl StructuredResponse for NarrativeResponse {
    const NAME: &'static str = "narrative";

    fn shape() -> String {
        r#"{"thought": "your story"}"#.to_string()
    }
}

/// Initial or final opinion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpinionResponse {
    pub stance: Stance,
    pub thought: String,
}

impl StructuredResponse for OpinionResponse {
    const NAME: &'static str = "opinion";

    fn shape() -> String {
        format!(
            r#"{{"stance": "one of {}", "thought": "your reasons"}}"#,
            Stance::choices()
        )
    }
}

#[derive(Debug, Deserialize)]
struct RawUtterance {
    utterance: String,
    #[serde(default, alias = "nomination")]
    nominations: Option<NominationField>,
    #[serde(default)]
    target: Option<NominationField>,
    #[serde(default, deserialize_with = "optional_label")]
    attitude: Option<Attitude>,
}

/// Public utterance in a speaking turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawUtterance")]
pub struct UtteranceResponse {
    pub utterance: String,
    pub nominations: Vec<Nomination>,
}

impl From<RawUtterance> for UtteranceResponse {
    fn from(raw: RawUtterance) -> Self {
        let mut nominations = Vec::new();
        for field in [raw.nominations, raw.target].into_iter().flatten() {
            field.normalize(raw.attitude, &mut nominations);
        }
        Self {
            utterance: raw.utterance,
            nominations,
        }
    }
}

impl UtteranceResponse {
    /// Attitude of the first nomination, if any
    pub fn primary_attitude(&self) -> Option<Attitude> {
        self.nominations.first().and_then(|n| n.attitude)
    }
}

impl StructuredResponse for UtteranceResponse {
    const NAME: &'static str = "utterance";

    fn shape() -> String {
        format!(
            r#"{{"utterance": "what you say", "nominations": [{{"target": "participant id", "attitude": "one of {}"}}]}}"#,
            Attitude::choices()
        )
    }
}

/// Private reaction to another participant's utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionResponse {
    /// Code the model believes it is reacting to; informational only
    #[serde(default, alias = "code")]
    pub referenced_code: Option<String>,
    pub reaction_type: ReactionType,
    pub thought: String,
}

impl StructuredResponse for ReactionResponse {
    const NAME: &'static str = "reaction";

    fn shape() -> String {
        format!(
            r#"{{"referenced_code": "utterance code", "reaction_type": "one of {}", "thought": "your thoughts"}}"#,
            ReactionType::choices()
        )
    }
}

/// End-of-round reflection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionResponse {
    pub thought: String,
}

impl StructuredResponse for ReflectionResponse {
    const NAME: &'static str = "reflection";

    fn shape() -> String {
        r#"{"thought": "your reflection"}"#.to_string()
    }
}

/// Vote on the planner's compromise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResponse {
    pub vote: VoteStance,
    pub thought: String,
}

impl StructuredResponse for VoteResponse {
    const NAME: &'static str = "vote";

    fn shape() -> String {
        format!(
            r#"{{"vote": "one of {}", "thought": "your reasons"}}"#,
            VoteStance::choices()
        )
    }
}

/// The planner's synthesis. Unknown fields are kept for the consensus file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerResult {
    #[serde(default)]
    pub issues: Vec<String>,
    pub consensus: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StructuredResponse for PlannerResult {
    const NAME: &'static str = "planner";

    fn shape() -> String {
        r#"{"issues": ["contested point", "..."], "consensus": "the compromise proposal"}"#.to_string()
    }
}
