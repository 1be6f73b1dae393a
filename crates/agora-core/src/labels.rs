//! Closed label sets used in structured model output
//!
//! Every label parses case-insensitively and accepts `-` or a space in place
//! of `_`. Anything outside the set is rejected rather than coerced, so the
//! parser can route it into the repair loop.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel written into stance/attitude columns of degraded records.
///
/// Never accepted from model output: it normalizes to `no_response`, which
/// is not a member of any set.
pub const NO_RESPONSE: &str = "no-response";

/// A label that is not a member of its closed set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {set} (expected one of: {expected})")]
pub struct InvalidLabel {
    /// Name of the set
    pub set: &'static str,
    /// The rejected input
    pub value: String,
    /// Slash-separated list of valid labels
    pub expected: String,
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase().replace(['-', ' '], "_")
}

macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $name:ident, $set:literal {
            $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "&'static str")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every member, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire label
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Slash-separated label list for prompt templates
            pub fn choices() -> String {
                Self::ALL
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join("/")
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = InvalidLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = normalize(s);
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == normalized)
                    .ok_or_else(|| InvalidLabel {
                        set: $set,
                        value: s.to_string(),
                        expected: Self::choices(),
                    })
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidLabel;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for &'static str {
            fn from(v: $name) -> Self {
                v.as_str()
            }
        }
    };
}

closed_set! {
    /// A participant's position on the proposal (initial and final opinion)
    Stance, "stance" {
        Support => "support",
        ConditionalSupport => "conditional_support",
        ConditionalOppose => "conditional_oppose",
        Oppose => "oppose",
    }
}

closed_set! {
    /// Attitude attached to a nomination of another participant
    Attitude, "attitude" {
        Empathy => "empathy",
        Criticism => "criticism",
        Citation => "citation",
        Question => "question",
    }
}

closed_set! {
    /// How a listener privately reacted to an utterance
    ReactionType, "reaction type" {
        Empathy => "empathy",
        Criticism => "criticism",
        Citation => "citation",
        Question => "question",
        Ignore => "ignore",
    }
}

closed_set! {
    /// A participant's vote on the planner's compromise
    VoteStance, "vote stance" {
        Accept => "accept",
        ConditionalAccept => "conditional_accept",
        Reject => "reject",
    }
}

impl Stance {
    /// Whether the stance leans toward the proposal
    pub fn is_supportive(&self) -> bool {
        matches!(self, Stance::Support | Stance::ConditionalSupport)
    }
}

impl VoteStance {
    /// Accept and conditional accept both count toward adoption
    pub fn counts_as_accept(&self) -> bool {
        !matches!(self, VoteStance::Reject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_lenient_on_case_and_separator() {
        assert_eq!("Conditional-Support".parse::<Stance>().unwrap(), Stance::ConditionalSupport);
        assert_eq!("conditional support".parse::<Stance>().unwrap(), Stance::ConditionalSupport);
        assert_eq!(" OPPOSE ".parse::<Stance>().unwrap(), Stance::Oppose);
    }

    #[test]
    fn test_sentinel_is_never_a_member() {
        assert!(NO_RESPONSE.parse::<Stance>().is_err());
        assert!(NO_RESPONSE.parse::<ReactionType>().is_err());
        assert!(NO_RESPONSE.parse::<VoteStance>().is_err());
        assert!(NO_RESPONSE.parse::<Attitude>().is_err());
    }

    #[test]
    fn test_invalid_label_reports_choices() {
        let err = "maybe".parse::<VoteStance>().unwrap_err();
        assert_eq!(err.set, "vote stance");
        assert!(err.to_string().contains("accept/conditional_accept/reject"));
    }

    #[test]
    fn test_serde_uses_wire_labels() {
        let json = serde_json::to_string(&ReactionType::Ignore).unwrap();
        assert_eq!(json, "\"ignore\"");
        let back: ReactionType = serde_json::from_str("\"Question\"").unwrap();
        assert_eq!(back, ReactionType::Question);
        assert!(serde_json::from_str::<Attitude>("\"ignore\"").is_err());
    }
}
