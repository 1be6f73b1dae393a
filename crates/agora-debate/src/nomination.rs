//! Nominations: references from one utterance to another participant
//!
//! The canonical form is a list of `{target, attitude}` pairs. Older outputs
//! used a single `target` string beside a top-level `attitude`, or a single
//! flat `{target, attitude}` object; both normalize to the list form.

use agora_core::{Attitude, InvalidLabel};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// A reference to another participant, with the speaker's attitude toward them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nomination {
    pub target: String,
    #[serde(default, deserialize_with = "optional_label")]
    pub attitude: Option<Attitude>,
}

impl Nomination {
    pub fn new(target: &str, attitude: Option<Attitude>) -> Self {
        Self {
            target: target.to_string(),
            attitude,
        }
    }
}

fn is_blank(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.eq_ignore_ascii_case("null") || v.eq_ignore_ascii_case("none")
}

/// `null`, `""`, `"null"` and `"none"` read as absent; anything else must be
/// a member of the closed set
pub(crate) fn optional_label<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = InvalidLabel>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(value) if !is_blank(&value) => value.parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct NominationEntry {
    #[serde(default, alias = "id", alias = "participant_id")]
    target: Option<String>,
    #[serde(default, deserialize_with = "optional_label")]
    attitude: Option<Attitude>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NominationItem {
    Target(String),
    Entry(NominationEntry),
}

/// Every accepted encoding of the nomination field
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum NominationField {
    Target(String),
    One(NominationEntry),
    Many(Vec<NominationItem>),
}

impl NominationField {
    /// Flatten into canonical pairs; bare targets take `fallback` as attitude
    pub(crate) fn normalize(self, fallback: Option<Attitude>, out: &mut Vec<Nomination>) {
        let mut push = |target: Option<String>, attitude: Option<Attitude>| {
            if let Some(target) = target.filter(|t| !is_blank(t)) {
                out.push(Nomination {
                    target: target.trim().to_string(),
                    attitude,
                });
            }
        };
        match self {
            NominationField::Target(target) => push(Some(target), fallback),
            NominationField::One(entry) => push(entry.target, entry.attitude.or(fallback)),
            NominationField::Many(items) => {
                for item in items {
                    match item {
                        NominationItem::Target(target) => push(Some(target), fallback),
                        NominationItem::Entry(entry) => push(entry.target, entry.attitude.or(fallback)),
                    }
                }
            }
        }
    }
}

/// Encode for the utterance table's `nominations` column
pub fn encode_list(nominations: &[Nomination]) -> String {
    serde_json::to_string(nominations).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a stored column in either the list or the legacy flat form
pub fn decode_list(encoded: &str) -> Result<Vec<Nomination>, serde_json::Error> {
    if is_blank(encoded) {
        return Ok(Vec::new());
    }
    let field: Option<NominationField> = serde_json::from_str(encoded)?;
    let mut out = Vec::new();
    if let Some(field) = field {
        field.normalize(None, &mut out);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_round_trips_through_column() {
        let noms = vec![
            Nomination::new("resident_02", Some(Attitude::Empathy)),
            Nomination::new("resident_05", None),
        ];
        let encoded = encode_list(&noms);
        assert_eq!(
            encoded,
            r#"[{"target":"resident_02","attitude":"empathy"},{"target":"resident_05","attitude":null}]"#
        );
        assert_eq!(decode_list(&encoded).unwrap(), noms);
    }

    #[test]
    fn test_legacy_flat_object_decodes_to_list() {
        let decoded = decode_list(r#"{"target": "resident_07", "attitude": "Question"}"#).unwrap();
        assert_eq!(decoded, vec![Nomination::new("resident_07", Some(Attitude::Question))]);
    }

    #[test]
    fn test_blank_targets_are_dropped() {
        assert!(decode_list("").unwrap().is_empty());
        assert!(decode_list("null").unwrap().is_empty());
        assert!(decode_list(r#"{"target": "null", "attitude": null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_attitude_is_an_error() {
        assert!(decode_list(r#"[{"target": "resident_01", "attitude": "adoration"}]"#).is_err());
    }
}
