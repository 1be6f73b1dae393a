//! Batch decoding for shared-context mode
//!
//! One call answers for every participant. The response must contain a JSON
//! array: bare, under an object field, or as the first balanced `[...]` span.
//! Among an object's array fields the one whose items carry participant ids
//! wins. Items are decoded one by one, so a single bad item only costs that
//! participant; a response with no array or no usable item is unusable as a
//! whole.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::parser::{first_balanced, strip_fences};
use crate::responses::StructuredResponse;

/// The response held no usable array or no usable item
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unusable batch response: {0}")]
pub struct BatchFormatFailure(pub String);

/// Per-participant items decoded from one batch response
#[derive(Debug, Clone)]
pub struct BatchDecoded<T> {
    /// Decoded items keyed by participant id; the first item per id wins
    pub items: BTreeMap<String, T>,
    /// Items that could not be decoded, with the reason
    pub rejected: Vec<String>,
}

impl<T> BatchDecoded<T> {
    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.get(id)
    }

    pub fn take(&mut self, id: &str) -> Option<T> {
        self.items.remove(id)
    }
}

fn array_in(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => {
            let mut arrays: Vec<Vec<Value>> = map
                .into_iter()
                .filter_map(|(_, v)| match v {
                    Value::Array(items) => Some(items),
                    _ => None,
                })
                .collect();
            match arrays.iter().position(|items| items.iter().any(|item| item_id(item).is_some())) {
                Some(index) => Some(arrays.swap_remove(index)),
                None => arrays.into_iter().next(),
            }
        }
        _ => None,
    }
}

fn locate_array(raw: &str) -> Option<Vec<Value>> {
    let stripped = strip_fences(raw);
    for text in [raw.trim(), stripped] {
        if let Some(items) = serde_json::from_str::<Value>(text).ok().and_then(array_in) {
            return Some(items);
        }
    }
    let span = first_balanced(stripped, '[', ']')?;
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    }
}

fn item_id(item: &Value) -> Option<String> {
    ["id", "participant_id", "resident_id"]
        .iter()
        .find_map(|key| item.get(*key).and_then(Value::as_str))
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

/// Decode a batch response into per-participant items
pub fn decode_batch<T: StructuredResponse>(raw: &str) -> Result<BatchDecoded<T>, BatchFormatFailure> {
    let preview = || raw.chars().take(120).collect::<String>();
    let items = locate_array(raw).ok_or_else(|| BatchFormatFailure(format!("no JSON array in {}", preview())))?;

    let mut decoded = BatchDecoded {
        items: BTreeMap::new(),
        rejected: Vec::new(),
    };

    for (index, item) in items.into_iter().enumerate() {
        let Some(id) = item_id(&item) else {
            decoded.rejected.push(format!("item {} has no participant id", index));
            continue;
        };
        if decoded.items.contains_key(&id) {
            decoded.rejected.push(format!("duplicate item for {}", id));
            continue;
        }
        match serde_json::from_value::<T>(item) {
            Ok(value) => {
                decoded.items.insert(id, value);
            }
            Err(e) => {
                tracing::warn!(shape = T::NAME, participant = %id, error = %e, "Dropping invalid batch item");
                decoded.rejected.push(format!("{}: {}", id, e));
            }
        }
    }

    if decoded.items.is_empty() {
        return Err(BatchFormatFailure(format!(
            "no usable item ({}) in {}",
            decoded.rejected.join("; "),
            preview()
        )));
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responses::{OpinionResponse, UtteranceResponse};
    use agora_core::Stance;

    #[test]
    fn test_bare_array() {
        let raw = r#"[{"id": "resident_01", "stance": "support", "thought": "a"},
                      {"id": "resident_02", "stance": "oppose", "thought": "b"}]"#;
        let decoded = decode_batch::<OpinionResponse>(raw).unwrap();
        assert_eq!(decoded.items.len(), 2);
        assert_eq!(decoded.get("resident_02").unwrap().stance, Stance::Oppose);
    }

    #[test]
    fn test_array_under_object_field_in_fence() {
        let raw = "```json\n{\"responses\": [{\"id\": \"resident_01\", \"utterance\": \"hi\", \"target\": \"resident_02\", \"attitude\": \"empathy\"}]}\n```";
        let decoded = decode_batch::<UtteranceResponse>(raw).unwrap();
        assert_eq!(decoded.get("resident_01").unwrap().nominations.len(), 1);
    }

    #[test]
    fn test_array_embedded_in_prose() {
        let raw = r#"Here you go: [{"id": "resident_03", "stance": "Conditional Oppose", "thought": "c"}] done"#;
        let decoded = decode_batch::<OpinionResponse>(raw).unwrap();
        assert_eq!(decoded.get("resident_03").unwrap().stance, Stance::ConditionalOppose);
    }

    #[test]
    fn test_bad_items_are_dropped_individually() {
        let raw = r#"[{"id": "resident_01", "stance": "support", "thought": "a"},
                      {"id": "resident_02", "stance": "undecided", "thought": "b"},
                      {"stance": "support", "thought": "anonymous"}]"#;
        let decoded = decode_batch::<OpinionResponse>(raw).unwrap();
        assert_eq!(decoded.items.len(), 1);
        assert_eq!(decoded.rejected.len(), 2);
    }

    #[test]
    fn test_array_of_items_wins_over_other_array_fields() {
        let raw = r#"{"speeches": [{"id": "resident_01", "utterance": "More buses.", "nominations": []},
                                   {"id": "resident_02", "utterance": "Fewer cars.", "nominations": []}],
                      "agenda": ["rent"]}"#;
        let decoded = decode_batch::<UtteranceResponse>(raw).unwrap();
        assert_eq!(decoded.items.len(), 2);
        assert_eq!(decoded.get("resident_02").unwrap().utterance, "Fewer cars.");
    }

    #[test]
    fn test_batch_without_usable_items_is_a_format_failure() {
        assert!(decode_batch::<OpinionResponse>("[]").is_err());
        assert!(decode_batch::<OpinionResponse>(r#"{"agenda": ["rent", "transit"]}"#).is_err());

        let err = decode_batch::<OpinionResponse>(r#"[{"stance": "support", "thought": "anonymous"}]"#).unwrap_err();
        assert!(err.0.contains("item 0 has no participant id"));
    }

    #[test]
    fn test_no_array_is_a_format_failure() {
        assert!(decode_batch::<OpinionResponse>(r#"{"stance": "support", "thought": "x"}"#).is_err());
        assert!(decode_batch::<OpinionResponse>("I cannot do that.").is_err());
    }
}
