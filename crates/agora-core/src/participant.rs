//! Participant records
//!
//! A [`ParticipantSpec`] is what persona generation hands us; it may lack a
//! model. Assigning one produces the immutable [`ParticipantRecord`] the
//! controller owns for the rest of the run.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Stable participant identifier (e.g. `resident_07`)
pub type ParticipantId = String;

/// Reserved participant id for the synthesis role
pub const PLANNER_ID: &str = "planner";

/// Participant as produced by persona generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSpec {
    /// Unique, stable identifier for the run
    pub id: ParticipantId,
    /// Model key, if persona generation already chose one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_model: Option<String>,
    /// Opaque persona attributes
    #[serde(default, alias = "persona_attributes")]
    pub persona: BTreeMap<String, Value>,
    /// Whether this is one of the vulnerable profiles
    #[serde(default)]
    pub is_vulnerable: bool,
    /// Short human-readable summary for logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ParticipantSpec {
    /// Minimal spec with no persona attributes
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            assigned_model: None,
            persona: BTreeMap::new(),
            is_vulnerable: false,
            summary: None,
        }
    }

    /// Builder: set a persona attribute
    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.persona.insert(key.to_string(), value.into());
        self
    }

    /// Builder: preassign a model
    pub fn with_model(mut self, model: &str) -> Self {
        self.assigned_model = Some(model.to_string());
        self
    }

    /// Builder: mark as vulnerable
    pub fn vulnerable(mut self) -> Self {
        self.is_vulnerable = true;
        self
    }

    /// Freeze into a record using `model`
    pub fn assign(self, model: &str) -> ParticipantRecord {
        ParticipantRecord {
            id: self.id,
            assigned_model: model.to_string(),
            persona: self.persona,
            is_vulnerable: self.is_vulnerable,
            summary: self.summary,
        }
    }
}

/// Immutable participant record owned by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub id: ParticipantId,
    pub assigned_model: String,
    pub persona: BTreeMap<String, Value>,
    pub is_vulnerable: bool,
    pub summary: Option<String>,
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}={}", k, render_scalar(v)))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) => items.iter().map(render_scalar).collect::<Vec<_>>().join(", "),
        scalar => render_scalar(scalar),
    }
}

impl ParticipantRecord {
    /// Persona as `key: value` lines, for the static persona slot
    pub fn persona_prompt(&self) -> String {
        self.persona
            .iter()
            .map(|(k, v)| format!("{}: {}", k, render_value(v)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One-line description used in the shared-context participant list
    pub fn persona_line(&self) -> String {
        let attrs = self
            .persona
            .iter()
            .map(|(k, v)| format!("{}={}", k, render_value(v)))
            .collect::<Vec<_>>()
            .join(", ");
        if attrs.is_empty() {
            self.id.clone()
        } else {
            format!("{}: {}", self.id, attrs)
        }
    }

    /// Short summary: the explicit one, else the first five scalar values
    pub fn persona_summary(&self) -> String {
        if let Some(summary) = &self.summary {
            return summary.clone();
        }
        self.persona
            .values()
            .filter(|v| !v.is_object() && !v.is_array() && !v.is_null())
            .take(5)
            .map(render_scalar)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Attributes flattened one level (`parent.child`) for tabular output
    pub fn flattened_attributes(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (key, value) in &self.persona {
            match value {
                Value::Object(map) => {
                    for (child, v) in map {
                        out.push((format!("{}.{}", key, child), render_scalar(v)));
                    }
                }
                other => out.push((key.clone(), render_value(other))),
            }
        }
        out
    }
}
