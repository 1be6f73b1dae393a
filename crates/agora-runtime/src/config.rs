//! Run configuration and input loading

use agora_core::{ParticipantRecord, ParticipantSpec, PLANNER_ID};
use std::collections::HashSet;
use std::path::Path;

use crate::error::RunError;

/// Participant id used for shared-context batch calls in the token log
pub const BATCH_ID: &str = "batch";

/// How participants without a preassigned model get one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelAssignment {
    /// Every participant uses this model key
    Fixed(String),
    /// Seeded uniform choice over the enabled models
    Random { seed: u64 },
}

/// Optional synthesis + vote stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisConfig {
    pub planner_model: String,
    pub planner_guide: String,
}

/// Configuration for one debate run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Experiment set number, used in output file names
    pub set_id: u32,
    /// 1 = shared-context batch mode, 2..=4 = per-agent mode
    pub level: u8,
    /// Inner round count
    pub rounds: u32,
    pub model_assignment: ModelAssignment,
    /// Repair calls per unparseable response
    pub repair_retries: u32,
    pub synthesis: Option<SynthesisConfig>,
    /// Cap on parallel calls within a phase; defaults to the phase size
    pub max_concurrency: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            set_id: 1,
            level: 2,
            rounds: 3,
            model_assignment: ModelAssignment::Fixed("mock".to_string()),
            repair_retries: 2,
            synthesis: None,
            max_concurrency: None,
        }
    }
}

impl RunConfig {
    /// Shared-context batch mode
    pub fn is_batch(&self) -> bool {
        self.level == 1
    }

    pub fn validate(&self) -> Result<(), RunError> {
        if !(1..=4).contains(&self.level) {
            return Err(RunError::Config(format!("level must be 1-4, got {}", self.level)));
        }
        if self.rounds == 0 {
            return Err(RunError::Config("rounds must be at least 1".to_string()));
        }
        if self.max_concurrency == Some(0) {
            return Err(RunError::Config("max_concurrency must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Static context shared by every participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticPrompts {
    pub system_guide: String,
    pub debate_rules: String,
    pub local_context: String,
}

fn read_prompt(dir: &Path, file: &str) -> Result<String, RunError> {
    let path = dir.join(file);
    std::fs::read_to_string(&path)
        .map(|text| text.trim().to_string())
        .map_err(|e| RunError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

impl StaticPrompts {
    pub fn new(system_guide: &str, debate_rules: &str, local_context: &str) -> Self {
        Self {
            system_guide: system_guide.to_string(),
            debate_rules: debate_rules.to_string(),
            local_context: local_context.to_string(),
        }
    }

    /// Load `system_guide.md`, `debate_rule.md` and `local_context.md`
    pub fn load(dir: &Path) -> Result<Self, RunError> {
        Ok(Self {
            system_guide: read_prompt(dir, "system_guide.md")?,
            debate_rules: read_prompt(dir, "debate_rule.md")?,
            local_context: read_prompt(dir, "local_context.md")?,
        })
    }

    /// Load `planner_guide.md`
    pub fn load_planner_guide(dir: &Path) -> Result<String, RunError> {
        read_prompt(dir, "planner_guide.md")
    }
}

fn check_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Result<(), RunError> {
    let mut seen = HashSet::new();
    for id in ids {
        let id = id.trim();
        if id.is_empty() {
            return Err(RunError::Config("participant with empty id".to_string()));
        }
        if id == PLANNER_ID || id == BATCH_ID {
            return Err(RunError::Config(format!("participant id '{}' is reserved", id)));
        }
        if !seen.insert(id) {
            return Err(RunError::Config(format!("duplicate participant id '{}'", id)));
        }
    }
    if seen.is_empty() {
        return Err(RunError::Config("participant list is empty".to_string()));
    }
    Ok(())
}

/// Check ids are present, unique and not reserved
pub fn validate_participants(specs: &[ParticipantSpec]) -> Result<(), RunError> {
    check_ids(specs.iter().map(|spec| spec.id.as_str()))
}

/// Same checks on records that already carry a model
pub fn validate_records(records: &[ParticipantRecord]) -> Result<(), RunError> {
    check_ids(records.iter().map(|record| record.id.as_str()))
}

/// Parse a JSON array of participant records
pub fn parse_participants(json: &str) -> Result<Vec<ParticipantSpec>, RunError> {
    let specs: Vec<ParticipantSpec> =
        serde_json::from_str(json).map_err(|e| RunError::Config(format!("invalid participants file: {}", e)))?;
    validate_participants(&specs)?;
    Ok(specs)
}

/// Read and parse a participants file
pub fn load_participants(path: &Path) -> Result<Vec<ParticipantSpec>, RunError> {
    let json = std::fs::read_to_string(path).map_err(|e| RunError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_participants(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_config() {
        assert!(RunConfig::default().validate().is_ok());

        let bad_level = RunConfig {
            level: 5,
            ..Default::default()
        };
        assert!(matches!(bad_level.validate(), Err(RunError::Config(_))));

        let no_rounds = RunConfig {
            rounds: 0,
            ..Default::default()
        };
        assert!(no_rounds.validate().is_err());
    }

    #[test]
    fn test_parse_participants() {
        let specs = parse_participants(
            r#"[
                {"id": "resident_01", "persona": {"age": "40s"}, "is_vulnerable": false},
                {"id": "resident_02", "assigned_model": "mock", "persona": {}, "is_vulnerable": true}
            ]"#,
        )
        .unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].assigned_model.as_deref(), Some("mock"));
    }

    #[test]
    fn test_rejects_duplicate_and_reserved_ids() {
        let dup = parse_participants(r#"[{"id": "a"}, {"id": "a"}]"#);
        assert!(matches!(dup, Err(RunError::Config(msg)) if msg.contains("duplicate")));

        let reserved = parse_participants(r#"[{"id": "planner"}]"#);
        assert!(matches!(reserved, Err(RunError::Config(msg)) if msg.contains("reserved")));

        assert!(parse_participants("[]").is_err());
    }

    #[test]
    fn test_load_prompts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("system_guide.md"), "guide\n").unwrap();
        std::fs::write(dir.path().join("debate_rule.md"), "rules").unwrap();

        // local_context.md missing
        assert!(matches!(StaticPrompts::load(dir.path()), Err(RunError::Io { .. })));

        std::fs::write(dir.path().join("local_context.md"), "place").unwrap();
        let prompts = StaticPrompts::load(dir.path()).unwrap();
        assert_eq!(prompts, StaticPrompts::new("guide", "rules", "place"));
        assert!(StaticPrompts::load_planner_guide(dir.path()).is_err());
    }
}
