//! Run logger
//!
//! Buffers every record in memory and rewrites the full tables on each
//! [`RunLogger::save`]. Saving is safe to call after every unit of work: the
//! latest call always reflects the complete history, and two saves with
//! nothing new in between produce identical bytes.

use crate::records::{record_code, RecordKind, ThinkPayload, ThinkRecord, UtteranceRecord};
use crate::store::{ArtifactStore, StorageError};
use crate::tokens::TokenLog;
use agora_core::{ParticipantRecord, Stance, NO_RESPONSE};
use agora_debate::{nomination, Nomination};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Logger error types
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Duplicate record code: {0}")]
    DuplicateCode(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("CSV error: {0}")]
    Csv(String),
}

impl From<csv::Error> for LogError {
    fn from(e: csv::Error) -> Self {
        LogError::Csv(e.to_string())
    }
}

/// Which opinion phase a stance came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpinionPhase {
    Initial,
    Final,
}

/// Output table kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Debate,
    Think,
    Agents,
    Tokens,
    Consensus,
}

impl Artifact {
    pub const ALL: [Artifact; 5] = [
        Artifact::Debate,
        Artifact::Think,
        Artifact::Agents,
        Artifact::Tokens,
        Artifact::Consensus,
    ];

    /// File name for this artifact in run `set_id` at `level`
    pub fn file_name(&self, set_id: u32, level: u8) -> String {
        let suffix = match self {
            Artifact::Debate => "debate.csv",
            Artifact::Think => "think.csv",
            Artifact::Agents => "agents.csv",
            Artifact::Tokens => "tokens.csv",
            Artifact::Consensus => "consensus.json",
        };
        format!("set{}_lv{}_{}", set_id, level, suffix)
    }
}

pub struct RunLogger {
    set_id: u32,
    level: u8,
    store: Arc<dyn ArtifactStore>,
    utterances: Vec<UtteranceRecord>,
    thinks: Vec<ThinkRecord>,
    codes: HashSet<String>,
    participants: Vec<ParticipantRecord>,
    initial_stances: HashMap<String, Option<Stance>>,
    final_stances: HashMap<String, Option<Stance>>,
    tokens: Arc<TokenLog>,
    consensus: Option<Value>,
}

impl std::fmt::Debug for RunLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLogger")
            .field("set_id", &self.set_id)
            .field("level", &self.level)
            .field("store", &self.store.name())
            .field("utterances", &self.utterances.len())
            .field("thinks", &self.thinks.len())
            .finish()
    }
}

impl RunLogger {
    pub fn new(set_id: u32, level: u8, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            set_id,
            level,
            store,
            utterances: Vec::new(),
            thinks: Vec::new(),
            codes: HashSet::new(),
            participants: Vec::new(),
            initial_stances: HashMap::new(),
            final_stances: HashMap::new(),
            tokens: Arc::new(TokenLog::new()),
            consensus: None,
        }
    }

    /// Shared handle to the token log for worker tasks
    pub fn token_log(&self) -> Arc<TokenLog> {
        self.tokens.clone()
    }

    pub fn file_name(&self, artifact: Artifact) -> String {
        artifact.file_name(self.set_id, self.level)
    }

    fn claim(&mut self, code: String) -> Result<String, LogError> {
        if !self.codes.insert(code.clone()) {
            return Err(LogError::DuplicateCode(code));
        }
        Ok(code)
    }

    /// Record a public utterance; returns its code
    pub fn log_utterance(
        &mut self,
        round: u32,
        turn: u32,
        participant: &ParticipantRecord,
        content: &str,
        nominations: &[Nomination],
        degraded: bool,
    ) -> Result<String, LogError> {
        let code = self.claim(record_code(&participant.id, round, turn, RecordKind::Utterance))?;
        self.utterances.push(UtteranceRecord {
            code: code.clone(),
            round,
            turn,
            participant_id: participant.id.clone(),
            model: participant.assigned_model.clone(),
            is_vulnerable: participant.is_vulnerable,
            persona_summary: participant.persona_summary(),
            content: content.to_string(),
            nominations: nominations.to_vec(),
            degraded,
        });
        tracing::debug!(code = %code, degraded, "Utterance logged");
        Ok(code)
    }

    /// Record a private think entry; returns its code
    pub fn log_think(
        &mut self,
        round: u32,
        turn: u32,
        participant_id: &str,
        payload: ThinkPayload,
        degraded: bool,
    ) -> Result<String, LogError> {
        let code = self.claim(record_code(participant_id, round, turn, RecordKind::Think))?;
        tracing::debug!(code = %code, think_type = payload.think_type(), degraded, "Think logged");
        self.thinks.push(ThinkRecord {
            code: code.clone(),
            round,
            turn,
            participant_id: participant_id.to_string(),
            payload,
            degraded,
        });
        Ok(code)
    }

    /// Set the participant list for the agents table
    pub fn set_participants(&mut self, participants: &[ParticipantRecord]) {
        self.participants = participants.to_vec();
    }

    /// Record an opinion stance; `None` renders as the no-response sentinel
    pub fn record_stance(&mut self, phase: OpinionPhase, participant_id: &str, stance: Option<Stance>) {
        let map = match phase {
            OpinionPhase::Initial => &mut self.initial_stances,
            OpinionPhase::Final => &mut self.final_stances,
        };
        map.insert(participant_id.to_string(), stance);
    }

    pub fn set_consensus(&mut self, consensus: Value) {
        self.consensus = Some(consensus);
    }

    pub fn utterances(&self) -> &[UtteranceRecord] {
        &self.utterances
    }

    pub fn thinks(&self) -> &[ThinkRecord] {
        &self.thinks
    }

    pub fn utterance_count(&self) -> usize {
        self.utterances.len()
    }

    pub fn think_count(&self) -> usize {
        self.thinks.len()
    }

    /// Records flagged degraded across both tables
    pub fn degraded_count(&self) -> usize {
        self.utterances.iter().filter(|r| r.degraded).count() + self.thinks.iter().filter(|r| r.degraded).count()
    }

    fn debate_table(&self) -> Result<Vec<u8>, LogError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "code",
            "set_id",
            "level",
            "round",
            "turn",
            "participant_id",
            "model",
            "is_vulnerable",
            "persona_summary",
            "content",
            "nominations",
            "attitude",
            "degraded",
        ])?;
        for r in &self.utterances {
            writer.write_record([
                r.code.clone(),
                self.set_id.to_string(),
                self.level.to_string(),
                r.round.to_string(),
                r.turn.to_string(),
                r.participant_id.clone(),
                r.model.clone(),
                r.is_vulnerable.to_string(),
                r.persona_summary.clone(),
                r.content.clone(),
                nomination::encode_list(&r.nominations),
                r.attitude_column(),
                r.degraded.to_string(),
            ])?;
        }
        finish(writer)
    }

    fn think_table(&self) -> Result<Vec<u8>, LogError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "code",
            "set_id",
            "level",
            "round",
            "turn",
            "participant_id",
            "think_type",
            "referenced_code",
            "reaction_type",
            "stance",
            "content",
            "degraded",
        ])?;
        for r in &self.thinks {
            writer.write_record([
                r.code.clone(),
                self.set_id.to_string(),
                self.level.to_string(),
                r.round.to_string(),
                r.turn.to_string(),
                r.participant_id.clone(),
                r.payload.think_type().to_string(),
                r.payload.referenced_code().to_string(),
                r.payload.reaction_column(),
                r.payload.stance_column(),
                r.payload.content().to_string(),
                r.degraded.to_string(),
            ])?;
        }
        finish(writer)
    }

    fn agents_table(&self) -> Result<Vec<u8>, LogError> {
        let flattened: Vec<HashMap<String, String>> = self
            .participants
            .iter()
            .map(|p| p.flattened_attributes().into_iter().collect())
            .collect();
        let keys: BTreeSet<&String> = flattened.iter().flat_map(|m| m.keys()).collect();

        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut header = vec![
            "participant_id".to_string(),
            "model".to_string(),
            "is_vulnerable".to_string(),
            "persona_summary".to_string(),
            "initial_stance".to_string(),
            "final_stance".to_string(),
        ];
        header.extend(keys.iter().map(|k| k.to_string()));
        writer.write_record(&header)?;

        for (p, attrs) in self.participants.iter().zip(&flattened) {
            let mut row = vec![
                p.id.clone(),
                p.assigned_model.clone(),
                p.is_vulnerable.to_string(),
                p.persona_summary(),
                stance_cell(self.initial_stances.get(&p.id)),
                stance_cell(self.final_stances.get(&p.id)),
            ];
            row.extend(keys.iter().map(|k| attrs.get(*k).cloned().unwrap_or_default()));
            writer.write_record(&row)?;
        }
        finish(writer)
    }

    fn tokens_table(&self) -> Result<Vec<u8>, LogError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let entries = self.tokens.entries();
        if entries.is_empty() {
            writer.write_record([
                "timestamp",
                "participant_id",
                "model",
                "task_type",
                "target",
                "round",
                "turn",
                "cached_tokens",
                "prompt_tokens",
                "completion_tokens",
            ])?;
        }
        for entry in &entries {
            writer.serialize(entry)?;
        }
        finish(writer)
    }

    /// Rewrite every table in full
    pub async fn save(&self) -> Result<(), LogError> {
        let tables = [
            (Artifact::Debate, self.debate_table()?),
            (Artifact::Think, self.think_table()?),
            (Artifact::Agents, self.agents_table()?),
            (Artifact::Tokens, self.tokens_table()?),
        ];
        for (artifact, bytes) in tables {
            self.store.put(&self.file_name(artifact), bytes).await?;
        }

        if let Some(consensus) = &self.consensus {
            let bytes = serde_json::to_vec_pretty(consensus)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            self.store.put(&self.file_name(Artifact::Consensus), bytes).await?;
        }

        tracing::debug!(
            utterances = self.utterances.len(),
            thinks = self.thinks.len(),
            store = self.store.name(),
            "Run log saved"
        );
        Ok(())
    }
}

fn stance_cell(stance: Option<&Option<Stance>>) -> String {
    match stance {
        Some(Some(s)) => s.to_string(),
        Some(None) => NO_RESPONSE.to_string(),
        None => String::new(),
    }
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, LogError> {
    writer.into_inner().map_err(|e| LogError::Csv(e.to_string()))
}
