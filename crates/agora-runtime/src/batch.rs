//! Shared-context controller (level 1)
//!
//! One model answers for every participant at once. There is no per-agent
//! memory: a single timeline string accumulates each phase's output and is
//! sent with every call. Failure handling is coarser than per-agent mode. A
//! speaking batch that never decodes is retried as a whole and then the
//! round is skipped; other phases fall back to flagged defaults for every
//! missing participant.

use agora_core::{PromptBundle, ParticipantRecord, Stance, NO_RESPONSE};
use agora_debate::tasks::{batch_narrative_task, batch_opinion_task, batch_speaking_task, batch_vote_task};
use agora_debate::{
    decode_batch, BatchDecoded, BatchFormatFailure, NarrativeResponse, Nomination, OpinionResponse,
    StructuredResponse, UtteranceResponse, VoteResponse, VoteTally,
};
use agora_llm::Gateway;
use agora_persist::{ArtifactStore, OpinionPhase, RunLogger, ThinkPayload};
use std::sync::Arc;

use crate::config::{validate_records, RunConfig, StaticPrompts, BATCH_ID};
use crate::error::RunError;
use crate::executor::{AgentExecutor, CallSpec, RawReply};
use crate::phase::Phase;
use crate::summary::RunSummary;
use crate::synthesis::synthesize;

/// Whole-batch attempts for a speaking round
pub const SPEAKING_BATCH_ATTEMPTS: u32 = 3;

#[derive(Debug)]
pub struct SharedContextController {
    config: RunConfig,
    prompts: StaticPrompts,
    participants: Vec<ParticipantRecord>,
    model: String,
    system: String,
    timeline: String,
    executor: AgentExecutor,
    logger: RunLogger,
    final_opinions: Vec<(String, String)>,
    skipped_rounds: Vec<u32>,
    consensus: Option<String>,
    votes: Option<VoteTally>,
}

impl SharedContextController {
    /// Every participant record must carry `model`
    pub fn new(
        config: RunConfig,
        prompts: StaticPrompts,
        participants: Vec<ParticipantRecord>,
        model: &str,
        gateway: Arc<Gateway>,
        store: Arc<dyn ArtifactStore>,
    ) -> Result<Self, RunError> {
        config.validate()?;
        validate_records(&participants)?;

        let roster = participants
            .iter()
            .map(ParticipantRecord::persona_line)
            .collect::<Vec<_>>()
            .join("\n");
        let system = [
            ("System Context", prompts.system_guide.as_str()),
            ("Debate Rule", prompts.debate_rules.as_str()),
            ("Local Context", prompts.local_context.as_str()),
            ("Participants", roster.as_str()),
        ]
        .iter()
        .filter(|(_, body)| !body.is_empty())
        .map(|(title, body)| format!("[{}]\n{}", title, body))
        .collect::<Vec<_>>()
        .join("\n\n");

        let logger = RunLogger::new(config.set_id, config.level, store);
        let executor = AgentExecutor::new(gateway, logger.token_log(), config.repair_retries);

        Ok(Self {
            config,
            prompts,
            participants,
            model: model.to_string(),
            system,
            timeline: String::new(),
            executor,
            logger,
            final_opinions: Vec::new(),
            skipped_rounds: Vec::new(),
            consensus: None,
            votes: None,
        })
    }

    pub fn logger(&self) -> &RunLogger {
        &self.logger
    }

    /// The shared timeline accumulated so far
    pub fn timeline(&self) -> &str {
        &self.timeline
    }

    pub async fn run(&mut self) -> Result<RunSummary, RunError> {
        tracing::info!(
            set = self.config.set_id,
            participants = self.participants.len(),
            model = %self.model,
            "Shared-context debate started"
        );
        self.logger.set_participants(&self.participants);
        self.logger.save().await?;

        self.narrative_phase().await?;
        self.opinion_phase(OpinionPhase::Initial).await?;
        for round in 1..=self.config.rounds {
            self.speaking_round(round).await?;
        }
        self.opinion_phase(OpinionPhase::Final).await?;

        if let Some(synthesis) = self.config.synthesis.clone() {
            let round = self.config.rounds + 2;
            let text = synthesize(
                &self.executor,
                &mut self.logger,
                &synthesis,
                &self.prompts,
                &self.final_opinions,
                round,
            )
            .await?;
            self.append_timeline("Planner Compromise", &text);
            self.consensus = Some(text);
            self.vote_phase().await?;
        }

        self.logger.save().await?;
        tracing::info!(
            utterances = self.logger.utterance_count(),
            thinks = self.logger.think_count(),
            skipped_rounds = self.skipped_rounds.len(),
            "Shared-context debate completed"
        );

        Ok(RunSummary {
            set_id: self.config.set_id,
            level: self.config.level,
            participants: self.participants.len(),
            rounds: self.config.rounds,
            utterances: self.logger.utterance_count(),
            think_records: self.logger.think_count(),
            degraded: self.logger.degraded_count(),
            skipped_rounds: self.skipped_rounds.clone(),
            gateway: self.executor.gateway_stats(),
            tokens: self.logger.token_log().totals(),
            votes: self.votes,
            consensus: self.consensus.clone(),
        })
    }

    fn append_timeline(&mut self, section: &str, body: &str) {
        if !self.timeline.is_empty() {
            self.timeline.push_str("\n\n");
        }
        self.timeline.push_str(&format!("[{}]\n{}", section, body));
    }

    fn ids(&self) -> Vec<&str> {
        self.participants.iter().map(|p| p.id.as_str()).collect()
    }

    async fn batch_call<T: StructuredResponse>(
        &self,
        phase: Phase,
        round: u32,
        task: &str,
    ) -> Result<Result<BatchDecoded<T>, BatchFormatFailure>, RunError> {
        let bundle = PromptBundle::new(&self.system, &self.timeline, task).with_session(BATCH_ID);
        let call = CallSpec::new(BATCH_ID, &self.model, phase.task_type(), round, 0);

        let decoded = match self.executor.complete(&call, &bundle).await? {
            RawReply::Text(text) => decode_batch::<T>(&text),
            RawReply::Failed(e) => Err(BatchFormatFailure(e.to_string())),
        };
        if let Ok(batch) = &decoded {
            for reason in &batch.rejected {
                tracing::warn!(%phase, round, reason = %reason, "Batch item rejected");
            }
        }
        Ok(decoded)
    }

    /// Decoded batch, or an empty one when the call or decode failed
    async fn batch_or_empty<T: StructuredResponse>(
        &self,
        phase: Phase,
        round: u32,
        task: &str,
    ) -> Result<BatchDecoded<T>, RunError> {
        Ok(self.batch_call(phase, round, task).await?.unwrap_or_else(|failure| {
            tracing::error!(%phase, round, error = %failure, "Batch unusable, every participant takes the default");
            BatchDecoded {
                items: Default::default(),
                rejected: Vec::new(),
            }
        }))
    }

    async fn narrative_phase(&mut self) -> Result<(), RunError> {
        tracing::info!(phase = %Phase::Narrative, "Generating narratives (batch)");
        let task = batch_narrative_task(&self.ids());
        let mut batch = self.batch_or_empty::<NarrativeResponse>(Phase::Narrative, 0, &task).await?;

        let mut lines = Vec::new();
        for (k, participant) in self.participants.iter().enumerate() {
            let (content, degraded) = match batch.take(&participant.id) {
                Some(v) => (v.thought, false),
                None => (String::new(), true),
            };
            lines.push(format!("{}: {}", participant.id, content));
            self.logger
                .log_think(0, k as u32 + 1, &participant.id, ThinkPayload::Narrative { content }, degraded)?;
        }
        self.logger.save().await?;
        self.append_timeline("Narratives", &lines.join("\n"));
        Ok(())
    }

    async fn opinion_phase(&mut self, which: OpinionPhase) -> Result<(), RunError> {
        let n = self.participants.len() as u32;
        let (phase, round, first_turn, title) = match which {
            OpinionPhase::Initial => (Phase::InitialOpinion, 0, n + 1, "Initial Opinions"),
            OpinionPhase::Final => (Phase::FinalOpinion, self.config.rounds + 1, 1, "Final Opinions"),
        };
        tracing::info!(%phase, "Forming opinions (batch)");
        let task = batch_opinion_task(&self.ids(), which == OpinionPhase::Final);
        let mut batch = self.batch_or_empty::<OpinionResponse>(phase, round, &task).await?;

        let mut lines = Vec::new();
        for (k, participant) in self.participants.iter().enumerate() {
            let (stance, content, degraded): (Option<Stance>, String, bool) = match batch.take(&participant.id) {
                Some(v) => (Some(v.stance), v.thought, false),
                None => (None, String::new(), true),
            };
            let label = stance.map(|s| s.as_str()).unwrap_or(NO_RESPONSE);
            let line = format!("[{}] {}", label, content);
            lines.push(format!("{}: {}", participant.id, line));

            self.logger.record_stance(which, &participant.id, stance);
            let payload = match which {
                OpinionPhase::Initial => ThinkPayload::Initial { stance, content },
                OpinionPhase::Final => {
                    self.final_opinions.push((participant.id.clone(), line));
                    ThinkPayload::Final { stance, content }
                }
            };
            self.logger
                .log_think(round, first_turn + k as u32, &participant.id, payload, degraded)?;
        }
        self.logger.save().await?;
        self.append_timeline(title, &lines.join("\n"));
        Ok(())
    }

    async fn speaking_round(&mut self, round: u32) -> Result<(), RunError> {
        tracing::info!(round, phase = %Phase::Speaking, "Round started (batch)");
        let task = batch_speaking_task(round, &self.ids());

        let mut speeches = None;
        for attempt in 1..=SPEAKING_BATCH_ATTEMPTS {
            match self.batch_call::<UtteranceResponse>(Phase::Speaking, round, &task).await? {
                Ok(batch) => {
                    speeches = Some(batch);
                    break;
                }
                Err(failure) => tracing::warn!(
                    round,
                    attempt,
                    max_attempts = SPEAKING_BATCH_ATTEMPTS,
                    error = %failure,
                    "Speaking batch unusable, retrying"
                ),
            }
        }

        let section = format!("Round {}", round);
        let Some(mut speeches) = speeches else {
            tracing::error!(round, attempts = SPEAKING_BATCH_ATTEMPTS, "Speaking batch failed, skipping round");
            self.skipped_rounds.push(round);
            self.logger.save().await?;
            self.append_timeline(&section, "(no speeches)");
            return Ok(());
        };

        let mut lines = Vec::new();
        for (k, participant) in self.participants.iter().enumerate() {
            let (content, nominations, degraded) = match speeches.take(&participant.id) {
                Some(v) => (v.utterance, v.nominations, false),
                None => (String::new(), Vec::new(), true),
            };
            lines.push(format!(
                "{}: {} (nominations: {})",
                participant.id,
                content,
                describe_nominations(&nominations)
            ));
            self.logger
                .log_utterance(round, k as u32 + 1, participant, &content, &nominations, degraded)?;
        }
        self.logger.save().await?;
        self.append_timeline(&section, &lines.join("\n"));
        Ok(())
    }

    async fn vote_phase(&mut self) -> Result<(), RunError> {
        tracing::info!(phase = %Phase::Vote, "Voting on compromise (batch)");
        let round = self.config.rounds + 2;
        let task = batch_vote_task(&self.ids());
        let mut batch = self.batch_or_empty::<VoteResponse>(Phase::Vote, round, &task).await?;

        let mut tally = VoteTally::new();
        for (k, participant) in self.participants.iter().enumerate() {
            let (vote, content, degraded) = match batch.take(&participant.id) {
                Some(v) => (Some(v.vote), v.thought, false),
                None => (None, String::new(), true),
            };
            tally.record(vote);
            self.logger
                .log_think(round, k as u32 + 2, &participant.id, ThinkPayload::Vote { vote, content }, degraded)?;
        }
        self.logger.save().await?;
        self.votes = Some(tally);
        Ok(())
    }
}

fn describe_nominations(nominations: &[Nomination]) -> String {
    if nominations.is_empty() {
        return "none".to_string();
    }
    nominations
        .iter()
        .map(|n| match n.attitude {
            Some(attitude) => format!("{}({})", n.target, attitude),
            None => n.target.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
