//! Phase controller for per-agent mode (levels 2-4)
//!
//! Every participant owns an [`AgentMemory`]. Parallel phases build all
//! prompt bundles first, then fan the calls out through the worker pool and
//! apply results only after the last one has returned, iterating the
//! canonical participant order so turn numbers are reproducible. Speaking is
//! strictly sequential: an utterance reaches every other memory before the
//! next speaker's bundle is built.

use agora_core::{
    AgentMemory, ParticipantRecord, StaticContext, ThoughtKind, NO_RESPONSE, PLANNER_ID,
};
use agora_debate::tasks::{
    final_opinion_task, initial_opinion_task, narrative_task, reaction_task, reflection_task, speaking_task,
    vote_task,
};
use agora_debate::{
    NarrativeResponse, OpinionResponse, ParsedResult, ReactionResponse, ReflectionResponse, StructuredResponse,
    UtteranceResponse, VoteResponse, VoteTally,
};
use agora_llm::Gateway;
use agora_persist::{ArtifactStore, OpinionPhase, RunLogger, ThinkPayload};
use std::sync::Arc;

use crate::config::{validate_records, RunConfig, StaticPrompts, SynthesisConfig};
use crate::error::RunError;
use crate::executor::{AgentExecutor, CallSpec};
use crate::phase::Phase;
use crate::pool::WorkerPool;
use crate::summary::RunSummary;
use crate::synthesis::synthesize;

/// Drives one per-agent debate run
#[derive(Debug)]
pub struct DebateController {
    config: RunConfig,
    prompts: StaticPrompts,
    participants: Vec<ParticipantRecord>,
    memories: Vec<AgentMemory>,
    executor: AgentExecutor,
    pool: WorkerPool,
    logger: RunLogger,
    final_opinions: Vec<(String, String)>,
    consensus: Option<String>,
    votes: Option<VoteTally>,
}

impl DebateController {
    pub fn new(
        config: RunConfig,
        prompts: StaticPrompts,
        participants: Vec<ParticipantRecord>,
        gateway: Arc<Gateway>,
        store: Arc<dyn ArtifactStore>,
    ) -> Result<Self, RunError> {
        config.validate()?;
        validate_records(&participants)?;

        let memories = participants
            .iter()
            .map(|p| {
                let context = StaticContext::new(
                    &prompts.system_guide,
                    &prompts.debate_rules,
                    &prompts.local_context,
                    &p.persona_prompt(),
                );
                AgentMemory::new(&p.id, context)
            })
            .collect();

        let logger = RunLogger::new(config.set_id, config.level, store);
        let executor = AgentExecutor::new(gateway, logger.token_log(), config.repair_retries);
        let pool = WorkerPool::new(config.max_concurrency);

        Ok(Self {
            config,
            prompts,
            participants,
            memories,
            executor,
            pool,
            logger,
            final_opinions: Vec::new(),
            consensus: None,
            votes: None,
        })
    }

    pub fn participants(&self) -> &[ParticipantRecord] {
        &self.participants
    }

    /// Memory of participant `id`
    pub fn memory(&self, id: &str) -> Option<&AgentMemory> {
        self.memories.iter().find(|m| m.owner_id() == id)
    }

    pub fn logger(&self) -> &RunLogger {
        &self.logger
    }

    /// Run every phase to completion
    pub async fn run(&mut self) -> Result<RunSummary, RunError> {
        tracing::info!(
            set = self.config.set_id,
            level = self.config.level,
            participants = self.participants.len(),
            rounds = self.config.rounds,
            "Debate started"
        );
        self.logger.set_participants(&self.participants);
        self.logger.save().await?;

        self.narrative_phase().await?;
        self.opinion_phase(OpinionPhase::Initial).await?;

        for round in 1..=self.config.rounds {
            self.debate_round(round).await?;
        }

        self.opinion_phase(OpinionPhase::Final).await?;

        if let Some(synthesis) = self.config.synthesis.clone() {
            self.synthesis_phase(&synthesis).await?;
            self.vote_phase().await?;
        }

        self.logger.save().await?;
        tracing::info!(
            utterances = self.logger.utterance_count(),
            thinks = self.logger.think_count(),
            degraded = self.logger.degraded_count(),
            "Debate completed"
        );
        Ok(self.summary())
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            set_id: self.config.set_id,
            level: self.config.level,
            participants: self.participants.len(),
            rounds: self.config.rounds,
            utterances: self.logger.utterance_count(),
            think_records: self.logger.think_count(),
            degraded: self.logger.degraded_count(),
            skipped_rounds: Vec::new(),
            gateway: self.executor.gateway_stats(),
            tokens: self.logger.token_log().totals(),
            votes: self.votes,
            consensus: self.consensus.clone(),
        }
    }

    /// Build bundles for `members`, run them through the pool, and return
    /// results in `members` order. Turn `first_turn + k` goes to member `k`.
    async fn fan_out<T, F>(
        &mut self,
        phase: Phase,
        round: u32,
        first_turn: u32,
        members: &[usize],
        target: &str,
        task_for: F,
    ) -> Result<Vec<ParsedResult<T>>, RunError>
    where
        T: StructuredResponse,
        F: Fn(&ParticipantRecord) -> String,
    {
        let mut jobs = Vec::with_capacity(members.len());
        for (k, &i) in members.iter().enumerate() {
            let participant = &self.participants[i];
            let memory = &mut self.memories[i];
            memory.set_task(&task_for(participant));
            let bundle = memory.prompt_bundle();

            let call = CallSpec::new(
                &participant.id,
                &participant.assigned_model,
                phase.task_type(),
                round,
                first_turn + k as u32,
            )
            .with_target(target);
            let executor = self.executor.clone();
            jobs.push(async move { executor.call::<T>(&call, &bundle).await });
        }

        tracing::debug!(%phase, round, calls = jobs.len(), "Phase dispatched");
        self.pool.run_all(jobs).await?.into_iter().collect()
    }

    fn everyone(&self) -> Vec<usize> {
        (0..self.participants.len()).collect()
    }

    async fn narrative_phase(&mut self) -> Result<(), RunError> {
        tracing::info!(phase = %Phase::Narrative, "Generating narratives");
        let members = self.everyone();
        let results = self
            .fan_out::<NarrativeResponse, _>(Phase::Narrative, 0, 1, &members, "", |_| narrative_task())
            .await?;

        for (k, (&i, parsed)) in members.iter().zip(results).enumerate() {
            let degraded = parsed.degraded;
            let content = match parsed.value {
                Some(v) => v.thought,
                None => parsed.raw,
            };
            self.memories[i].add_thought(ThoughtKind::Narrative, &content);
            let id = &self.participants[i].id;
            self.logger
                .log_think(0, k as u32 + 1, id, ThinkPayload::Narrative { content }, degraded)?;
        }
        self.logger.save().await?;
        Ok(())
    }

    async fn opinion_phase(&mut self, which: OpinionPhase) -> Result<(), RunError> {
        let n = self.participants.len() as u32;
        let (phase, round, first_turn) = match which {
            OpinionPhase::Initial => (Phase::InitialOpinion, 0, n + 1),
            OpinionPhase::Final => (Phase::FinalOpinion, self.config.rounds + 1, 1),
        };
        tracing::info!(%phase, "Forming opinions");

        let members = self.everyone();
        let results = self
            .fan_out::<OpinionResponse, _>(phase, round, first_turn, &members, "", |_| match which {
                OpinionPhase::Initial => initial_opinion_task(),
                OpinionPhase::Final => final_opinion_task(),
            })
            .await?;

        for (k, (&i, parsed)) in members.iter().zip(results).enumerate() {
            let degraded = parsed.degraded;
            let (stance, content) = match parsed.value {
                Some(v) => (Some(v.stance), v.thought),
                None => (None, parsed.raw),
            };
            let label = stance.map(|s| s.as_str()).unwrap_or(NO_RESPONSE);
            let line = format!("[{}] {}", label, content);
            let id = self.participants[i].id.clone();

            self.memories[i].add_thought(ThoughtKind::Opinion, &line);
            self.logger.record_stance(which, &id, stance);
            tracing::info!(participant = %id, stance = label, "{} stance", phase);

            let payload = match which {
                OpinionPhase::Initial => ThinkPayload::Initial { stance, content },
                OpinionPhase::Final => {
                    self.final_opinions.push((id.clone(), line));
                    ThinkPayload::Final { stance, content }
                }
            };
            self.logger.log_think(round, first_turn + k as u32, &id, payload, degraded)?;
        }
        self.logger.save().await?;
        Ok(())
    }

    async fn debate_round(&mut self, round: u32) -> Result<(), RunError> {
        tracing::info!(round, "Round started");
        let n = self.participants.len();
        // Spans reactions and reflections; separate from utterance turns
        let mut think_turn = 0u32;

        for speaker in 0..n {
            let turn = speaker as u32 + 1;
            let (code, content) = self.speaking_turn(round, turn, speaker).await?;

            let listeners: Vec<usize> = (0..n).filter(|&i| i != speaker).collect();
            if listeners.is_empty() {
                continue;
            }
            let speaker_id = self.participants[speaker].id.clone();
            let results = self
                .fan_out::<ReactionResponse, _>(Phase::Reaction, round, think_turn + 1, &listeners, &code, |listener| {
                    reaction_task(&listener.id, &speaker_id, &code, &content)
                })
                .await?;

            for (&i, parsed) in listeners.iter().zip(results) {
                think_turn += 1;
                let degraded = parsed.degraded;
                let (reaction_type, thought) = match parsed.value {
                    Some(v) => (Some(v.reaction_type), v.thought),
                    None => (None, parsed.raw),
                };
                self.memories[i].add_thought(ThoughtKind::Reaction, &thought);
                let payload = ThinkPayload::Reaction {
                    referenced_code: code.clone(),
                    reaction_type,
                    content: thought,
                };
                let id = &self.participants[i].id;
                self.logger.log_think(round, think_turn, id, payload, degraded)?;
            }
            self.logger.save().await?;
        }

        tracing::info!(round, phase = %Phase::Reflection, "Round reflection");
        let members = self.everyone();
        let results = self
            .fan_out::<ReflectionResponse, _>(Phase::Reflection, round, think_turn + 1, &members, "", |p| {
                reflection_task(&p.id, round)
            })
            .await?;

        for (&i, parsed) in members.iter().zip(results) {
            think_turn += 1;
            let degraded = parsed.degraded;
            let content = match parsed.value {
                Some(v) => v.thought,
                None => parsed.raw,
            };
            self.memories[i].add_thought(ThoughtKind::Reflection, &content);
            let id = &self.participants[i].id;
            self.logger
                .log_think(round, think_turn, id, ThinkPayload::Reflection { content }, degraded)?;
        }
        self.logger.save().await?;
        Ok(())
    }

    /// One sequential speaking turn. The utterance is logged and committed to
    /// every memory before this returns.
    async fn speaking_turn(&mut self, round: u32, turn: u32, speaker: usize) -> Result<(String, String), RunError> {
        let participant = &self.participants[speaker];
        let memory = &mut self.memories[speaker];
        memory.set_task(&speaking_task(round));
        let bundle = memory.prompt_bundle();
        let call = CallSpec::new(
            &participant.id,
            &participant.assigned_model,
            Phase::Speaking.task_type(),
            round,
            turn,
        );

        let parsed = self.executor.call::<UtteranceResponse>(&call, &bundle).await?;
        let degraded = parsed.degraded;
        let (content, nominations) = match parsed.value {
            Some(v) => (v.utterance, v.nominations),
            None => (parsed.raw, Vec::new()),
        };

        let participant = &self.participants[speaker];
        let code = self
            .logger
            .log_utterance(round, turn, participant, &content, &nominations, degraded)?;
        tracing::debug!(code = %code, speaker = %participant.id, degraded, "Utterance committed");

        let speaker_id = participant.id.clone();
        for (i, memory) in self.memories.iter_mut().enumerate() {
            if i == speaker {
                memory.add_own_utterance(&content);
            } else {
                memory.add_utterance(&speaker_id, &content)?;
            }
        }
        self.logger.save().await?;
        Ok((code, content))
    }

    async fn synthesis_phase(&mut self, synthesis: &SynthesisConfig) -> Result<(), RunError> {
        let round = self.config.rounds + 2;
        let text = synthesize(
            &self.executor,
            &mut self.logger,
            synthesis,
            &self.prompts,
            &self.final_opinions,
            round,
        )
        .await?;

        for memory in &mut self.memories {
            memory.add_utterance(PLANNER_ID, &text)?;
        }
        self.consensus = Some(text);
        Ok(())
    }

    async fn vote_phase(&mut self) -> Result<(), RunError> {
        tracing::info!(phase = %Phase::Vote, "Voting on compromise");
        let round = self.config.rounds + 2;
        let members = self.everyone();
        let results = self
            .fan_out::<VoteResponse, _>(Phase::Vote, round, 2, &members, PLANNER_ID, |p| vote_task(&p.id))
            .await?;

        let mut tally = VoteTally::new();
        for (k, (&i, parsed)) in members.iter().zip(results).enumerate() {
            let degraded = parsed.degraded;
            let (vote, content) = match parsed.value {
                Some(v) => (Some(v.vote), v.thought),
                None => (None, parsed.raw),
            };
            tally.record(vote);
            let label = vote.map(|v| v.as_str()).unwrap_or(NO_RESPONSE);
            self.memories[i].add_thought(ThoughtKind::Vote, &format!("[{}] {}", label, content));

            let id = &self.participants[i].id;
            tracing::info!(participant = %id, vote = label, "Vote cast");
            self.logger
                .log_think(round, k as u32 + 2, id, ThinkPayload::Vote { vote, content }, degraded)?;
        }
        self.logger.save().await?;

        tracing::info!(
            accept = tally.accept,
            conditional = tally.conditional_accept,
            reject = tally.reject,
            no_response = tally.no_response,
            adopted = ?tally.adopted(),
            "Vote tallied"
        );
        self.votes = Some(tally);
        Ok(())
    }
}
