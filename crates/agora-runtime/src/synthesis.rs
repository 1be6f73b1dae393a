//! Synthesis stage shared by both controllers
//!
//! The planner is a single sequential call over the compiled transcript and
//! final opinions. Its structured result becomes the consensus artifact.

use agora_core::PLANNER_ID;
use agora_debate::{compile_opinions, compile_transcript, planner_bundle, PlannerResult};
use agora_persist::{RunLogger, ThinkPayload};
use serde_json::{json, Value};

use crate::config::{StaticPrompts, SynthesisConfig};
use crate::error::RunError;
use crate::executor::{AgentExecutor, CallSpec};
use crate::phase::Phase;

fn consensus_artifact(result: PlannerResult) -> Value {
    let mut object = result.extra;
    object.insert("issues".to_string(), json!(result.issues));
    object.insert("consensus".to_string(), Value::String(result.consensus));
    Value::Object(object)
}

/// Run the planner and log its result; returns the compromise text
pub async fn synthesize(
    executor: &AgentExecutor,
    logger: &mut RunLogger,
    synthesis: &SynthesisConfig,
    prompts: &StaticPrompts,
    final_opinions: &[(String, String)],
    round: u32,
) -> Result<String, RunError> {
    tracing::info!(phase = %Phase::Synthesis, model = %synthesis.planner_model, "Planner synthesizing");

    let transcript = compile_transcript(
        logger
            .utterances()
            .iter()
            .map(|r| (r.round, r.participant_id.as_str(), r.content.as_str())),
    );
    let opinions = compile_opinions(final_opinions.iter().map(|(id, text)| (id.as_str(), text.as_str())));
    let bundle = planner_bundle(
        &synthesis.planner_guide,
        &prompts.debate_rules,
        &prompts.local_context,
        &transcript,
        &opinions,
    );

    let call = CallSpec::new(PLANNER_ID, &synthesis.planner_model, Phase::Synthesis.task_type(), round, 1);
    let parsed = executor.call::<PlannerResult>(&call, &bundle).await?;
    let degraded = parsed.is_degraded();

    let (text, artifact) = match parsed.value {
        Some(result) => (result.consensus.clone(), consensus_artifact(result)),
        None => (
            parsed.raw.clone(),
            json!({"issues": [], "consensus": parsed.raw, "degraded": true}),
        ),
    };

    logger.log_think(round, 1, PLANNER_ID, ThinkPayload::Planner { content: text.clone() }, degraded)?;
    logger.set_consensus(artifact);
    logger.save().await?;
    Ok(text)
}
