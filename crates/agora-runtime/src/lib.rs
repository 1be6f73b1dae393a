//! # Agora Runtime
//!
//! Tokio-based phase controller for multi-agent debates.
//!
//! ```text
//! NARRATIVE → INITIAL_OPINION →
//!   [round 1..N: SPEAKING (sequential) → REACTION (parallel) ... → REFLECTION] →
//! FINAL_OPINION → [SYNTHESIS → VOTE]
//! ```
//!
//! Level 1 runs the shared-context [`SharedContextController`]; levels 2-4
//! run the per-agent [`DebateController`].

pub mod assignment;
pub mod batch;
pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod phase;
pub mod pool;
pub mod summary;
pub mod synthesis;

pub use assignment::{assign_models, models_in_use, shared_model};
pub use batch::{SharedContextController, SPEAKING_BATCH_ATTEMPTS};
pub use config::{
    load_participants, parse_participants, validate_participants, validate_records, ModelAssignment, RunConfig,
    StaticPrompts, SynthesisConfig, BATCH_ID,
};
pub use controller::DebateController;
pub use error::RunError;
pub use executor::{AgentExecutor, CallSpec, RawReply};
pub use phase::Phase;
pub use pool::WorkerPool;
pub use summary::RunSummary;

use agora_core::ParticipantRecord;
use agora_llm::Gateway;
use agora_persist::ArtifactStore;
use std::sync::Arc;

/// Run a debate with the controller matching `config.level`.
///
/// In shared-context mode every record must already carry the shared model.
pub async fn run_debate(
    config: RunConfig,
    prompts: StaticPrompts,
    participants: Vec<ParticipantRecord>,
    gateway: Arc<Gateway>,
    store: Arc<dyn ArtifactStore>,
) -> Result<RunSummary, RunError> {
    if config.is_batch() {
        let model = participants
            .first()
            .map(|p| p.assigned_model.clone())
            .ok_or_else(|| RunError::Config("participant list is empty".to_string()))?;
        if participants.iter().any(|p| p.assigned_model != model) {
            return Err(RunError::Config("shared-context mode needs a single model".to_string()));
        }
        let mut controller = SharedContextController::new(config, prompts, participants, &model, gateway, store)?;
        controller.run().await
    } else {
        let mut controller = DebateController::new(config, prompts, participants, gateway, store)?;
        controller.run().await
    }
}
