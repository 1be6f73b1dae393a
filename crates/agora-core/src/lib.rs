//! # Agora Core
//!
//! Core types shared by every Agora crate:
//! - [`ParticipantRecord`]: immutable description of one simulated participant
//! - [`AgentMemory`]: per-participant, append-only conversation state
//! - [`PromptBundle`]: the ephemeral `{system, history, task}` triple sent to a model
//! - Closed label sets ([`Stance`], [`Attitude`], [`ReactionType`], [`VoteStance`])
//!
//! ## Quick Start
//!
//! ```rust
//! use agora_core::{AgentMemory, StaticContext};
//!
//! let ctx = StaticContext::new("guide", "rules", "local", "persona");
//! let mut memory = AgentMemory::new("resident_01", ctx);
//! memory.add_utterance("resident_02", "The plan ignores tenants.").unwrap();
//! memory.set_task("Your turn to speak.");
//!
//! let bundle = memory.prompt_bundle();
//! assert!(bundle.history.contains("[resident_02]: The plan ignores tenants."));
//! assert_eq!(memory.history_len(), 1);
//! ```

pub mod labels;
pub mod memory;
pub mod participant;
pub mod prompt;

pub use labels::{Attitude, InvalidLabel, ReactionType, Stance, VoteStance, NO_RESPONSE};
pub use memory::{AgentMemory, MemoryError, MemorySnapshot, StaticContext, ThoughtKind, TimelineEntry};
pub use participant::{ParticipantId, ParticipantRecord, ParticipantSpec, PLANNER_ID};
pub use prompt::PromptBundle;
