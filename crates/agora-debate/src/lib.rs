//! # Agora Debate
//!
//! Everything between a model's raw text and a typed debate artifact:
//!
//! - **Responses**: one shape per task ([`UtteranceResponse`], [`ReactionResponse`], ...)
//! - **Parser**: fence stripping, balanced-span extraction and a bounded repair loop
//! - **Nominations**: list and legacy single-target encodings, normalized to a list
//! - **Batch**: per-participant decoding of shared-context responses
//! - **Tasks / Planner**: prompt text for every phase
//! - **Tally**: majority decision on the compromise vote
//!
//! ## Example
//!
//! ```rust
//! use agora_debate::{parse_structured, NoRepair, UtteranceResponse};
//!
//! #[tokio::main]
//! async fn main() {
//!     let raw = "```json\n{\"utterance\": \"Why now?\", \"target\": \"resident_05\", \"attitude\": \"question\"}\n```";
//!     let parsed = parse_structured::<UtteranceResponse>(raw, &NoRepair, 0).await.unwrap();
//!
//!     let utterance = parsed.value.unwrap();
//!     assert_eq!(utterance.nominations[0].target, "resident_05");
//! }
//! ```

pub mod batch;
pub mod nomination;
pub mod parser;
pub mod planner;
pub mod responses;
pub mod tally;
pub mod tasks;

pub use batch::{decode_batch, BatchDecoded, BatchFormatFailure};
pub use nomination::Nomination;
pub use parser::{decode, parse_structured, NoRepair, ParseFailure, ParsedResult, Repairer};
pub use planner::{compile_opinions, compile_transcript, planner_bundle};
pub use responses::{
    NarrativeResponse, OpinionResponse, PlannerResult, ReactionResponse, ReflectionResponse, StructuredResponse,
    UtteranceResponse, VoteResponse,
};
pub use tally::VoteTally;
