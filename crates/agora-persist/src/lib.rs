//! # Agora Persistence
//!
//! Run logging and artifact storage.
//!
//! Supports:
//! - File-system store (atomic replace via temp file + rename)
//! - In-memory store (for testing)
//!
//! Every record gets a code `{participant}_r{round}_{turn:02}_{r|t}` that is
//! unique within a run; the logger rejects duplicates.

pub mod logger;
pub mod records;
pub mod store;
pub mod tokens;

pub use logger::{Artifact, LogError, OpinionPhase, RunLogger};
pub use records::{record_code, RecordKind, ThinkPayload, ThinkRecord, UtteranceRecord};
pub use store::{ArtifactStore, FileStore, MemoryStore, StorageError};
pub use tokens::{CallSite, TokenEntry, TokenLog};
