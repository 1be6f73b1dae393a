//! Run-level errors
//!
//! Per-participant failures never reach this type: they are degraded at the
//! executor and logged. What remains aborts the run.

use agora_core::MemoryError;
use agora_llm::LlmError;
use agora_persist::LogError;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Permanent provider failure; no further call to that provider can succeed
    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Phase task panicked: {0}")]
    TaskPanicked(String),
}
