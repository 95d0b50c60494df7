//! Run results, execution log and errors.

use serde::Serialize;
use thiserror::Error;

use crate::llm::{ChatMessage, TokenUsage};

/// Run-level failures. Tool and attachment problems never end up here.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model kept requesting tools past the round-trip ceiling.
    #[error("recursion limit of {limit} round-trips exceeded without a final answer")]
    RecursionLimitExceeded { limit: usize },

    /// The model-inference call itself failed.
    #[error("model inference failed: {0:#}")]
    Model(anyhow::Error),
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Formatted answer (text after the final-answer marker).
    pub answer: String,

    /// Unformatted text of the last assistant message.
    pub raw_answer: String,

    /// Number of model calls.
    pub turns: usize,

    /// Number of completed model -> tools -> model cycles.
    pub round_trips: usize,

    /// Tokens reported by the provider, summed over every model call.
    pub usage: TokenUsage,

    /// Detailed execution log
    pub log: Vec<RunLogEntry>,

    /// Final conversation, system prompt included.
    pub messages: Vec<ChatMessage>,
}

/// A single entry in the run log.
#[derive(Debug, Clone, Serialize)]
pub struct RunLogEntry {
    /// Timestamp (RFC 3339)
    pub timestamp: String,

    pub entry_type: LogEntryType,

    pub content: String,
}

impl RunLogEntry {
    pub fn now(entry_type: LogEntryType, content: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            entry_type,
            content: content.into(),
        }
    }
}

/// Types of log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEntryType {
    /// Tool is being called
    ToolCall,
    /// Tool returned a result
    ToolResult,
    /// Tool failed or was unknown; content is the error text fed back
    ToolError,
    /// Agent produced final response
    Response,
}
