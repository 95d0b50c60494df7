//! Agent module - the orchestration loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Seed the conversation with the system prompt and the user task
//! 2. Call the LLM with the available tools
//! 3. If the LLM requests tool calls, execute them and feed the results back
//! 4. Repeat until the LLM produces a final response or the round-trip
//!    ceiling is reached

mod agent_loop;
mod conversation;
mod prompt;
mod types;

pub use agent_loop::{Agent, AgentSettings, ModelOutput};
pub use conversation::Conversation;
pub use prompt::{build_system_prompt, load_system_prompt};
pub use types::{AgentError, LogEntryType, RunLogEntry, RunOutcome};
