//! Core agent loop implementation.
//!
//! The loop is a three-state machine:
//!
//! ```text
//! AwaitingModel --tool requests--> AwaitingTools --results--> AwaitingModel
//! AwaitingModel --final text-----> Done
//! ```
//!
//! Each `AwaitingModel -> AwaitingTools -> AwaitingModel` cycle is one
//! round-trip. A model that asks for tools again after `max_round_trips`
//! completed round-trips aborts the run with
//! [`AgentError::RecursionLimitExceeded`].

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::format::format_response;
use crate::llm::{ChatMessage, ChatResponse, LlmClient, OpenRouterClient, TokenUsage, ToolCall};
use crate::tools::ToolRegistry;

use super::conversation::Conversation;
use super::prompt::load_system_prompt;
use super::types::{AgentError, LogEntryType, RunLogEntry, RunOutcome};

/// Per-agent settings that do not depend on the collaborators.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub system_prompt: String,
    pub max_round_trips: usize,
    /// Directory tools run in (the task-data directory).
    pub workspace: PathBuf,
}

/// What the model asked for, decided from its response.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    FinalText(String),
    ToolRequests(Vec<ToolCall>),
}

impl ModelOutput {
    pub fn from_response(response: &ChatResponse) -> Self {
        match response.tool_calls.as_deref() {
            Some(calls) if !calls.is_empty() => ModelOutput::ToolRequests(calls.to_vec()),
            _ => ModelOutput::FinalText(response.content.clone().unwrap_or_default()),
        }
    }
}

#[derive(Debug)]
enum LoopState {
    AwaitingModel,
    AwaitingTools(Vec<ToolCall>),
    Done,
}

/// The tool-using agent.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    model: String,
    system_message: ChatMessage,
    max_round_trips: usize,
    workspace: PathBuf,
}

impl Agent {
    /// Create an agent backed by the configured model service and the
    /// default tool set.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let llm = Arc::new(OpenRouterClient::with_base_url(
            config.api_key.clone(),
            config.llm_base_url.clone(),
            config.temperature,
        ));
        let tools = ToolRegistry::new(config.code_timeout_secs);
        let system_prompt = load_system_prompt(config.system_prompt_path.as_deref(), &tools)?;

        Ok(Self::with_parts(
            llm,
            tools,
            AgentSettings {
                model: config.default_model.clone(),
                system_prompt,
                max_round_trips: config.max_round_trips,
                workspace: config.task_data_path.clone(),
            },
        ))
    }

    pub fn with_parts(llm: Arc<dyn LlmClient>, tools: ToolRegistry, settings: AgentSettings) -> Self {
        Self {
            llm,
            tools,
            model: settings.model,
            system_message: ChatMessage::system(settings.system_prompt),
            max_round_trips: settings.max_round_trips,
            workspace: settings.workspace,
        }
    }

    /// Answer a (preprocessed) task.
    pub async fn run_task(&self, task: &str) -> Result<RunOutcome, AgentError> {
        let system_prompt = self.system_message.content.as_deref().unwrap_or_default();
        self.run(Conversation::seeded(system_prompt, task)).await
    }

    /// Drive an existing conversation to a final answer.
    pub async fn run(&self, conversation: Conversation) -> Result<RunOutcome, AgentError> {
        let run_id = Uuid::new_v4();
        self.run_loop(conversation)
            .instrument(tracing::info_span!("run", %run_id, model = %self.model))
            .await
    }

    async fn run_loop(&self, mut conversation: Conversation) -> Result<RunOutcome, AgentError> {
        let tool_schemas = self.tools.get_tool_schemas();
        let mut log = Vec::new();
        let mut turns = 0usize;
        let mut round_trips = 0usize;
        let mut usage = TokenUsage::default();
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    turns += 1;
                    let prompt = conversation.prompt(&self.system_message);
                    log_prompt(turns, &prompt);

                    let response = self
                        .llm
                        .chat_completion(&self.model, &prompt, Some(&tool_schemas))
                        .await
                        .map_err(AgentError::Model)?;

                    tracing::debug!(
                        "Model response (turn {}): finish_reason={}, usage={:?}",
                        turns,
                        response.finish_reason.as_deref().unwrap_or("unknown"),
                        response.usage
                    );
                    if let Some(turn_usage) = response.usage {
                        usage.add(turn_usage);
                    }

                    match ModelOutput::from_response(&response) {
                        ModelOutput::ToolRequests(calls) => {
                            if round_trips >= self.max_round_trips {
                                tracing::error!(
                                    "Model requested {} tool call(s) after {} round-trips; aborting",
                                    calls.len(),
                                    round_trips
                                );
                                return Err(AgentError::RecursionLimitExceeded {
                                    limit: self.max_round_trips,
                                });
                            }
                            conversation.push(ChatMessage::assistant(
                                response.content,
                                Some(calls.clone()),
                            ));
                            LoopState::AwaitingTools(calls)
                        }
                        ModelOutput::FinalText(text) => {
                            if text.is_empty() {
                                tracing::warn!("Model returned an empty final response");
                            }
                            conversation.push(ChatMessage::assistant(Some(text), None));
                            LoopState::Done
                        }
                    }
                }

                LoopState::AwaitingTools(calls) => {
                    for call in &calls {
                        tracing::info!("Calling tool {} ({})", call.function.name, call.id);
                        log.push(RunLogEntry::now(
                            LogEntryType::ToolCall,
                            format!(
                                "Calling tool: {} with args: {}",
                                call.function.name, call.function.arguments
                            ),
                        ));
                    }

                    // join_all yields results in input order regardless of completion order
                    let outputs =
                        join_all(calls.iter().map(|call| self.tools.invoke(call, &self.workspace)))
                            .await;

                    for output in outputs {
                        let entry_type = if output.is_error {
                            LogEntryType::ToolError
                        } else {
                            LogEntryType::ToolResult
                        };
                        tracing::debug!(
                            "Tool {} ({}) returned {} bytes",
                            output.name,
                            output.tool_call_id,
                            output.content.len()
                        );
                        log.push(RunLogEntry::now(
                            entry_type,
                            truncate_for_log(&output.content, 1000),
                        ));
                        conversation.push(ChatMessage::tool_result(
                            output.tool_call_id,
                            output.content,
                        ));
                    }

                    round_trips += 1;
                    debug_assert!(conversation.unanswered_calls().is_empty());
                    LoopState::AwaitingModel
                }

                LoopState::Done => {
                    let raw_answer = conversation
                        .last_assistant_text()
                        .unwrap_or_default()
                        .to_string();
                    let answer = format_response(&raw_answer);
                    log.push(RunLogEntry::now(
                        LogEntryType::Response,
                        truncate_for_log(&raw_answer, 2000),
                    ));
                    tracing::info!(
                        "Run finished after {} turn(s), {} round-trip(s), {} prompt / {} completion tokens",
                        turns,
                        round_trips,
                        usage.prompt_tokens,
                        usage.completion_tokens
                    );

                    return Ok(RunOutcome {
                        answer,
                        raw_answer,
                        turns,
                        round_trips,
                        usage,
                        log,
                        messages: conversation.into_messages(),
                    });
                }
            };
        }
    }
}

fn log_prompt(turn: usize, prompt: &[ChatMessage]) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    tracing::debug!("=== Messages passed to model (turn {}) ===", turn);
    for msg in prompt {
        let content = msg.content.as_deref().unwrap_or("");
        let calls = msg
            .requested_calls()
            .iter()
            .map(|c| c.function.name.as_str())
            .collect::<Vec<_>>();
        if calls.is_empty() {
            tracing::debug!("{}: {}", msg.role.as_str(), content);
        } else {
            tracing::debug!("{}: {} [tool calls: {}]", msg.role.as_str(), content, calls.join(", "));
        }
    }
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut cut = max_len;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... [truncated]", &s[..cut])
}
