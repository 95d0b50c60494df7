//! Tool registry and the tools the agent may invoke.
//!
//! Every tool takes JSON arguments and returns text. Backend failures are
//! reported as [`ToolError`] and turned into an `Error: ...` payload by the
//! registry, so a failing tool never aborts the agent loop.

mod arxiv;
mod python;
mod web;
mod wiki;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::llm::{FunctionSchema, ToolCall, ToolSchema};

pub use arxiv::ArxivSearch;
pub use python::RunPython;
pub use web::WebSearch;
pub use wiki::WikiSearch;

/// Payload returned by search tools when the backend found nothing.
pub const NO_RESULTS: &str = "No results found";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Missing '{0}' argument")]
    MissingArgument(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    #[error("{0}")]
    Backend(String),
}

/// A named capability the model may request.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. `workspace` is the task-data directory.
    async fn execute(&self, args: Value, workspace: &Path) -> Result<String, ToolError>;
}

/// Name and description of a registered tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Outcome of dispatching one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
    pub is_error: bool,
}

/// Fixed, order-stable set of tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with the default tool set.
    pub fn new(code_timeout_secs: u64) -> Self {
        Self::empty()
            .with(Arc::new(WebSearch))
            .with(Arc::new(WikiSearch::default()))
            .with(Arc::new(ArxivSearch::default()))
            .with(Arc::new(RunPython::new(code_timeout_secs)))
    }

    pub fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    /// Add a tool. A tool with the same name replaces the earlier one in place.
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => self.tools[idx] = tool,
            None => self.tools.push(tool),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Tool declarations in registration order.
    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|t| ToolSchema {
                schema_type: "function".to_string(),
                function: FunctionSchema {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    /// Dispatch a model tool call. Never fails: unknown tools and backend
    /// errors come back as error text tagged with the call id.
    pub async fn invoke(&self, call: &ToolCall, workspace: &Path) -> ToolOutput {
        let name = call.function.name.as_str();
        let args = parse_arguments(&call.function.arguments);

        let result = match self.get(name) {
            Some(tool) => tool.execute(args, workspace).await,
            None => {
                tracing::warn!("Model requested unknown tool '{}'", name);
                return ToolOutput {
                    tool_call_id: call.id.clone(),
                    name: name.to_string(),
                    content: format!("Error: tool not found: {}", name),
                    is_error: true,
                };
            }
        };

        let (content, is_error) = match result {
            Ok(text) => (text, false),
            Err(e) => {
                tracing::warn!("Tool '{}' failed: {}", name, e);
                (format!("Error: {}", e), true)
            }
        };

        ToolOutput {
            tool_call_id: call.id.clone(),
            name: name.to_string(),
            content,
            is_error,
        }
    }
}

/// Parse the JSON-encoded argument string. A bare string that is not JSON is
/// treated as `{"query": <string>}`, which is what single-argument tools expect.
fn parse_arguments(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| serde_json::json!({ "query": trimmed }))
}

/// Fetch a required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &'static str) -> Result<&'a str, ToolError> {
    args[key]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ToolError::MissingArgument(key))
}

/// Truncate at a char boundary, appending a marker when anything was cut.
pub(crate) fn truncate_output(mut text: String, max_len: usize) -> String {
    if text.len() <= max_len {
        return text;
    }
    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str("\n... [output truncated]");
    text
}

/// Basic HTML/XML entity decoding.
pub(crate) fn html_decode(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
