//! System prompt templates for the agent.

use std::path::Path;

use crate::format::FINAL_ANSWER_MARKER;
use crate::tools::ToolRegistry;

/// Build the built-in system prompt with tool definitions.
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let tool_descriptions = tools
        .list_tools()
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a general AI assistant. I will ask you a question. Work through it step by step, using tools whenever they help, and finish your answer with the following template:
{marker} [YOUR FINAL ANSWER]

## Available Tools
{tool_descriptions}

## Rules for the final answer
1. YOUR FINAL ANSWER should be a number OR as few words as possible OR a comma separated list of numbers and/or strings.
2. For a number, don't use commas to write it and don't use units such as $ or percent signs unless specified otherwise.
3. For a string, don't use articles or abbreviations (e.g. for cities), and write digits in plain text unless specified otherwise.
4. For a comma separated list, apply the rules above to each element.

## Using tools
- Don't guess facts you can look up. Search first, then answer.
- If a tool returns an error or "No results found", rephrase the query or try another tool.
- Only write {marker} once you are done calling tools."#,
        marker = FINAL_ANSWER_MARKER,
        tool_descriptions = tool_descriptions
    )
}

/// Load the system prompt from `path`, or build the default one.
pub fn load_system_prompt(path: Option<&Path>, tools: &ToolRegistry) -> anyhow::Result<String> {
    match path {
        Some(path) => {
            let prompt = std::fs::read_to_string(path).map_err(|e| {
                anyhow::anyhow!("Failed to read system prompt {}: {}", path.display(), e)
            })?;
            tracing::info!("Loaded system prompt from {}", path.display());
            Ok(prompt)
        }
        None => Ok(build_system_prompt(tools)),
    }
}
