//! Append-only conversation state for a single run.

use std::collections::HashSet;

use crate::llm::{ChatMessage, Role};

/// Ordered message history owned by one loop execution.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Conversation seeded with the system prompt and the user task.
    pub fn seeded(system_prompt: &str, task: &str) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(task)],
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }

    /// Messages to send to the model: exactly one system message (`system`)
    /// followed by the non-system history in order.
    pub fn prompt(&self, system: &ChatMessage) -> Vec<ChatMessage> {
        std::iter::once(system.clone())
            .chain(
                self.messages
                    .iter()
                    .filter(|m| m.role != Role::System)
                    .cloned(),
            )
            .collect()
    }

    /// Ids of tool calls requested by assistant messages that have no
    /// matching tool-result message yet, in issuance order.
    pub fn unanswered_calls(&self) -> Vec<String> {
        let answered: HashSet<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();

        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| m.requested_calls())
            .filter(|call| !answered.contains(call.id.as_str()))
            .map(|call| call.id.clone())
            .collect()
    }

    /// Text of the most recent assistant message.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .and_then(|m| m.content.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;
    use serde_json::json;

    #[test]
    fn prompt_dedupes_system_messages() {
        let mut conversation = Conversation::seeded("old system", "task");
        conversation.push(ChatMessage::system("injected"));
        conversation.push(ChatMessage::assistant(Some("hi".to_string()), None));

        let system = ChatMessage::system("fixed");
        let prompt = conversation.prompt(&system);

        assert_eq!(prompt.iter().filter(|m| m.role == Role::System).count(), 1);
        assert_eq!(prompt[0], system);
        assert_eq!(prompt[1].content.as_deref(), Some("task"));
        assert_eq!(prompt[2].role, Role::Assistant);
        assert_eq!(prompt.len(), 3);
    }

    #[test]
    fn unanswered_calls_tracks_results() {
        let mut conversation = Conversation::seeded("s", "t");
        conversation.push(ChatMessage::assistant(
            None,
            Some(vec![
                ToolCall::new("a", "web_search", json!({"query": "x"})),
                ToolCall::new("b", "wiki_search", json!({"query": "y"})),
            ]),
        ));
        assert_eq!(conversation.unanswered_calls(), vec!["a", "b"]);

        conversation.push(ChatMessage::tool_result("b", "done"));
        assert_eq!(conversation.unanswered_calls(), vec!["a"]);

        conversation.push(ChatMessage::tool_result("a", "done"));
        assert!(conversation.unanswered_calls().is_empty());
    }

    #[test]
    fn last_assistant_text_skips_tool_results() {
        let mut conversation = Conversation::seeded("s", "t");
        conversation.push(ChatMessage::assistant(Some("first".to_string()), None));
        conversation.push(ChatMessage::tool_result("x", "result"));
        assert_eq!(conversation.last_assistant_text(), Some("first"));
    }
}
