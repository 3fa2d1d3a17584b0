//! Pre-built helpers for testing code that uses `llm-relay-core` types.
//!
//! Available when the `test-utils` feature is enabled, so downstream crates
//! can reuse them in their own suites. Also compiled for this crate's tests.

use serde_json::Value;

use crate::chat::{ChatEntry, ChatMessage, ToolRequest};
use crate::provider::ChatReply;
use crate::usage::ChatCost;

/// Cost charged by [`sample_reply`] and [`tool_call_reply`].
pub fn sample_cost() -> ChatCost {
    ChatCost::new(100, 50)
}

/// A reply with one agent text entry costing [`sample_cost`].
pub fn sample_reply(text: &str) -> ChatReply {
    ChatReply::from_messages([ChatMessage::agent(text)], sample_cost())
}

/// A reply with one agent text entry and the given cost.
pub fn reply_with_cost(text: &str, cost: ChatCost) -> ChatReply {
    ChatReply::from_messages([ChatMessage::agent(text)], cost)
}

/// A reply carrying a single `ToolCall` message with the given requests.
pub fn tool_call_reply(requests: Vec<ToolRequest>) -> ChatReply {
    ChatReply::from_messages([ChatMessage::ToolCall { requests }], sample_cost())
}

/// Shorthand for [`ToolRequest::new`].
pub fn tool_request(id: &str, name: &str, arguments: Value) -> ToolRequest {
    ToolRequest::new(id, name, arguments)
}

/// A zero-cost agent text entry.
pub fn text_entry(text: &str) -> ChatEntry {
    ChatEntry::new(ChatMessage::agent(text))
}
