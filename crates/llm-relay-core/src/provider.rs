//! Provider trait and request types.
//!
//! - **[`ChatProvider`]** is the trait every backend implements. It uses
//!   native async-fn-in-traits, so implementations are plain `async fn`s.
//! - **[`DynChatProvider`]** is an object-safe mirror that returns boxed
//!   futures. A blanket `impl<T: ChatProvider> DynChatProvider for T`
//!   bridges the two, so any provider can live behind `Arc<dyn _>`.
//!
//! Wire encoding, HTTP, retries, and per-model pricing are the provider's
//! business. The relay only needs the shape below: messages in, entries and
//! their cost out.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::{ChatEntry, ChatMessage};
use crate::error::LlmError;
use crate::usage::ChatCost;

/// Tool description in the JSON-Schema shape providers submit upstream:
/// `{name, description, parameters: {type: "object", properties, required}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema(Value);

impl ToolSchema {
    /// Wraps a schema value.
    pub fn new(schema: Value) -> Self {
        Self(schema)
    }

    /// Returns the underlying JSON.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// The tool name recorded in the schema, if present.
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }
}

/// One call to a provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The conversation so far, host-internal messages already removed.
    pub messages: Vec<ChatMessage>,
    /// Tools the model may call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSchema>,
}

/// What a provider returns for one call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatReply {
    /// Produced entries, in order. The call's cost sits on the first entry.
    pub entries: Vec<ChatEntry>,
    /// Cost of the call.
    pub cost: ChatCost,
}

impl ChatReply {
    /// Builds a reply from the messages of one call, attributing `cost` to
    /// the first entry.
    pub fn from_messages(messages: impl IntoIterator<Item = ChatMessage>, cost: ChatCost) -> Self {
        Self {
            entries: ChatEntry::from_call(messages, cost.clone()),
            cost,
        }
    }

    /// Returns `true` if any entry asks for a tool call.
    pub fn has_tool_calls(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.message, ChatMessage::ToolCall { .. }))
    }
}

/// The capability every chat backend implements.
///
/// `ChatProvider` is **not** object-safe because async-fn-in-traits return
/// `impl Future`. Use [`DynChatProvider`] for dynamic dispatch; every
/// `ChatProvider` implements it automatically.
pub trait ChatProvider: Send + Sync {
    /// Sends the conversation and returns the produced entries and cost.
    fn send(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<ChatReply, LlmError>> + Send;
}

/// Object-safe counterpart of [`ChatProvider`].
pub trait DynChatProvider: Send + Sync {
    /// Boxed-future version of [`ChatProvider::send`].
    fn send_boxed<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatReply, LlmError>> + Send + 'a>>;
}

impl<T: ChatProvider> DynChatProvider for T {
    fn send_boxed<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatReply, LlmError>> + Send + 'a>> {
        Box::pin(self.send(request))
    }
}

impl ChatProvider for Arc<dyn DynChatProvider> {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, LlmError> {
        self.as_ref().send_boxed(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    impl ChatProvider for Echo {
        async fn send(&self, request: &ChatRequest) -> Result<ChatReply, LlmError> {
            let text = request
                .messages
                .last()
                .and_then(ChatMessage::text)
                .unwrap_or_default();
            Ok(ChatReply::from_messages(
                [ChatMessage::agent(text)],
                ChatCost::new(1, 2),
            ))
        }
    }

    #[tokio::test]
    async fn test_dyn_provider_blanket_impl() {
        let provider: Arc<dyn DynChatProvider> = Arc::new(Echo);
        let request = ChatRequest {
            messages: vec![ChatMessage::user("ping")],
            tools: vec![],
        };
        let reply = provider.send(&request).await.unwrap();
        assert_eq!(reply.entries.len(), 1);
        assert_eq!(reply.entries[0].message.text().as_deref(), Some("ping"));
        assert_eq!(reply.cost, ChatCost::new(1, 2));
    }

    #[test]
    fn test_reply_has_tool_calls() {
        let reply = ChatReply::from_messages(
            [ChatMessage::ToolCall {
                requests: vec![crate::chat::ToolRequest::new("1", "f", json!({}))],
            }],
            ChatCost::ZERO,
        );
        assert!(reply.has_tool_calls());
        assert!(!ChatReply::default().has_tool_calls());
    }

    #[test]
    fn test_tool_schema_name() {
        let schema = ToolSchema::new(json!({"name": "lookup", "parameters": {}}));
        assert_eq!(schema.name(), Some("lookup"));
    }

    #[test]
    fn test_request_skips_empty_tools() {
        let json = serde_json::to_value(ChatRequest::default()).unwrap();
        assert!(json.get("tools").is_none());
    }
}
