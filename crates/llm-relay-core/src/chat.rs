//! Conversation types: roles, messages, content parts, and transcript entries.
//!
//! A conversation is a sequence of [`ChatMessage`]s. Providers answer with
//! [`ChatEntry`] records, which wrap a message together with the time it was
//! produced and the cost attributed to it.
//!
//! # Wire format
//!
//! Messages and content parts serialize with a `type` discriminator so that
//! stored transcripts can be read back without ambiguity:
//!
//! ```rust
//! use llm_relay_core::ChatMessage;
//!
//! let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
//! assert_eq!(json["type"], "content");
//! assert_eq!(json["role"], "user");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::usage::ChatCost;

/// Who authored a message.
///
/// `Marker`, `Admin`, and `ToolOutput` are annotations the host keeps in its
/// own transcript; they are never sent to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// Instructions that frame the conversation.
    System,
    /// A message authored by a tool.
    Tool,
    /// A tool's reply to a model request.
    ToolResponse,
    /// The model.
    Agent,
    /// The end user.
    User,
    /// Developer-level instructions, for providers that distinguish them.
    Developer,
    /// Host-internal bookmark.
    Marker,
    /// Host-internal administrative note.
    Admin,
    /// Host-internal record of raw tool output.
    ToolOutput,
}

impl ChatRole {
    /// Returns `true` for roles that must never reach a provider.
    pub fn is_host_internal(self) -> bool {
        matches!(self, Self::Marker | Self::Admin | Self::ToolOutput)
    }
}

/// Where the bytes of a URI-referenced part come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetchDescriptor {
    /// The provider fetches the URI itself.
    Remote,
    /// A file previously uploaded to the provider, addressed by its id.
    Uploaded {
        /// Provider-assigned file identifier.
        file_id: String,
    },
}

/// One typed piece of a multi-part message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text.
    Text {
        /// The text itself.
        text: String,
    },
    /// Binary data carried inline, base64-encoded.
    Inline {
        /// MIME type, e.g. `"image/png"`.
        media_type: String,
        /// Base64-encoded payload.
        data: String,
    },
    /// Binary data referenced by URI.
    Uri {
        /// MIME type of the referenced data.
        media_type: String,
        /// Location of the data.
        uri: String,
        /// How the data is obtained.
        fetch: FetchDescriptor,
    },
}

impl ContentPart {
    /// Shorthand for a [`ContentPart::Text`] part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A model's request to run a host function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Identifier the matching [`ToolResponse`] must echo.
    pub id: String,
    /// Name of the tool to run.
    pub function_name: String,
    /// JSON arguments, if the model supplied any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

impl ToolRequest {
    /// Creates a request with arguments.
    pub fn new(id: impl Into<String>, function_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            function_name: function_name.into(),
            arguments: Some(arguments),
        }
    }
}

/// The host's answer to a [`ToolRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Id of the request this answers.
    pub id: String,
    /// The tool's result as JSON.
    pub result: Value,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatMessage {
    /// Single-modality text.
    Content {
        /// Author of the message.
        role: ChatRole,
        /// Message text.
        text: String,
    },
    /// Ordered sequence of typed parts.
    MultiContent {
        /// Author of the message.
        role: ChatRole,
        /// The parts, in order.
        parts: Vec<ContentPart>,
    },
    /// One or more tool invocations emitted by the model.
    ToolCall {
        /// The requests, in the order the model issued them.
        requests: Vec<ToolRequest>,
    },
    /// A tool result answering an earlier request.
    ToolResult {
        /// The response.
        response: ToolResponse,
    },
}

impl ChatMessage {
    /// A [`ChatRole::User`] text message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::content(ChatRole::User, text)
    }

    /// A [`ChatRole::System`] text message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::content(ChatRole::System, text)
    }

    /// A [`ChatRole::Agent`] text message.
    pub fn agent(text: impl Into<String>) -> Self {
        Self::content(ChatRole::Agent, text)
    }

    /// A text message with an explicit role.
    pub fn content(role: ChatRole, text: impl Into<String>) -> Self {
        Self::Content {
            role,
            text: text.into(),
        }
    }

    /// A tool-result message.
    pub fn tool_result(id: impl Into<String>, result: Value) -> Self {
        Self::ToolResult {
            response: ToolResponse {
                id: id.into(),
                result,
            },
        }
    }

    /// The effective role of this message.
    ///
    /// Tool calls are authored by the model and tool results answer with
    /// [`ChatRole::ToolResponse`].
    pub fn role(&self) -> ChatRole {
        match self {
            Self::Content { role, .. } | Self::MultiContent { role, .. } => *role,
            Self::ToolCall { .. } => ChatRole::Agent,
            Self::ToolResult { .. } => ChatRole::ToolResponse,
        }
    }

    /// The tool requests carried by this message, empty for other variants.
    pub fn tool_requests(&self) -> &[ToolRequest] {
        match self {
            Self::ToolCall { requests } => requests,
            _ => &[],
        }
    }

    /// Concatenated text of this message, if it has any.
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Content { text, .. } => Some(text.clone()),
            Self::MultiContent { parts, .. } => {
                let text: Vec<&str> = parts
                    .iter()
                    .filter_map(|p| match p {
                        ContentPart::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                (!text.is_empty()).then(|| text.join(""))
            }
            Self::ToolCall { .. } | Self::ToolResult { .. } => None,
        }
    }
}

/// One message of a transcript together with when it was produced and
/// what it cost.
///
/// A provider call that yields several messages attributes the whole call's
/// cost to the first entry; the others carry [`ChatCost::ZERO`] so that
/// summing a transcript never counts a call twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    /// When the entry was produced.
    pub timestamp: DateTime<Utc>,
    /// The message.
    pub message: ChatMessage,
    /// Optional host-side annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_tag: Option<String>,
    /// Cost attributed to this entry.
    #[serde(default)]
    pub cost: ChatCost,
}

impl ChatEntry {
    /// A zero-cost entry stamped with the current time.
    pub fn new(message: ChatMessage) -> Self {
        Self {
            timestamp: Utc::now(),
            message,
            admin_tag: None,
            cost: ChatCost::ZERO,
        }
    }

    /// Returns the entry with the given cost.
    #[must_use]
    pub fn with_cost(mut self, cost: ChatCost) -> Self {
        self.cost = cost;
        self
    }

    /// Returns the entry with the given admin tag.
    #[must_use]
    pub fn with_admin_tag(mut self, tag: impl Into<String>) -> Self {
        self.admin_tag = Some(tag.into());
        self
    }

    /// Wraps the messages of one provider call into entries, charging `cost`
    /// to the first one.
    pub fn from_call(messages: impl IntoIterator<Item = ChatMessage>, cost: ChatCost) -> Vec<Self> {
        let now = Utc::now();
        messages
            .into_iter()
            .enumerate()
            .map(|(i, message)| Self {
                timestamp: now,
                message,
                admin_tag: None,
                cost: if i == 0 { cost.clone() } else { ChatCost::ZERO },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_host_internal_roles() {
        assert!(ChatRole::Marker.is_host_internal());
        assert!(ChatRole::Admin.is_host_internal());
        assert!(ChatRole::ToolOutput.is_host_internal());
        assert!(!ChatRole::User.is_host_internal());
        assert!(!ChatRole::ToolResponse.is_host_internal());
    }

    #[test]
    fn test_message_wire_discriminator() {
        let msg = ChatMessage::ToolCall {
            requests: vec![ToolRequest::new("call_1", "weather", json!({"city": "Oslo"}))],
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "tool_call");
        assert_eq!(value["requests"][0]["function_name"], "weather");

        let back: ChatMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_tool_request_without_arguments() {
        let req: ToolRequest =
            serde_json::from_value(json!({"id": "1", "function_name": "now"})).unwrap();
        assert!(req.arguments.is_none());
    }

    #[test]
    fn test_content_part_variants() {
        let part = ContentPart::Uri {
            media_type: "application/pdf".into(),
            uri: "gs://bucket/report.pdf".into(),
            fetch: FetchDescriptor::Uploaded {
                file_id: "file-9".into(),
            },
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "uri");
        assert_eq!(value["fetch"]["type"], "uploaded");
    }

    #[test]
    fn test_message_roles() {
        assert_eq!(ChatMessage::user("x").role(), ChatRole::User);
        assert_eq!(
            ChatMessage::ToolCall { requests: vec![] }.role(),
            ChatRole::Agent
        );
        assert_eq!(
            ChatMessage::tool_result("1", json!(1)).role(),
            ChatRole::ToolResponse
        );
    }

    #[test]
    fn test_multi_content_text() {
        let msg = ChatMessage::MultiContent {
            role: ChatRole::Agent,
            parts: vec![
                ContentPart::text("a"),
                ContentPart::Inline {
                    media_type: "image/png".into(),
                    data: "iVBORw0".into(),
                },
                ContentPart::text("b"),
            ],
        };
        assert_eq!(msg.text().as_deref(), Some("ab"));
        assert!(ChatMessage::tool_result("1", json!(1)).text().is_none());
    }

    #[test]
    fn test_from_call_charges_first_entry_only() {
        let cost = ChatCost::new(10, 20);
        let entries = ChatEntry::from_call(
            vec![ChatMessage::agent("one"), ChatMessage::agent("two")],
            cost.clone(),
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].cost, cost);
        assert_eq!(entries[1].cost, ChatCost::ZERO);
    }

    #[test]
    fn test_entry_builders() {
        let entry = ChatEntry::new(ChatMessage::content(ChatRole::Marker, "checkpoint"))
            .with_admin_tag("audit")
            .with_cost(ChatCost::new(1, 1));
        assert_eq!(entry.admin_tag.as_deref(), Some("audit"));
        assert_eq!(entry.cost.total_micros(), 2);
    }
}
