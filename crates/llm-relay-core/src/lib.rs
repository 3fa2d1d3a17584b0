//! # llm-relay-core
//!
//! Shared vocabulary for the `llm-relay` crates: conversation messages and
//! transcript entries, integer cost accounting, the unified error type, and
//! the [`ChatProvider`] trait every backend implements.
//!
//! This crate holds no tool-calling logic and no vendor code. Concrete
//! providers implement [`ChatProvider`]; the tool pipeline and the chat
//! resolver live in `llm-relay`.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chat`] | Roles, messages, content parts, and entries |
//! | [`error`] | Unified [`LlmError`] and its [`ErrorKind`] taxonomy |
//! | [`provider`] | The [`ChatProvider`] trait and request/reply types |
//! | [`usage`] | [`ChatCost`], rate tables, and [`calc_cost`](usage::calc_cost) |
//! | `mock` | Queue-based `MockProvider` (`test-utils` feature) |

#![warn(missing_docs)]

pub mod chat;
pub mod error;
pub mod provider;
pub mod usage;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

pub use chat::{
    ChatEntry, ChatMessage, ChatRole, ContentPart, FetchDescriptor, ToolRequest, ToolResponse,
};
pub use error::{ErrorKind, LlmError, ResolutionPhase};
pub use provider::{ChatProvider, ChatReply, ChatRequest, DynChatProvider, ToolSchema};
pub use usage::{ChatCost, CostStructure, CostTable, TokenRate, TokenUsage};
