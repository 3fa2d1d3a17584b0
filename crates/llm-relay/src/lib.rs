//! # llm-relay
//!
//! Provider-agnostic chat with tool calling. A [`ChatResolver`](tool::ChatResolver)
//! sends a conversation to any [`ChatProvider`], runs the host functions the
//! model asks for, feeds their results back, and returns the merged
//! transcript together with what the calls cost.
//!
//! The shared vocabulary (messages, entries, costs, errors, the provider
//! trait) lives in `llm-relay-core` and is re-exported here, so depending
//! on this crate alone is enough.
//!
//! # Architecture
//!
//! ```text
//!  ┌─────────────────────┐   ┌─────────────────────┐
//!  │   vendor provider   │   │    MockProvider     │
//!  └──────────┬──────────┘   └──────────┬──────────┘
//!             │  impl ChatProvider      │
//!             └────────────┬────────────┘
//!                          ▼
//!              ┌──────────────────────────┐
//!              │        llm-relay         │  ← you are here
//!              │ ToolCatalog, bind/invoke │
//!              │       ChatResolver       │
//!              └──────────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chat`] | Roles, messages, content parts, and entries |
//! | [`error`] | Unified [`LlmError`] and its [`ErrorKind`] taxonomy |
//! | [`provider`] | The [`ChatProvider`] trait and request/reply types |
//! | [`tool`] | Tool definitions, catalog, binder, invoker, and resolver |
//! | [`usage`] | [`ChatCost`], rate tables, and [`calc_cost`](usage::calc_cost) |

#![warn(missing_docs)]

pub use llm_relay_core::{chat, error, provider, usage};

#[cfg(any(test, feature = "test-utils"))]
pub use llm_relay_core::{mock, test_helpers};

pub mod tool;

pub use llm_relay_core::{
    ChatCost, ChatEntry, ChatMessage, ChatProvider, ChatReply, ChatRequest, ChatRole, ContentPart,
    CostStructure, CostTable, DynChatProvider, ErrorKind, FetchDescriptor, LlmError,
    ResolutionPhase, TokenRate, TokenUsage, ToolRequest, ToolResponse, ToolSchema,
};
pub use tool::{ChatResolver, Resolution, ResolverConfig, ToolCatalog};
