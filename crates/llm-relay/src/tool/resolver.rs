//! The two-round chat resolver.
//!
//! ```text
//!   history ──► provider (initial call)
//!                  │
//!          no tool calls? ──► done
//!                  │
//!   lookup + bind + invoke every request (fan-out, then join)
//!                  │
//!   history ++ round 1 ++ tool results ──► provider (continuation call)
//!                  │
//!   round 1 ++ tool results ++ round 2, cost1 + cost2
//! ```
//!
//! One resolution makes at most two provider calls. If the continuation
//! asks for more tools, those requests are returned unresolved; callers
//! wanting deeper chains issue another [`resolve`](ChatResolver::resolve)
//! with the returned transcript appended.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use futures::future::try_join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, field, instrument, warn};

use super::catalog::ToolCatalog;
use super::config::ResolverConfig;
use super::handler::ToolWrapper;
use super::invoker::invoke_request;
use crate::chat::{ChatEntry, ChatMessage, ToolRequest};
use crate::error::{LlmError, ResolutionPhase};
use crate::provider::{ChatProvider, ChatReply, ChatRequest, ToolSchema};
use crate::usage::ChatCost;

/// The outcome of one resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Round 1 entries, then tool results, then round 2 entries.
    pub entries: Vec<ChatEntry>,
    /// Sum of the provider calls' costs. Tool execution is not metered.
    pub cost: ChatCost,
}

impl Resolution {
    /// Text of the last entry that has any.
    pub fn final_text(&self) -> Option<String> {
        self.entries.iter().rev().find_map(|e| e.message.text())
    }

    /// The transcript's messages, ready to extend a history with.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    /// Requests the model made that this resolution did not answer.
    ///
    /// Non-empty only when the continuation call asked for more tools.
    pub fn pending_requests(&self) -> Vec<&ToolRequest> {
        let answered: Vec<&str> = self
            .entries
            .iter()
            .filter_map(|e| match &e.message {
                ChatMessage::ToolResult { response } => Some(response.id.as_str()),
                _ => None,
            })
            .collect();
        self.entries
            .iter()
            .flat_map(|e| e.message.tool_requests())
            .filter(|r| !answered.contains(&r.id.as_str()))
            .collect()
    }
}

/// Resolves a conversation against a provider, running any tools the model
/// asks for in between.
///
/// The catalog is shared, so one catalog can serve many resolvers and many
/// concurrent resolutions.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use llm_relay::tool::{ChatResolver, ParamSpec, ToolCatalog, ToolError, tool_fn_sync};
/// use llm_relay::{ChatMessage, ChatProvider, LlmError};
///
/// # async fn example(provider: impl ChatProvider) -> Result<(), LlmError> {
/// let mut catalog = ToolCatalog::new();
/// catalog.register(tool_fn_sync(
///     "utc_offset",
///     Some("UTC offset of a city, in hours"),
///     &[ParamSpec::of::<String>("city")],
///     |_args| Ok::<_, ToolError>(2),
/// )?);
///
/// let resolver = ChatResolver::new(provider, Arc::new(catalog));
/// let resolution = resolver
///     .resolve(&[ChatMessage::user("What time is it in Oslo?")])
///     .await?;
/// println!("{:?} for {}", resolution.final_text(), resolution.cost);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChatResolver<P> {
    provider: P,
    catalog: Arc<ToolCatalog>,
    tools: Vec<ToolSchema>,
    config: ResolverConfig,
}

impl<P: ChatProvider> ChatResolver<P> {
    /// Creates a resolver with the default configuration.
    pub fn new(provider: P, catalog: Arc<ToolCatalog>) -> Self {
        let tools = catalog.schemas();
        Self {
            provider,
            catalog,
            tools,
            config: ResolverConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// The underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The tool catalog.
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// The configuration in use.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves `history`. See [`resolve_with_cancel`](Self::resolve_with_cancel).
    ///
    /// # Errors
    ///
    /// As for [`resolve_with_cancel`](Self::resolve_with_cancel).
    pub async fn resolve(&self, history: &[ChatMessage]) -> Result<Resolution, LlmError> {
        self.resolve_with_cancel(history, &CancellationToken::new())
            .await
    }

    /// Resolves `history`, stopping early if `cancel` fires or the
    /// configured timeout passes.
    ///
    /// Host-internal messages (markers, admin notes, tool output notes) are
    /// left out of what the provider sees. `history` itself is never
    /// modified.
    ///
    /// # Errors
    ///
    /// Every failure is terminal and returns no partial transcript. The
    /// error is wrapped in [`LlmError::Traced`] naming the phase it came
    /// from; [`LlmError::kind`] and [`LlmError::root`] see through it.
    ///
    /// - provider errors from either call
    /// - [`LlmError::UnknownTool`] before any tool runs
    /// - [`LlmError::Bind`] and tool failures from the tool phase
    /// - [`LlmError::Cancelled`] or [`LlmError::Timeout`]
    #[instrument(skip_all, fields(messages = history.len(), tool_calls = field::Empty))]
    pub async fn resolve_with_cancel(
        &self,
        history: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<Resolution, LlmError> {
        let guard = Guard {
            cancel,
            started: Instant::now(),
            deadline: self.config.timeout.map(|t| Instant::now() + t),
        };

        let mut messages: Vec<ChatMessage> = outgoing(history).cloned().collect();

        let first = guard
            .run(ResolutionPhase::InitialCall, self.send(&messages))
            .await?;
        debug!(entries = first.entries.len(), cost = %first.cost, "initial call returned");

        let requests: Vec<ToolRequest> = first
            .entries
            .iter()
            .flat_map(|e| e.message.tool_requests())
            .cloned()
            .collect();
        if requests.is_empty() {
            return Ok(Resolution {
                entries: first.entries,
                cost: first.cost,
            });
        }
        Span::current().record("tool_calls", requests.len());

        let results = guard
            .run(ResolutionPhase::ToolPhase, self.run_tools(&requests))
            .await?;

        messages.extend(outgoing(first.entries.iter().map(|e| &e.message)).cloned());
        messages.extend(results.iter().map(|e| e.message.clone()));

        let second = guard
            .run(ResolutionPhase::Continuation, self.send(&messages))
            .await?;
        debug!(
            entries = second.entries.len(),
            cost = %second.cost,
            "continuation call returned"
        );
        if second.has_tool_calls() {
            debug!("continuation asked for more tools, leaving them to the caller");
        }

        let mut entries = first.entries;
        entries.extend(results);
        entries.extend(second.entries);
        Ok(Resolution {
            entries,
            cost: first.cost + second.cost,
        })
    }

    async fn send(&self, messages: &[ChatMessage]) -> Result<ChatReply, LlmError> {
        let request = ChatRequest {
            messages: messages.to_vec(),
            tools: self.tools.clone(),
        };
        self.provider.send(&request).await
    }

    /// Checks call ids and looks up every tool first, so a reused id or an
    /// unknown name fails before anything runs. Results come back in request order.
    async fn run_tools(&self, requests: &[ToolRequest]) -> Result<Vec<ChatEntry>, LlmError> {
        let mut seen = HashSet::with_capacity(requests.len());
        if let Some(repeated) = requests.iter().find(|r| !seen.insert(r.id.as_str())) {
            warn!(call_id = %repeated.id, "model reused a tool call id");
            return Err(LlmError::ResponseFormat {
                message: format!("tool call id {} appears more than once", repeated.id),
                raw: String::new(),
            });
        }

        let calls = requests
            .iter()
            .map(|request| {
                self.catalog
                    .get(&request.function_name)
                    .map(|wrapper| (wrapper.as_ref(), request))
                    .ok_or_else(|| {
                        warn!(tool = %request.function_name, "model requested unknown tool");
                        LlmError::UnknownTool(request.function_name.clone())
                    })
            })
            .collect::<Result<Vec<(&ToolWrapper, &ToolRequest)>, _>>()?;

        let values = if self.config.parallel_tool_execution {
            let pending = calls
                .iter()
                .map(|(wrapper, request)| invoke_request(wrapper, request));
            try_join_all(pending).await?
        } else {
            let mut values = Vec::with_capacity(calls.len());
            for (wrapper, request) in &calls {
                values.push(invoke_request(wrapper, request).await?);
            }
            values
        };

        Ok(calls
            .iter()
            .zip(values)
            .map(|((_, request), value)| {
                ChatEntry::new(ChatMessage::tool_result(request.id.clone(), value))
            })
            .collect())
    }
}

fn outgoing<'a>(
    messages: impl IntoIterator<Item = &'a ChatMessage>,
) -> impl Iterator<Item = &'a ChatMessage> {
    messages
        .into_iter()
        .filter(|m| !m.role().is_host_internal())
}

/// Cancellation and deadline shared by every phase of one resolution.
struct Guard<'a> {
    cancel: &'a CancellationToken,
    started: Instant,
    deadline: Option<Instant>,
}

impl Guard<'_> {
    async fn run<T>(
        &self,
        phase: ResolutionPhase,
        work: impl Future<Output = Result<T, LlmError>>,
    ) -> Result<T, LlmError> {
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, work)
                    .await
                    .unwrap_or_else(|_| Err(self.timed_out())),
                None => work.await,
            }
        };
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(LlmError::Cancelled),
            result = bounded => result,
        };
        result.map_err(|err| {
            warn!(%phase, error = %err, "resolution failed");
            err.in_phase(phase)
        })
    }

    fn timed_out(&self) -> LlmError {
        LlmError::Timeout {
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatRole, ToolResponse};
    use crate::mock::MockProvider;
    use crate::test_helpers::{sample_reply, text_entry, tool_call_reply, tool_request};
    use serde_json::json;

    fn resolver(mock: MockProvider) -> ChatResolver<MockProvider> {
        ChatResolver::new(mock, Arc::new(ToolCatalog::new()))
    }

    #[tokio::test]
    async fn test_host_internal_messages_are_not_sent() {
        let mock = MockProvider::new();
        mock.queue_reply(sample_reply("hi"));
        let resolver = resolver(mock);
        let history = vec![
            ChatMessage::content(ChatRole::Marker, "checkpoint"),
            ChatMessage::user("hello"),
            ChatMessage::content(ChatRole::Admin, "internal note"),
        ];
        resolver.resolve(&history).await.unwrap();

        let sent = &resolver.provider().recorded_requests()[0].messages;
        assert_eq!(sent, &vec![ChatMessage::user("hello")]);
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn test_schemas_sent_with_every_request() {
        let mock = MockProvider::new();
        mock.queue_reply(sample_reply("hi"));
        let mut catalog = ToolCatalog::new();
        catalog.register(
            crate::tool::tool_fn_sync("ping", None, &[], |_| {
                Ok::<_, crate::tool::ToolError>("pong")
            })
            .unwrap(),
        );
        let resolver = ChatResolver::new(mock, Arc::new(catalog));
        resolver.resolve(&[ChatMessage::user("x")]).await.unwrap();
        let tools = &resolver.provider().recorded_requests()[0].tools;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), Some("ping"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mock = MockProvider::new();
        mock.queue_reply(sample_reply("never"));
        let resolver = resolver(mock);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = resolver
            .resolve_with_cancel(&[ChatMessage::user("x")], &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err.root(), LlmError::Cancelled));
        assert_eq!(err.phase(), Some(ResolutionPhase::InitialCall));
    }

    #[test]
    fn test_resolution_helpers() {
        let resolution = Resolution {
            entries: vec![
                ChatEntry::from_call(
                    [ChatMessage::ToolCall {
                        requests: vec![
                            tool_request("1", "a", json!({})),
                            tool_request("2", "b", json!({})),
                        ],
                    }],
                    ChatCost::ZERO,
                )
                .remove(0),
                ChatEntry::new(ChatMessage::ToolResult {
                    response: ToolResponse {
                        id: "1".into(),
                        result: json!(1),
                    },
                }),
                text_entry("done"),
            ],
            cost: ChatCost::ZERO,
        };
        assert_eq!(resolution.final_text().as_deref(), Some("done"));
        assert_eq!(resolution.messages().len(), 3);
        let pending = resolution.pending_requests();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "2");
    }

    #[tokio::test]
    async fn test_tool_call_reply_without_catalog_entry() {
        let mock = MockProvider::new();
        mock.queue_reply(tool_call_reply(vec![tool_request("1", "ghost", json!({}))]));
        let resolver = resolver(mock);
        let err = resolver.resolve(&[ChatMessage::user("x")]).await.unwrap_err();
        assert!(matches!(err.root(), LlmError::UnknownTool(name) if name == "ghost"));
        assert_eq!(err.phase(), Some(ResolutionPhase::ToolPhase));
        assert_eq!(resolver.provider().call_count(), 1);
    }
}
