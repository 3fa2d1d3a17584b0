//! Mock provider for testing.
//!
//! [`MockProvider`] is a queue-based fake that lets tests control exactly
//! what replies and errors a provider returns, without touching the
//! network. It implements [`ChatProvider`], so it works anywhere a real
//! provider does, including behind [`DynChatProvider`](crate::DynChatProvider).
//!
//! ```rust,no_run
//! use llm_relay_core::mock::MockProvider;
//! use llm_relay_core::{ChatMessage, ChatProvider, ChatReply, ChatRequest, ChatCost};
//!
//! # async fn example() {
//! let mock = MockProvider::new();
//! mock.queue_reply(ChatReply::from_messages(
//!     [ChatMessage::agent("Hello!")],
//!     ChatCost::new(10, 20),
//! ));
//!
//! let reply = mock.send(&ChatRequest::default()).await.unwrap();
//! assert_eq!(mock.recorded_requests().len(), 1);
//! # }
//! ```
//!
//! # Why `MockError` instead of `LlmError`?
//!
//! [`LlmError`] holds boxed trait objects and is not `Clone`.
//! [`MockError`] mirrors the variants tests need in a cloneable form and
//! converts to `LlmError` at dequeue time.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::LlmError;
use crate::provider::{ChatProvider, ChatReply, ChatRequest};

/// Cloneable error subset for mock queuing.
#[derive(Debug, Clone)]
pub enum MockError {
    /// Maps to [`LlmError::Http`].
    Http {
        /// HTTP status code, if any.
        status: Option<http::StatusCode>,
        /// Error message.
        message: String,
    },
    /// Maps to [`LlmError::Provider`].
    Provider {
        /// Provider error code.
        code: String,
        /// Error message.
        message: String,
    },
    /// Maps to [`LlmError::ResponseFormat`].
    ResponseFormat(String),
}

impl MockError {
    fn into_llm_error(self) -> LlmError {
        match self {
            Self::Http { status, message } => LlmError::Http {
                status,
                message,
                retryable: false,
            },
            Self::Provider { code, message } => LlmError::Provider {
                code,
                message,
                retryable: false,
            },
            Self::ResponseFormat(message) => LlmError::ResponseFormat {
                message,
                raw: String::new(),
            },
        }
    }
}

type Queued = (Option<Duration>, Result<ChatReply, MockError>);

/// A queue-based mock provider for unit and integration tests.
///
/// Each call to [`send`](ChatProvider::send) pops the front of the queue
/// and records the request for later assertion via
/// [`recorded_requests`](Self::recorded_requests).
///
/// # Panics
///
/// `send` panics if the queue is empty.
#[derive(Default)]
pub struct MockProvider {
    replies: Mutex<VecDeque<Queued>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockProvider")
            .field("queued_replies", &self.replies.lock().unwrap().len())
            .field("recorded_requests", &self.requests.lock().unwrap().len())
            .finish()
    }
}

impl MockProvider {
    /// Creates a mock with an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a successful reply.
    pub fn queue_reply(&self, reply: ChatReply) -> &Self {
        self.replies.lock().unwrap().push_back((None, Ok(reply)));
        self
    }

    /// Enqueues a reply that is only delivered after `delay`.
    pub fn queue_delayed_reply(&self, delay: Duration, reply: ChatReply) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back((Some(delay), Ok(reply)));
        self
    }

    /// Enqueues an error.
    pub fn queue_error(&self, error: MockError) -> &Self {
        self.replies.lock().unwrap().push_back((None, Err(error)));
        self
    }

    /// Returns a clone of every request received, in call order.
    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of calls received.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ChatProvider for MockProvider {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let (delay, result) = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockProvider: no queued replies remaining");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result.map_err(MockError::into_llm_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;
    use crate::error::ErrorKind;
    use crate::test_helpers::sample_reply;

    #[tokio::test]
    async fn test_mock_returns_queued_in_order() {
        let mock = MockProvider::new();
        mock.queue_reply(sample_reply("first"))
            .queue_reply(sample_reply("second"));

        let a = mock.send(&ChatRequest::default()).await.unwrap();
        let b = mock.send(&ChatRequest::default()).await.unwrap();
        assert_eq!(a.entries[0].message.text().as_deref(), Some("first"));
        assert_eq!(b.entries[0].message.text().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_mock_records_requests() {
        let mock = MockProvider::new();
        mock.queue_reply(sample_reply("ok"));
        let request = ChatRequest {
            messages: vec![ChatMessage::user("hi")],
            tools: vec![],
        };
        mock.send(&request).await.unwrap();
        assert_eq!(mock.recorded_requests(), vec![request]);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_error() {
        let mock = MockProvider::new();
        mock.queue_error(MockError::Provider {
            code: "rate_limit".into(),
            message: "slow down".into(),
        });
        let err = mock.send(&ChatRequest::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_delayed_reply() {
        let mock = MockProvider::new();
        mock.queue_delayed_reply(Duration::from_millis(5), sample_reply("late"));
        let reply = mock.send(&ChatRequest::default()).await.unwrap();
        assert_eq!(reply.entries.len(), 1);
    }

    #[test]
    fn test_mock_debug() {
        let mock = MockProvider::new();
        mock.queue_reply(sample_reply("x"));
        let debug = format!("{mock:?}");
        assert!(debug.contains("queued_replies: 1"));
    }
}
