//! Unified error type for all relay operations.
//!
//! Providers, the tool pipeline, and the resolver all report failures as
//! [`LlmError`]. Every variant belongs to one [`ErrorKind`], which is what
//! callers should match on when deciding how to react:
//!
//! ```rust
//! use llm_relay_core::{ErrorKind, LlmError};
//!
//! fn user_message(err: &LlmError) -> &'static str {
//!     match err.kind() {
//!         ErrorKind::InvalidRequest => "the request could not be carried out",
//!         ErrorKind::ServiceError => "the model service failed, try again later",
//!         _ => "something went wrong",
//!     }
//! }
//! ```
//!
//! # Phase notes
//!
//! The resolver wraps terminal errors in [`LlmError::Traced`] to record
//! which phase produced them. The wrapper is transparent to
//! [`kind`](LlmError::kind) and [`root`](LlmError::root).

use std::fmt;

/// The category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Malformed or unmappable tool argument, unknown tool, missing
    /// required parameter, or invalid tool configuration.
    InvalidRequest,
    /// The provider returned something unusable.
    InvalidResponse,
    /// A produced value failed validation, e.g. a tool returned nothing.
    ValidationFailed,
    /// Provider-side failure: rate limit, content filter, truncation.
    ServiceError,
    /// An unexpected shape or fault.
    Unhandled,
    /// A value is absent where absence is meaningful.
    NotFound,
    /// The operation was cancelled or ran out of time.
    Cancelled,
}

/// The resolution phase an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionPhase {
    /// The first provider call.
    InitialCall,
    /// Tool lookup, binding, and execution.
    ToolPhase,
    /// The provider call made after tool results were appended.
    Continuation,
}

impl fmt::Display for ResolutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InitialCall => "initial call",
            Self::ToolPhase => "tool phase",
            Self::Continuation => "continuation call",
        })
    }
}

/// The unified error type returned by all relay operations.
///
/// Variants are `#[non_exhaustive]`; always include a wildcard arm, or
/// match on [`kind`](Self::kind) instead.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LlmError {
    /// An HTTP-level failure talking to a provider.
    #[error("HTTP error (status={status:?}): {message}")]
    Http {
        /// The HTTP status code, if one was received.
        status: Option<http::StatusCode>,
        /// A human-readable description of the failure.
        message: String,
        /// Whether the caller should retry this request.
        retryable: bool,
    },

    /// A provider-specific failure such as a rate limit or content filter.
    #[error("Provider error ({code}): {message}")]
    Provider {
        /// Provider-defined error code (e.g. `"content_filter"`).
        code: String,
        /// Human-readable error description.
        message: String,
        /// Whether the caller should retry this request.
        retryable: bool,
    },

    /// The request was malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The model asked for a tool the catalog does not contain.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A tool's arguments could not be bound.
    #[error("Invalid arguments for tool '{tool_name}': {source}")]
    Bind {
        /// The tool being called.
        tool_name: String,
        /// What went wrong.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A tool could not be registered.
    #[error("Tool configuration error: {0}")]
    Configuration(String),

    /// A tool returned an error.
    #[error("Tool execution error ({tool_name}): {message}")]
    ToolExecution {
        /// The tool that failed.
        tool_name: String,
        /// The tool's error message.
        message: String,
    },

    /// A tool panicked.
    #[error("Tool '{tool_name}' panicked: {message}")]
    ToolPanicked {
        /// The tool that panicked.
        tool_name: String,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// A tool completed without producing a value.
    #[error("Tool '{0}' returned nothing")]
    ToolReturnedNothing(String),

    /// The provider's response could not be used.
    #[error("Response format error: {message}")]
    ResponseFormat {
        /// What went wrong.
        message: String,
        /// The raw response body, for diagnostics.
        raw: String,
    },

    /// An unsupported role, variant, or shape was encountered.
    #[error("Unhandled: {0}")]
    Unhandled(String),

    /// A lookup found nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation exceeded its deadline.
    #[error("Operation timed out after {elapsed_ms}ms")]
    Timeout {
        /// Milliseconds elapsed before the timeout fired.
        elapsed_ms: u64,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// An error annotated with the resolution phase that produced it.
    #[error("{phase}: {source}")]
    Traced {
        /// Where the error happened.
        phase: ResolutionPhase,
        /// The underlying error.
        #[source]
        source: Box<LlmError>,
    },
}

impl LlmError {
    /// The category of this error, looking through phase notes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http { .. } | Self::Provider { .. } => ErrorKind::ServiceError,
            Self::InvalidRequest(_)
            | Self::UnknownTool(_)
            | Self::Bind { .. }
            | Self::Configuration(_) => ErrorKind::InvalidRequest,
            Self::ResponseFormat { .. } => ErrorKind::InvalidResponse,
            Self::ToolReturnedNothing(_) => ErrorKind::ValidationFailed,
            Self::ToolExecution { .. } | Self::ToolPanicked { .. } | Self::Unhandled(_) => {
                ErrorKind::Unhandled
            }
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Timeout { .. } | Self::Cancelled => ErrorKind::Cancelled,
            Self::Traced { source, .. } => source.kind(),
        }
    }

    /// The innermost error, with all phase notes removed.
    pub fn root(&self) -> &Self {
        match self {
            Self::Traced { source, .. } => source.root(),
            other => other,
        }
    }

    /// The outermost phase note, if any.
    pub fn phase(&self) -> Option<ResolutionPhase> {
        match self {
            Self::Traced { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Wraps this error with a phase note.
    #[must_use]
    pub fn in_phase(self, phase: ResolutionPhase) -> Self {
        Self::Traced {
            phase,
            source: Box::new(self),
        }
    }

    /// Returns `true` if the error is transient and the request may succeed
    /// on retry.
    pub fn is_retryable(&self) -> bool {
        match self.root() {
            Self::Http { retryable, .. } | Self::Provider { retryable, .. } => *retryable,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::ResponseFormat {
            message: err.to_string(),
            raw: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_http() {
        let err = LlmError::Http {
            status: Some(http::StatusCode::TOO_MANY_REQUESTS),
            message: "rate limited".into(),
            retryable: true,
        };
        let display = format!("{err}");
        assert!(display.contains("429"));
        assert!(display.contains("rate limited"));
    }

    #[test]
    fn test_error_display_provider() {
        let err = LlmError::Provider {
            code: "content_filter".into(),
            message: "blocked".into(),
            retryable: false,
        };
        let display = format!("{err}");
        assert!(display.contains("content_filter"));
        assert!(display.contains("blocked"));
        assert_eq!(err.kind(), ErrorKind::ServiceError);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            LlmError::UnknownTool("x".into()).kind(),
            ErrorKind::InvalidRequest
        );
        assert_eq!(
            LlmError::Configuration("x".into()).kind(),
            ErrorKind::InvalidRequest
        );
        assert_eq!(
            LlmError::ToolReturnedNothing("x".into()).kind(),
            ErrorKind::ValidationFailed
        );
        assert_eq!(
            LlmError::ToolPanicked {
                tool_name: "x".into(),
                message: "boom".into()
            }
            .kind(),
            ErrorKind::Unhandled
        );
        assert_eq!(LlmError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(LlmError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            LlmError::ResponseFormat {
                message: "bad".into(),
                raw: String::new()
            }
            .kind(),
            ErrorKind::InvalidResponse
        );
    }

    #[test]
    fn test_traced_preserves_kind() {
        let err = LlmError::UnknownTool("search".into())
            .in_phase(ResolutionPhase::ToolPhase)
            .in_phase(ResolutionPhase::Continuation);
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(err.phase(), Some(ResolutionPhase::Continuation));
        assert!(matches!(err.root(), LlmError::UnknownTool(name) if name == "search"));
    }

    #[test]
    fn test_traced_display_names_phase() {
        let err = LlmError::Timeout { elapsed_ms: 10 }.in_phase(ResolutionPhase::Continuation);
        let display = format!("{err}");
        assert!(display.starts_with("continuation call: "));
        assert!(display.contains("10ms"));
    }

    #[test]
    fn test_traced_source_chain() {
        use std::error::Error;
        let err = LlmError::Cancelled.in_phase(ResolutionPhase::InitialCall);
        let source = err.source().expect("Traced should have a source");
        assert_eq!(format!("{source}"), "Operation cancelled");
    }

    #[test]
    fn test_error_retryable() {
        let err = LlmError::Provider {
            code: "overloaded".into(),
            message: "busy".into(),
            retryable: true,
        }
        .in_phase(ResolutionPhase::InitialCall);
        assert!(err.is_retryable());
        assert!(LlmError::Timeout { elapsed_ms: 1 }.is_retryable());
        assert!(!LlmError::UnknownTool("x".into()).is_retryable());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlmError>();
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not valid json").unwrap_err();
        let err: LlmError = json_err.into();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    }
}
