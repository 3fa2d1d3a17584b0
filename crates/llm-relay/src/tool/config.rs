//! Resolver configuration.

use std::time::Duration;

/// Configuration for [`ChatResolver`](super::ChatResolver).
///
/// ```rust
/// use std::time::Duration;
/// use llm_relay::tool::ResolverConfig;
///
/// let config = ResolverConfig {
///     timeout: Some(Duration::from_secs(30)),
///     ..Default::default()
/// };
/// assert!(config.parallel_tool_execution);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Deadline for the whole resolution, both rounds and the tool phase
    /// included. Default: none.
    pub timeout: Option<Duration>,
    /// Whether to run the requests of one round concurrently. Results come
    /// back in request order either way. Default: true.
    pub parallel_tool_execution: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            parallel_tool_execution: true,
        }
    }
}
