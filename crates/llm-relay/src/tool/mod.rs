//! Tool calling.
//!
//! This module turns host functions into tools a model can call and runs
//! the two-round resolution around a [`ChatProvider`](crate::ChatProvider).
//!
//! # Architecture
//!
//! ```text
//!   ParamSpec / ToolMethod   : declared host signature
//!       │
//!   ToolDefinition           : name, description, typed parameters
//!       │                      (+ descriptor and schema JSON exports)
//!   ToolWrapper              : definition + parameter order + handler
//!       │
//!   ToolCatalog              : wrappers by name, shared read-only
//!       │
//!   bind()                   : JSON arguments → BoundArgs
//!   invoke()                 : BoundArgs → JSON result or LlmError
//!       │
//!   ChatResolver             : provider → tools → provider
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llm_relay::tool::{ChatResolver, ParamSpec, ToolCatalog, ToolEnum, ToolError, ToolMethod};
//! use llm_relay::{ChatMessage, ChatProvider, LlmError};
//! use serde_json::json;
//!
//! enum Unit { Celsius, Fahrenheit }
//!
//! impl ToolEnum for Unit {
//!     const LITERALS: &'static [&'static str] = &["celsius", "fahrenheit"];
//!     fn from_literal(literal: &str) -> Option<Self> {
//!         match literal {
//!             "celsius" => Some(Self::Celsius),
//!             "fahrenheit" => Some(Self::Fahrenheit),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! struct WeatherService;
//!
//! impl WeatherService {
//!     fn temperature(&self, city: &str, unit: Unit) -> f64 {
//!         match unit {
//!             Unit::Celsius => 21.0,
//!             Unit::Fahrenheit => 69.8,
//!         }
//!     }
//! }
//!
//! # async fn example(provider: impl ChatProvider) -> Result<(), LlmError> {
//! let mut catalog = ToolCatalog::new();
//! catalog.register_receiver(
//!     Arc::new(WeatherService),
//!     vec![
//!         ToolMethod::sync("temperature", |svc: &WeatherService, args| {
//!             let city: String = args.get(0)?;
//!             let unit = args.enumeration::<Unit>(1)?.unwrap_or(Unit::Celsius);
//!             Ok::<_, ToolError>(svc.temperature(&city, unit))
//!         })
//!         .tool("current_temperature")
//!         .describe("Current temperature in a city")
//!         .param(ParamSpec::of::<String>("city"))
//!         .param(ParamSpec::enumeration::<Unit>("unit").default_value(json!("celsius"))),
//!     ],
//! )?;
//!
//! let resolver = ChatResolver::new(provider, Arc::new(catalog));
//! let resolution = resolver
//!     .resolve(&[ChatMessage::user("How warm is it in Lisbon?")])
//!     .await?;
//! println!("{}", resolution.final_text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

mod binder;
mod catalog;
mod config;
mod definition;
mod error;
mod handler;
mod invoker;
mod resolver;
mod value;

pub use binder::{BindError, bind};
pub use catalog::{ToolCatalog, annotated_name};
pub use config::ResolverConfig;
pub use definition::{
    DeclaredType, HostType, NumberKind, ParamSpec, ToolDefinition, ToolParameter,
    ToolParameterType,
};
pub use error::ToolError;
pub use handler::{
    MethodInfo, ToolFuture, ToolHandler, ToolMethod, ToolWrapper, tool_fn, tool_fn_sync,
};
pub use invoker::{invoke, invoke_request};
pub use resolver::{ChatResolver, Resolution};
pub use value::{ArgValue, BoundArgs, FixedDecimal, FromArg, ToolEnum};
