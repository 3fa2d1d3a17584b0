//! Callable tool targets.
//!
//! Every tool ends up as a [`ToolWrapper`]: a [`ToolDefinition`], the
//! callable's parameter order, and an object-safe [`ToolHandler`]. Wrappers
//! are built once at registration and shared read-only afterwards.
//!
//! Host functions come in through two doors:
//!
//! - [`tool_fn`] / [`tool_fn_sync`] for free-standing closures, and
//! - [`ToolMethod`], which describes one method of a receiver type. A
//!   [`ToolCatalog`](super::ToolCatalog) binds the receiver when it
//!   registers the method.
//!
//! Return values are serialized to JSON once the call completes, so a tool
//! may return any `Serialize` type. Returning `()` or `None` serializes to
//! `null`, which the invoker rejects.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::ToolError;
use super::definition::{ParamSpec, ToolDefinition};
use super::value::BoundArgs;
use crate::error::LlmError;

/// The future a [`ToolHandler`] returns.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;

/// Something that can run with bound arguments.
///
/// Object-safe so wrappers can hold `Arc<dyn ToolHandler>`. Implementations
/// must not do any work before the returned future is first polled; the
/// invoker relies on that to catch panics.
pub trait ToolHandler: Send + Sync {
    /// Runs the tool.
    fn call(&self, args: BoundArgs) -> ToolFuture<'_>;
}

struct AsyncFn<F>(F);

impl<F, Fut, O> ToolHandler for AsyncFn<F>
where
    F: Fn(BoundArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
    O: Serialize,
{
    fn call(&self, args: BoundArgs) -> ToolFuture<'_> {
        Box::pin(async move {
            let output = (self.0)(args).await?;
            Ok(serde_json::to_value(output)?)
        })
    }
}

struct SyncFn<F>(F);

impl<F, O> ToolHandler for SyncFn<F>
where
    F: Fn(BoundArgs) -> Result<O, ToolError> + Send + Sync,
    O: Serialize,
{
    fn call(&self, args: BoundArgs) -> ToolFuture<'_> {
        Box::pin(async move {
            let output = (self.0)(args)?;
            Ok(serde_json::to_value(output)?)
        })
    }
}

/// A tool definition bound to its callable.
#[derive(Clone)]
pub struct ToolWrapper {
    definition: ToolDefinition,
    parameter_order: Arc<[String]>,
    receiver: Option<&'static str>,
    handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolWrapper")
            .field("name", &self.definition.name)
            .field("receiver", &self.receiver)
            .finish_non_exhaustive()
    }
}

impl ToolWrapper {
    /// Wraps a handler. The callable's parameter order is the order of
    /// `specs`.
    ///
    /// # Errors
    ///
    /// [`LlmError::Configuration`] if the definition cannot be derived.
    pub fn new(
        name: impl Into<String>,
        description: Option<&str>,
        specs: &[ParamSpec],
        handler: Arc<dyn ToolHandler>,
    ) -> Result<Self, LlmError> {
        let definition = ToolDefinition::from_specs(name, description, specs)?;
        let parameter_order = specs.iter().map(|s| s.name().to_string()).collect();
        Ok(Self {
            definition,
            parameter_order,
            receiver: None,
            handler,
        })
    }

    fn with_receiver(mut self, receiver: &'static str) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// The tool's definition.
    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// The tool's name.
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Parameter names in the order the callable takes them.
    pub fn parameter_order(&self) -> &Arc<[String]> {
        &self.parameter_order
    }

    /// Type name of the bound receiver, or `None` for a free-standing
    /// function.
    pub fn receiver(&self) -> Option<&'static str> {
        self.receiver
    }

    pub(crate) fn handler(&self) -> &dyn ToolHandler {
        self.handler.as_ref()
    }
}

/// Wraps an async closure as a free-standing tool.
///
/// ```rust
/// use llm_relay::tool::{ParamSpec, ToolError, tool_fn};
///
/// let add = tool_fn(
///     "add",
///     Some("Add two integers"),
///     &[ParamSpec::of::<i64>("a"), ParamSpec::of::<i64>("b")],
///     |args| async move {
///         let (a, b): (i64, i64) = (args.get(0)?, args.get(1)?);
///         Ok::<_, ToolError>(a + b)
///     },
/// )
/// .unwrap();
/// assert_eq!(add.name(), "add");
/// ```
///
/// # Errors
///
/// [`LlmError::Configuration`] if the definition cannot be derived.
pub fn tool_fn<F, Fut, O>(
    name: impl Into<String>,
    description: Option<&str>,
    params: &[ParamSpec],
    f: F,
) -> Result<ToolWrapper, LlmError>
where
    F: Fn(BoundArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
    O: Serialize + 'static,
{
    ToolWrapper::new(name, description, params, Arc::new(AsyncFn(f)))
}

/// Wraps a synchronous closure as a free-standing tool.
///
/// # Errors
///
/// [`LlmError::Configuration`] if the definition cannot be derived.
pub fn tool_fn_sync<F, O>(
    name: impl Into<String>,
    description: Option<&str>,
    params: &[ParamSpec],
    f: F,
) -> Result<ToolWrapper, LlmError>
where
    F: Fn(BoundArgs) -> Result<O, ToolError> + Send + Sync + 'static,
    O: Serialize + 'static,
{
    ToolWrapper::new(name, description, params, Arc::new(SyncFn(f)))
}

type BindReceiver<R> = Box<dyn FnOnce(Arc<R>) -> Arc<dyn ToolHandler> + Send>;

enum MethodBody<R> {
    Instance(BindReceiver<R>),
    Associated(Arc<dyn ToolHandler>),
}

/// What a name resolver sees of a [`ToolMethod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodInfo<'a> {
    /// The host method's identifier.
    pub method: &'a str,
    /// The explicit tool name, if the method was annotated with one.
    pub tool_name: Option<&'a str>,
    /// Whether the method needs a receiver instance.
    pub needs_receiver: bool,
}

/// One method of the receiver type `R`, described for registration.
///
/// A method only becomes a tool when the catalog's name resolver gives it a
/// name. The default resolver uses the explicit name set with
/// [`tool`](Self::tool), so unannotated methods stay invisible.
///
/// ```rust
/// use std::sync::Arc;
/// use llm_relay::tool::{ParamSpec, ToolCatalog, ToolError, ToolMethod};
///
/// struct Weather;
///
/// impl Weather {
///     fn forecast(&self, city: &str) -> String {
///         format!("sunny in {city}")
///     }
/// }
///
/// let mut catalog = ToolCatalog::new();
/// catalog
///     .register_receiver(
///         Arc::new(Weather),
///         vec![
///             ToolMethod::sync("forecast", |w: &Weather, args| {
///                 Ok::<_, ToolError>(w.forecast(&args.get::<String>(0)?))
///             })
///             .tool("get_forecast")
///             .describe("Forecast for a city")
///             .param(ParamSpec::of::<String>("city")),
///         ],
///     )
///     .unwrap();
/// assert!(catalog.contains("get_forecast"));
/// ```
pub struct ToolMethod<R> {
    method: &'static str,
    tool_name: Option<String>,
    description: Option<String>,
    params: Vec<ParamSpec>,
    body: MethodBody<R>,
}

impl<R> fmt::Debug for ToolMethod<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolMethod")
            .field("method", &self.method)
            .field("tool_name", &self.tool_name)
            .field("params", &self.params.len())
            .finish_non_exhaustive()
    }
}

impl<R: Send + Sync + 'static> ToolMethod<R> {
    /// A synchronous method taking `&R`.
    pub fn sync<F, O>(method: &'static str, f: F) -> Self
    where
        F: Fn(&R, BoundArgs) -> Result<O, ToolError> + Send + Sync + 'static,
        O: Serialize + 'static,
    {
        let bind: BindReceiver<R> = Box::new(move |receiver: Arc<R>| {
            Arc::new(SyncFn(move |args| f(&receiver, args))) as Arc<dyn ToolHandler>
        });
        Self::with_body(method, MethodBody::Instance(bind))
    }

    /// An async method. The closure receives the shared receiver so the
    /// returned future can own it.
    pub fn asynchronous<F, Fut, O>(method: &'static str, f: F) -> Self
    where
        F: Fn(Arc<R>, BoundArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
        O: Serialize + 'static,
    {
        let bind: BindReceiver<R> = Box::new(move |receiver: Arc<R>| {
            Arc::new(AsyncFn(move |args| f(Arc::clone(&receiver), args))) as Arc<dyn ToolHandler>
        });
        Self::with_body(method, MethodBody::Instance(bind))
    }

    /// A synchronous associated function that needs no receiver.
    pub fn associated_sync<F, O>(method: &'static str, f: F) -> Self
    where
        F: Fn(BoundArgs) -> Result<O, ToolError> + Send + Sync + 'static,
        O: Serialize + 'static,
    {
        Self::with_body(method, MethodBody::Associated(Arc::new(SyncFn(f))))
    }

    /// An async associated function that needs no receiver.
    pub fn associated<F, Fut, O>(method: &'static str, f: F) -> Self
    where
        F: Fn(BoundArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
        O: Serialize + 'static,
    {
        Self::with_body(method, MethodBody::Associated(Arc::new(AsyncFn(f))))
    }

    fn with_body(method: &'static str, body: MethodBody<R>) -> Self {
        Self {
            method,
            tool_name: None,
            description: None,
            params: Vec::new(),
            body,
        }
    }

    /// Annotates the method with an explicit tool name.
    #[must_use]
    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.tool_name = Some(name.into());
        self
    }

    /// Annotates the method with a description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends the next parameter in declaration order.
    #[must_use]
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// What a name resolver gets to look at.
    pub fn info(&self) -> MethodInfo<'_> {
        MethodInfo {
            method: self.method,
            tool_name: self.tool_name.as_deref(),
            needs_receiver: matches!(self.body, MethodBody::Instance(_)),
        }
    }

    /// Builds the wrapper under `name`. Instance methods need `receiver`.
    pub(crate) fn into_wrapper(
        self,
        name: String,
        receiver: Option<&Arc<R>>,
    ) -> Result<ToolWrapper, LlmError> {
        let handler = match (self.body, receiver) {
            (MethodBody::Associated(handler), _) => {
                return ToolWrapper::new(name, self.description.as_deref(), &self.params, handler);
            }
            (MethodBody::Instance(bind), Some(receiver)) => bind(Arc::clone(receiver)),
            (MethodBody::Instance(_), None) => {
                return Err(LlmError::Configuration(format!(
                    "method '{}' needs a receiver instance",
                    self.method
                )));
            }
        };
        Ok(
            ToolWrapper::new(name, self.description.as_deref(), &self.params, handler)?
                .with_receiver(std::any::type_name::<R>()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::value::ArgValue;
    use serde_json::json;

    fn args(wrapper: &ToolWrapper, values: Vec<ArgValue>) -> BoundArgs {
        BoundArgs::new(Arc::clone(wrapper.parameter_order()), values)
    }

    #[tokio::test]
    async fn test_tool_fn_serializes_output() {
        let wrapper = tool_fn(
            "echo",
            None,
            &[ParamSpec::of::<String>("text")],
            |args| async move { Ok::<_, ToolError>(json!({"echo": args.get::<String>(0)?})) },
        )
        .unwrap();
        let out = wrapper
            .handler()
            .call(args(&wrapper, vec![ArgValue::String("hi".into())]))
            .await
            .unwrap();
        assert_eq!(out, json!({"echo": "hi"}));
        assert_eq!(wrapper.receiver(), None);
    }

    #[tokio::test]
    async fn test_tool_fn_sync_unit_is_null() {
        let wrapper = tool_fn_sync("noop", None, &[], |_| Ok::<_, ToolError>(())).unwrap();
        let out = wrapper.handler().call(args(&wrapper, vec![])).await.unwrap();
        assert_eq!(out, Value::Null);
    }

    #[test]
    fn test_parameter_order_follows_specs() {
        let wrapper = tool_fn_sync(
            "t",
            None,
            &[ParamSpec::of::<bool>("b"), ParamSpec::of::<String>("a")],
            |_| Ok::<_, ToolError>(1),
        )
        .unwrap();
        assert_eq!(&wrapper.parameter_order()[..], ["b", "a"]);
    }

    #[test]
    fn test_bad_specs_fail_at_construction() {
        let result = tool_fn_sync(
            "t",
            None,
            &[ParamSpec::of::<Vec<String>>("tags")],
            |_| Ok::<_, ToolError>(1),
        );
        assert!(matches!(result, Err(LlmError::Configuration(_))));
    }

    struct Counter {
        start: i64,
    }

    #[tokio::test]
    async fn test_instance_method_binds_receiver() {
        let method = ToolMethod::sync("add", |c: &Counter, args| {
            Ok::<_, ToolError>(c.start + args.get::<i64>(0)?)
        })
        .tool("add")
        .param(ParamSpec::of::<i64>("n"));
        assert!(method.info().needs_receiver);

        let receiver = Arc::new(Counter { start: 40 });
        let wrapper = method.into_wrapper("add".into(), Some(&receiver)).unwrap();
        assert!(wrapper.receiver().unwrap().ends_with("Counter"));
        let out = wrapper
            .handler()
            .call(args(&wrapper, vec![ArgValue::Int(2)]))
            .await
            .unwrap();
        assert_eq!(out, json!(42));
    }

    #[tokio::test]
    async fn test_async_instance_method_owns_receiver() {
        let method = ToolMethod::asynchronous("double", |c: Arc<Counter>, _args| async move {
            Ok::<_, ToolError>(c.start * 2)
        });
        let receiver = Arc::new(Counter { start: 21 });
        let wrapper = method.into_wrapper("double".into(), Some(&receiver)).unwrap();
        drop(receiver);
        let out = wrapper.handler().call(args(&wrapper, vec![])).await.unwrap();
        assert_eq!(out, json!(42));
    }

    #[test]
    fn test_instance_method_without_receiver_fails() {
        let method = ToolMethod::sync("m", |_: &Counter, _| Ok::<_, ToolError>(0));
        let result = method.into_wrapper("m".into(), None);
        assert!(matches!(result, Err(LlmError::Configuration(_))));
    }

    #[test]
    fn test_method_info() {
        let method = ToolMethod::<Counter>::associated_sync("version", |_| Ok::<_, ToolError>("1"))
            .tool("version");
        let info = method.info();
        assert_eq!(info.method, "version");
        assert_eq!(info.tool_name, Some("version"));
        assert!(!info.needs_receiver);
    }
}
