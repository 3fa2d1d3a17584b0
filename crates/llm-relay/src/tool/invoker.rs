//! Running a bound tool and normalizing its outcome.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

use super::binder::bind;
use super::handler::ToolWrapper;
use super::value::BoundArgs;
use crate::chat::ToolRequest;
use crate::error::LlmError;

/// Runs `wrapper` with already-bound arguments.
///
/// Errors returned by the tool become [`LlmError::ToolExecution`], panics
/// become [`LlmError::ToolPanicked`], and a `null` result becomes
/// [`LlmError::ToolReturnedNothing`]. Nothing is retried.
///
/// # Errors
///
/// As above.
pub async fn invoke(wrapper: &ToolWrapper, args: BoundArgs) -> Result<Value, LlmError> {
    let tool_name = wrapper.name();
    // The handler call itself sits inside the guarded future so that a
    // panic while building the tool's future is caught as well.
    let outcome = AssertUnwindSafe(async { wrapper.handler().call(args).await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(Value::Null)) => Err(LlmError::ToolReturnedNothing(tool_name.to_string())),
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(LlmError::ToolExecution {
            tool_name: tool_name.to_string(),
            message: err.message,
        }),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(tool = tool_name, %message, "tool panicked");
            Err(LlmError::ToolPanicked {
                tool_name: tool_name.to_string(),
                message,
            })
        }
    }
}

/// Binds a model's request onto `wrapper` and runs it.
///
/// # Errors
///
/// [`LlmError::Bind`] if the arguments do not bind, otherwise as for
/// [`invoke`].
pub async fn invoke_request(
    wrapper: &ToolWrapper,
    request: &ToolRequest,
) -> Result<Value, LlmError> {
    let args = bind(
        wrapper.definition(),
        wrapper.parameter_order(),
        request.arguments.as_ref(),
    )
    .map_err(|err| LlmError::Bind {
        tool_name: wrapper.name().to_string(),
        source: Box::new(err),
    })?;

    let start = Instant::now();
    let result = invoke(wrapper, args).await;
    debug!(
        tool = wrapper.name(),
        call_id = %request.id,
        duration_ms = start.elapsed().as_millis(),
        ok = result.is_ok(),
        "tool executed"
    );
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tool::{BindError, ParamSpec, ToolError, tool_fn, tool_fn_sync};
    use serde_json::json;

    fn request(args: Value) -> ToolRequest {
        ToolRequest::new("call-1", "t", args)
    }

    #[tokio::test]
    async fn test_invoke_request_binds_and_runs() {
        let wrapper = tool_fn_sync(
            "t",
            None,
            &[ParamSpec::of::<i64>("a"), ParamSpec::of::<i64>("b")],
            |args| Ok::<_, ToolError>(args.get::<i64>(0)? * args.get::<i64>(1)?),
        )
        .unwrap();
        let out = invoke_request(&wrapper, &request(json!({"a": 6, "b": 7})))
            .await
            .unwrap();
        assert_eq!(out, json!(42));
    }

    #[tokio::test]
    async fn test_bind_failure_is_invalid_request() {
        let wrapper =
            tool_fn_sync("t", None, &[ParamSpec::of::<i64>("a")], |_| Ok::<_, ToolError>(1))
                .unwrap();
        let err = invoke_request(&wrapper, &request(json!({}))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        let LlmError::Bind { tool_name, source } = err else {
            panic!("expected a bind error");
        };
        assert_eq!(tool_name, "t");
        assert_eq!(
            source.downcast_ref::<BindError>(),
            Some(&BindError::MissingParameter("a".into()))
        );
    }

    #[tokio::test]
    async fn test_tool_error_becomes_execution_error() {
        let wrapper = tool_fn("t", None, &[], |_| async {
            Err::<i32, _>(ToolError::new("backend down"))
        })
        .unwrap();
        let err = invoke_request(&wrapper, &request(json!({}))).await.unwrap_err();
        assert!(
            matches!(&err, LlmError::ToolExecution { message, .. } if message == "backend down")
        );
        assert_eq!(err.kind(), ErrorKind::Unhandled);
    }

    #[tokio::test]
    async fn test_null_result_is_rejected() {
        let wrapper = tool_fn_sync("t", None, &[], |_| Ok::<Option<i32>, ToolError>(None)).unwrap();
        let err = invoke_request(&wrapper, &request(json!({}))).await.unwrap_err();
        assert!(matches!(err, LlmError::ToolReturnedNothing(ref name) if name == "t"));
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_sync_panic_is_caught() {
        let wrapper = tool_fn_sync("t", None, &[], |_| -> Result<i32, ToolError> {
            panic!("index out of bounds")
        })
        .unwrap();
        let err = invoke_request(&wrapper, &request(json!({}))).await.unwrap_err();
        assert!(
            matches!(&err, LlmError::ToolPanicked { message, .. } if message == "index out of bounds")
        );
        assert_eq!(err.kind(), ErrorKind::Unhandled);
    }

    #[tokio::test]
    async fn test_async_panic_is_caught() {
        let wrapper = tool_fn("t", None, &[], |_| async {
            tokio::task::yield_now().await;
            let detail = String::from("late failure");
            if detail.is_empty() {
                return Ok::<i32, ToolError>(0);
            }
            panic!("{detail}");
        })
        .unwrap();
        let err = invoke_request(&wrapper, &request(json!({}))).await.unwrap_err();
        assert!(matches!(&err, LlmError::ToolPanicked { message, .. } if message == "late failure"));
    }

    #[test]
    fn test_panic_message_fallback() {
        assert_eq!(panic_message(&42_u8), "non-string panic payload");
    }
}
