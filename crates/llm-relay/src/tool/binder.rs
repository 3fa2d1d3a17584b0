//! Binding JSON tool arguments onto a tool's parameters.
//!
//! [`bind`] walks the parameters in the callable's declaration order and
//! produces one [`ArgValue`] per parameter, or the first error it meets.

use std::sync::Arc;

use serde_json::{Map, Number, Value};

use super::definition::{NumberKind, ToolDefinition, ToolParameter, ToolParameterType};
use super::value::{ArgValue, BoundArgs, FixedDecimal};

/// Why a set of arguments could not be bound.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindError {
    /// A parameter without a default was absent or unusable.
    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    /// An enumeration parameter got a value outside its literal set.
    #[error("invalid value {value} for enumeration parameter '{name}'")]
    InvalidEnumValue {
        /// The parameter.
        name: String,
        /// The rejected value, as JSON text.
        value: String,
    },

    /// A number does not fit the parameter's numeric kind.
    #[error("number {value} does not fit parameter '{name}' of kind {kind}")]
    NumberOutOfRange {
        /// The parameter.
        name: String,
        /// The rejected value, as JSON text.
        value: String,
        /// The declared kind.
        kind: NumberKind,
    },

    /// The callable names a parameter the definition does not declare.
    #[error("parameter '{0}' is not declared by the tool definition")]
    UnknownParameter(String),

    /// The argument payload is not a JSON object.
    #[error("arguments must be a JSON object, got {0}")]
    InvalidPayload(String),
}

/// Binds `payload` onto the parameters named in `order`.
///
/// A missing or `null` payload counts as an empty object. Keys that match
/// no parameter are ignored. Binding stops at the first error.
///
/// # Errors
///
/// See [`BindError`].
pub fn bind(
    definition: &ToolDefinition,
    order: &Arc<[String]>,
    payload: Option<&Value>,
) -> Result<BoundArgs, BindError> {
    let empty = Map::new();
    let object = match payload {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(object)) => object,
        Some(other) => return Err(BindError::InvalidPayload(other.to_string())),
    };

    let values = order
        .iter()
        .map(|name| {
            let parameter = definition
                .parameter(name)
                .ok_or_else(|| BindError::UnknownParameter(name.clone()))?;
            bind_one(parameter, object.get(name))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BoundArgs::new(Arc::clone(order), values))
}

fn bind_one(parameter: &ToolParameter, value: Option<&Value>) -> Result<ArgValue, BindError> {
    match value {
        Some(Value::Null) if parameter.nullable => return Ok(ArgValue::Null),
        Some(Value::Null) | None => {}
        Some(value) => {
            if let Some(bound) = extract(parameter, value)? {
                return Ok(bound);
            }
        }
    }
    default_arg(parameter)
}

fn default_arg(parameter: &ToolParameter) -> Result<ArgValue, BindError> {
    let missing = || BindError::MissingParameter(parameter.name.clone());
    match &parameter.default_value {
        None => Err(missing()),
        Some(Value::Null) => Ok(ArgValue::Null),
        Some(default) => extract(parameter, default)?.ok_or_else(missing),
    }
}

/// Decodes one non-null JSON value as the parameter's type.
///
/// `Ok(None)` means the value is not of the parameter's primitive type at
/// all, and the caller should fall back to the default. Errors are values
/// of the right primitive type that are still unacceptable.
pub(crate) fn extract(
    parameter: &ToolParameter,
    value: &Value,
) -> Result<Option<ArgValue>, BindError> {
    match (&parameter.param_type, value) {
        (ToolParameterType::String, Value::String(s)) => Ok(Some(ArgValue::String(s.clone()))),
        (ToolParameterType::Boolean, Value::Bool(b)) => Ok(Some(ArgValue::Bool(*b))),
        (ToolParameterType::Number(kind), Value::Number(n)) => {
            number(*kind, n).map(Some).ok_or_else(|| BindError::NumberOutOfRange {
                name: parameter.name.clone(),
                value: n.to_string(),
                kind: *kind,
            })
        }
        (ToolParameterType::Enum(literals), value) => {
            literal(literals, value).map(Some).ok_or_else(|| BindError::InvalidEnumValue {
                name: parameter.name.clone(),
                value: value.to_string(),
            })
        }
        _ => Ok(None),
    }
}

/// Exact match first, then a case-insensitive one; the declared spelling is
/// what gets bound.
fn literal(literals: &[String], value: &Value) -> Option<ArgValue> {
    let text = value.as_str()?;
    literals
        .iter()
        .find(|l| *l == text)
        .or_else(|| literals.iter().find(|l| l.eq_ignore_ascii_case(text)))
        .map(|l| ArgValue::Enum(l.clone()))
}

fn number(kind: NumberKind, n: &Number) -> Option<ArgValue> {
    match kind {
        NumberKind::I32 => integer(n)
            .and_then(|i| i32::try_from(i).ok())
            .map(|i| ArgValue::Int(i.into())),
        NumberKind::I64 => integer(n)
            .and_then(|i| i64::try_from(i).ok())
            .map(ArgValue::Int),
        NumberKind::U32 => integer(n)
            .and_then(|i| u32::try_from(i).ok())
            .map(|u| ArgValue::UInt(u.into())),
        NumberKind::U64 => integer(n)
            .and_then(|i| u64::try_from(i).ok())
            .map(ArgValue::UInt),
        NumberKind::F64 => n.as_f64().filter(|f| f.is_finite()).map(ArgValue::Float),
        NumberKind::F32 => n
            .as_f64()
            .filter(|f| f.is_finite() && f.abs() <= f64::from(f32::MAX))
            .map(ArgValue::Float),
        NumberKind::Decimal => n
            .to_string()
            .parse::<FixedDecimal>()
            .ok()
            .map(ArgValue::Decimal),
    }
}

/// The integral value of `n`, accepting floats with no fractional part.
#[allow(clippy::cast_possible_truncation)]
fn integer(n: &Number) -> Option<i128> {
    if let Some(i) = n.as_i64() {
        return Some(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Some(u.into());
    }
    // Past u64::MAX the narrowing at the call site fails regardless.
    n.as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() < 1e20)
        .map(|f| f as i128)
}
