//! Declarative tool descriptions.
//!
//! A host function is described by [`ParamSpec`]s, which record each
//! parameter's *declared* host type. Building a [`ToolDefinition`] maps every
//! declared type onto the closed [`ToolParameterType`] set the model can
//! understand, failing at registration time for anything outside it.
//!
//! ```rust
//! use llm_relay::tool::{ParamSpec, ToolDefinition};
//! use serde_json::json;
//!
//! let def = ToolDefinition::from_specs(
//!     "forecast",
//!     Some("Weather forecast for a city"),
//!     &[
//!         ParamSpec::of::<String>("city").describe("City name"),
//!         ParamSpec::of::<Option<u32>>("days").default_value(json!(3)),
//!     ],
//! )
//! .unwrap();
//!
//! let schema = def.to_schema();
//! assert_eq!(schema.as_value()["parameters"]["required"], json!(["city"]));
//! ```

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value, json};

use super::binder::extract;
use super::value::{FixedDecimal, ToolEnum};
use crate::error::LlmError;
use crate::provider::ToolSchema;

/// The exact host numeric type a number parameter binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberKind {
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// [`FixedDecimal`]
    Decimal,
}

impl NumberKind {
    /// Returns `true` for the integer kinds.
    pub fn is_integer(self) -> bool {
        matches!(self, Self::I32 | Self::I64 | Self::U32 | Self::U64)
    }
}

impl fmt::Display for NumberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Decimal => "decimal",
        })
    }
}

/// The parameter types a model can be asked to supply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolParameterType {
    /// Free text.
    String,
    /// A number of the given host kind.
    Number(NumberKind),
    /// `true` or `false`.
    Boolean,
    /// One literal out of a fixed set.
    Enum(Vec<String>),
}

impl ToolParameterType {
    fn label(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Number(_) => "Number",
            Self::Boolean => "Boolean",
            Self::Enum(_) => "Enum",
        }
    }

    fn schema_type(&self) -> &'static str {
        match self {
            Self::String | Self::Enum(_) => "string",
            Self::Number(kind) if kind.is_integer() => "integer",
            Self::Number(_) => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// The type a host function declares for a parameter.
///
/// This is wider than [`ToolParameterType`]: it can describe optional
/// wrappers and types a model cannot supply. [`ToolDefinition::from_specs`]
/// unwraps one level of [`Optional`](Self::Optional) and rejects the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    /// A string.
    String,
    /// A number of the given kind.
    Number(NumberKind),
    /// A boolean.
    Boolean,
    /// An enumeration with these literals.
    Enum(Vec<String>),
    /// A nullable wrapper.
    Optional(Box<DeclaredType>),
    /// A homogeneous list.
    List(Box<DeclaredType>),
    /// Any other host type, by name.
    Other(String),
}

impl DeclaredType {
    /// The declared type of a host type.
    pub fn of<T: HostType>() -> Self {
        T::declared_type()
    }

    /// The declared type of a [`ToolEnum`].
    pub fn enumeration<E: ToolEnum>() -> Self {
        Self::Enum(E::LITERALS.iter().map(|s| (*s).to_string()).collect())
    }

    /// Wraps this type as nullable.
    #[must_use]
    pub fn optional(self) -> Self {
        Self::Optional(Box::new(self))
    }

    /// Maps onto a [`ToolParameterType`] plus whether `null` is allowed.
    fn infer(&self) -> Option<(ToolParameterType, bool)> {
        match self {
            Self::Optional(inner) => inner.infer_plain().map(|t| (t, true)),
            other => other.infer_plain().map(|t| (t, false)),
        }
    }

    fn infer_plain(&self) -> Option<ToolParameterType> {
        match self {
            Self::String => Some(ToolParameterType::String),
            Self::Number(kind) => Some(ToolParameterType::Number(*kind)),
            Self::Boolean => Some(ToolParameterType::Boolean),
            Self::Enum(literals) if !literals.is_empty() => {
                Some(ToolParameterType::Enum(literals.clone()))
            }
            Self::Enum(_) | Self::Optional(_) | Self::List(_) | Self::Other(_) => None,
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("String"),
            Self::Number(kind) => write!(f, "{kind}"),
            Self::Boolean => f.write_str("bool"),
            Self::Enum(literals) => write!(f, "enum({})", literals.join("|")),
            Self::Optional(inner) => write!(f, "Option<{inner}>"),
            Self::List(inner) => write!(f, "Vec<{inner}>"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Host types that can describe themselves as a [`DeclaredType`].
pub trait HostType {
    /// The declared type.
    fn declared_type() -> DeclaredType;
}

macro_rules! host_type {
    ($($ty:ty => $declared:expr),* $(,)?) => {$(
        impl HostType for $ty {
            fn declared_type() -> DeclaredType {
                $declared
            }
        }
    )*};
}

host_type! {
    String => DeclaredType::String,
    bool => DeclaredType::Boolean,
    i32 => DeclaredType::Number(NumberKind::I32),
    i64 => DeclaredType::Number(NumberKind::I64),
    u32 => DeclaredType::Number(NumberKind::U32),
    u64 => DeclaredType::Number(NumberKind::U64),
    f32 => DeclaredType::Number(NumberKind::F32),
    f64 => DeclaredType::Number(NumberKind::F64),
    FixedDecimal => DeclaredType::Number(NumberKind::Decimal),
    Value => DeclaredType::Other("serde_json::Value".into()),
}

impl<T: HostType> HostType for Option<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType::Optional(Box::new(T::declared_type()))
    }
}

impl<T: HostType> HostType for Vec<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType::List(Box::new(T::declared_type()))
    }
}

/// One declared parameter of a host function.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    name: String,
    description: Option<String>,
    declared: DeclaredType,
    default: Option<Value>,
}

impl ParamSpec {
    /// A parameter whose declared type is the host type `T`.
    pub fn of<T: HostType>(name: impl Into<String>) -> Self {
        Self::declared(name, T::declared_type())
    }

    /// A parameter taking one literal of `E`.
    pub fn enumeration<E: ToolEnum>(name: impl Into<String>) -> Self {
        Self::declared(name, DeclaredType::enumeration::<E>())
    }

    /// A parameter with an explicit declared type.
    pub fn declared(name: impl Into<String>, declared: DeclaredType) -> Self {
        Self {
            name: name.into(),
            description: None,
            declared,
            default: None,
        }
    }

    /// Sets the description shown to the model.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the declared default, which makes the parameter optional.
    #[must_use]
    pub fn default_value(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// The parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One parameter of a [`ToolDefinition`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToolParameter {
    /// Name the model uses in its JSON arguments.
    pub name: String,
    /// Description shown to the model.
    pub description: Option<String>,
    /// Value type.
    pub param_type: ToolParameterType,
    /// Whether an explicit `null` is a valid value.
    pub nullable: bool,
    /// Used when the model omits the parameter.
    pub default_value: Option<Value>,
}

impl ToolParameter {
    /// A parameter is optional exactly when it has a default.
    pub fn is_optional(&self) -> bool {
        self.default_value.is_some()
    }

    fn to_descriptor(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".into(), json!(self.name));
        if let Some(description) = &self.description {
            obj.insert("description".into(), json!(description));
        }
        obj.insert("type".into(), json!(self.param_type.label()));
        match &self.param_type {
            ToolParameterType::Number(kind) => {
                obj.insert("numberKind".into(), json!(kind.to_string()));
            }
            ToolParameterType::Enum(literals) => {
                obj.insert("values".into(), json!(literals));
            }
            ToolParameterType::String | ToolParameterType::Boolean => {}
        }
        obj.insert("nullable".into(), json!(self.nullable));
        obj.insert("isOptional".into(), json!(self.is_optional()));
        if let Some(default) = &self.default_value {
            obj.insert("defaultValue".into(), default.clone());
        }
        Value::Object(obj)
    }

    fn to_property(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.param_type.schema_type()));
        if let Some(description) = &self.description {
            prop.insert("description".into(), json!(description));
        }
        if let ToolParameterType::Enum(literals) = &self.param_type {
            prop.insert("enum".into(), json!(literals));
        }
        Value::Object(prop)
    }
}

/// Name, description, and ordered parameters of one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    /// Unique name within a catalog.
    pub name: String,
    /// What the tool does.
    pub description: Option<String>,
    /// Parameters in declaration order.
    pub parameters: Vec<ToolParameter>,
}

impl ToolDefinition {
    /// Derives a definition from declared parameters.
    ///
    /// # Errors
    ///
    /// [`LlmError::Configuration`] if a declared type cannot be mapped to a
    /// [`ToolParameterType`], a parameter name repeats, or a default value
    /// does not fit its parameter's type.
    pub fn from_specs(
        name: impl Into<String>,
        description: Option<&str>,
        specs: &[ParamSpec],
    ) -> Result<Self, LlmError> {
        let name = name.into();
        if name.is_empty() {
            return Err(LlmError::Configuration("tool name is empty".into()));
        }

        let mut seen = HashSet::new();
        let mut parameters = Vec::with_capacity(specs.len());
        for spec in specs {
            if !seen.insert(spec.name.as_str()) {
                return Err(LlmError::Configuration(format!(
                    "tool '{name}' declares parameter '{}' twice",
                    spec.name
                )));
            }
            let (param_type, nullable) = spec.declared.infer().ok_or_else(|| {
                LlmError::Configuration(format!(
                    "parameter '{}' of tool '{name}' has unsupported type {}",
                    spec.name, spec.declared
                ))
            })?;
            let parameter = ToolParameter {
                name: spec.name.clone(),
                description: spec.description.clone(),
                param_type,
                nullable,
                default_value: spec.default.clone(),
            };
            check_default(&name, &parameter)?;
            parameters.push(parameter);
        }

        Ok(Self {
            name,
            description: description.map(str::to_string),
            parameters,
        })
    }

    /// Looks up a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Names of parameters without a default, in declaration order.
    pub fn required(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| !p.is_optional())
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Generic descriptive JSON, for consumers that are not providers.
    pub fn to_descriptor(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters.iter().map(ToolParameter::to_descriptor).collect::<Vec<_>>(),
        })
    }

    /// JSON-Schema shaped description for providers:
    /// `{name, description, parameters: {type: "object", properties, required}}`.
    pub fn to_schema(&self) -> ToolSchema {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.to_property()))
            .collect();
        ToolSchema::new(json!({
            "name": self.name,
            "description": self.description.as_deref().unwrap_or_default(),
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": self.required(),
            },
        }))
    }
}

fn check_default(tool: &str, parameter: &ToolParameter) -> Result<(), LlmError> {
    let Some(default) = &parameter.default_value else {
        return Ok(());
    };
    let fits = match default {
        Value::Null => parameter.nullable,
        value => matches!(extract(parameter, value), Ok(Some(_))),
    };
    if fits {
        Ok(())
    } else {
        Err(LlmError::Configuration(format!(
            "default {default} of parameter '{}' in tool '{tool}' is not a valid {}",
            parameter.name,
            parameter.param_type.label()
        )))
    }
}
