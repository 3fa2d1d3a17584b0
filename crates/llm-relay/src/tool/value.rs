//! Bound argument values handed to tool functions.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::ToolError;

/// An exact base-10 number: `units × 10^-scale`.
///
/// Used for parameters declared as fixed-point decimals so that values such
/// as `0.1` reach the tool without binary floating-point rounding. Values
/// are kept normalized (no trailing fractional zeros), so equal numbers
/// compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedDecimal {
    units: i128,
    scale: u32,
}

/// Largest scale accepted by [`FixedDecimal`].
const MAX_SCALE: u32 = 28;

impl FixedDecimal {
    /// Creates `units × 10^-scale`, or `None` if `scale` is too large.
    pub fn new(units: i128, scale: u32) -> Option<Self> {
        (scale <= MAX_SCALE).then(|| Self { units, scale }.normalized())
    }

    /// The unscaled integer value.
    pub fn units(&self) -> i128 {
        self.units
    }

    /// Number of fractional digits.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Lossy conversion for display or approximate math.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn to_f64(&self) -> f64 {
        self.units as f64 / 10f64.powi(self.scale as i32)
    }

    fn normalized(mut self) -> Self {
        while self.scale > 0 && self.units % 10 == 0 {
            self.units /= 10;
            self.scale -= 1;
        }
        self
    }
}

impl FromStr for FixedDecimal {
    type Err = ToolError;

    /// Parses plain or exponent notation: `-12.50`, `3`, `1.5e-3`, `2E10`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ToolError::new(format!("'{s}' is not a decimal number"));

        let (mantissa, exponent) = match s.find(['e', 'E']) {
            Some(pos) => {
                let exp: i64 = s[pos + 1..].parse().map_err(|_| invalid())?;
                (&s[..pos], exp)
            }
            None => (s, 0),
        };
        let (negative, digits) = match mantissa.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let mut units: i128 = 0;
        for c in whole.chars().chain(fraction.chars()) {
            let digit = c.to_digit(10).ok_or_else(invalid)?;
            units = units
                .checked_mul(10)
                .and_then(|u| u.checked_add(i128::from(digit)))
                .ok_or_else(invalid)?;
        }

        let mut scale = i64::try_from(fraction.len())
            .ok()
            .and_then(|len| len.checked_sub(exponent))
            .filter(|scale| *scale <= i64::from(MAX_SCALE) + 39)
            .ok_or_else(invalid)?;
        while scale < 0 {
            units = units.checked_mul(10).ok_or_else(invalid)?;
            scale += 1;
        }
        let mut decimal = Self {
            units: if negative { -units } else { units },
            scale: u32::try_from(scale).map_err(|_| invalid())?,
        };
        decimal = decimal.normalized();
        if decimal.scale > MAX_SCALE {
            return Err(invalid());
        }
        Ok(decimal)
    }
}

impl fmt::Display for FixedDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.units);
        }
        let sign = if self.units < 0 { "-" } else { "" };
        let digits = self.units.unsigned_abs().to_string();
        let scale = self.scale as usize;
        if digits.len() > scale {
            let (whole, fraction) = digits.split_at(digits.len() - scale);
            write!(f, "{sign}{whole}.{fraction}")
        } else {
            write!(f, "{sign}0.{digits:0>scale$}")
        }
    }
}

impl Serialize for FixedDecimal {
    /// Serializes as a string to keep every digit.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single argument after binding.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Explicit JSON `null` for a nullable parameter.
    Null,
    /// A string.
    String(String),
    /// A signed integer (`i32` or `i64` parameters).
    Int(i64),
    /// An unsigned integer (`u32` or `u64` parameters).
    UInt(u64),
    /// A floating-point number (`f32` or `f64` parameters).
    Float(f64),
    /// A fixed-point decimal.
    Decimal(FixedDecimal),
    /// A boolean.
    Bool(bool),
    /// An enumeration literal, in its declared spelling.
    Enum(String),
}

/// Conversion from a bound [`ArgValue`] into a host type.
pub trait FromArg: Sized {
    /// Returns `None` if the value does not hold this type.
    fn from_arg(value: &ArgValue) -> Option<Self>;
}

impl FromArg for String {
    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::String(s) | ArgValue::Enum(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromArg for bool {
    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

macro_rules! int_from_arg {
    ($($ty:ty),*) => {$(
        impl FromArg for $ty {
            fn from_arg(value: &ArgValue) -> Option<Self> {
                match value {
                    ArgValue::Int(i) => <$ty>::try_from(*i).ok(),
                    ArgValue::UInt(u) => <$ty>::try_from(*u).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

int_from_arg!(i32, i64, u32, u64);

impl FromArg for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Float(f) => Some(*f),
            ArgValue::Int(i) => Some(*i as f64),
            ArgValue::UInt(u) => Some(*u as f64),
            _ => None,
        }
    }
}

impl FromArg for f32 {
    #[allow(clippy::cast_possible_truncation)] // range checked at bind time
    fn from_arg(value: &ArgValue) -> Option<Self> {
        f64::from_arg(value).map(|f| f as f32)
    }
}

impl FromArg for FixedDecimal {
    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Decimal(d) => Some(*d),
            ArgValue::Int(i) => Self::new(i128::from(*i), 0),
            ArgValue::UInt(u) => Self::new(i128::from(*u), 0),
            _ => None,
        }
    }
}

impl<T: FromArg> FromArg for Option<T> {
    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Null => Some(None),
            other => T::from_arg(other).map(Some),
        }
    }
}

/// A closed set of literals usable as a tool parameter type.
///
/// ```rust
/// use llm_relay::tool::ToolEnum;
///
/// #[derive(Debug, PartialEq)]
/// enum Unit { Celsius, Fahrenheit }
///
/// impl ToolEnum for Unit {
///     const LITERALS: &'static [&'static str] = &["celsius", "fahrenheit"];
///
///     fn from_literal(literal: &str) -> Option<Self> {
///         match literal {
///             "celsius" => Some(Self::Celsius),
///             "fahrenheit" => Some(Self::Fahrenheit),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait ToolEnum: Sized {
    /// Every accepted literal, in declaration order.
    const LITERALS: &'static [&'static str];

    /// Parses one of [`LITERALS`](Self::LITERALS).
    fn from_literal(literal: &str) -> Option<Self>;
}

/// Arguments bound to a tool's parameters, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArgs {
    names: Arc<[String]>,
    values: Vec<ArgValue>,
}

impl BoundArgs {
    pub(crate) fn new(names: Arc<[String]>, values: Vec<ArgValue>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` for a parameterless tool.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw value at `index`.
    pub fn value(&self, index: usize) -> Option<&ArgValue> {
        self.values.get(index)
    }

    /// All values, in parameter order.
    pub fn values(&self) -> &[ArgValue] {
        &self.values
    }

    /// Parameter names paired with their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.names.iter().map(String::as_str).zip(&self.values)
    }

    /// The argument at `index`, converted to `T`.
    pub fn get<T: FromArg>(&self, index: usize) -> Result<T, ToolError> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| ToolError::new(format!("no argument at position {index}")))?;
        T::from_arg(value).ok_or_else(|| {
            ToolError::new(format!(
                "argument '{}' has unexpected type {value:?}",
                self.names[index]
            ))
        })
    }

    /// The argument named `name`, converted to `T`.
    pub fn get_named<T: FromArg>(&self, name: &str) -> Result<T, ToolError> {
        let index = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ToolError::new(format!("no argument named '{name}'")))?;
        self.get(index)
    }

    /// The enumeration argument at `index`. `None` when the bound value is
    /// `null`.
    pub fn enumeration<E: ToolEnum>(&self, index: usize) -> Result<Option<E>, ToolError> {
        match self.values.get(index) {
            Some(ArgValue::Null) => Ok(None),
            Some(ArgValue::Enum(literal)) => E::from_literal(literal)
                .map(Some)
                .ok_or_else(|| ToolError::new(format!("unknown literal '{literal}'"))),
            other => Err(ToolError::new(format!(
                "argument at position {index} is not an enumeration: {other:?}"
            ))),
        }
    }
}
