//! Typed values carried by bit records.

use std::fmt;

use fabcam_math::ContentHasher;
use serde_json::{json, Value};

/// The JSON value types a template field may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Whole number.
    Integer,
    /// Floating point number. Integers are accepted and widened.
    Real,
    /// String.
    Text,
    /// Boolean.
    Flag,
}

impl ValueType {
    /// Lowercase name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Integer => "int",
            ValueType::Real => "float",
            ValueType::Text => "str",
            ValueType::Flag => "bool",
        }
    }

    /// Whether a JSON value is acceptable for this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ValueType::Integer => value.is_i64() || value.is_u64(),
            ValueType::Real => value.is_number(),
            ValueType::Text => value.is_string(),
            ValueType::Flag => value.is_boolean(),
        }
    }
}

/// Render a type set as `(float, str)` for error messages.
pub fn describe_types(types: &[ValueType]) -> String {
    let names: Vec<&str> = types.iter().map(|t| t.name()).collect();
    format!("({})", names.join(", "))
}

/// An attribute value: material, flute count, spindle power and the like.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Whole number.
    Integer(i64),
    /// Floating point number.
    Real(f64),
    /// String.
    Text(String),
    /// Boolean.
    Flag(bool),
}

impl AttributeValue {
    /// The value type of this attribute.
    pub fn value_type(&self) -> ValueType {
        match self {
            AttributeValue::Integer(_) => ValueType::Integer,
            AttributeValue::Real(_) => ValueType::Real,
            AttributeValue::Text(_) => ValueType::Text,
            AttributeValue::Flag(_) => ValueType::Flag,
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Integer(v) => json!(v),
            AttributeValue::Real(v) => json!(v),
            AttributeValue::Text(v) => json!(v),
            AttributeValue::Flag(v) => json!(v),
        }
    }

    /// Read a JSON value, preferring integers over reals.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(AttributeValue::Flag(*v)),
            Value::String(v) => Some(AttributeValue::Text(v.clone())),
            Value::Number(n) => n
                .as_i64()
                .map(AttributeValue::Integer)
                .or_else(|| n.as_f64().map(AttributeValue::Real)),
            _ => None,
        }
    }

    /// Feed this value into a content hash.
    pub fn hash_into(&self, hasher: &mut ContentHasher) {
        match self {
            AttributeValue::Integer(v) => hasher.text("int").integer(*v),
            AttributeValue::Real(v) => hasher.text("float").real(*v),
            AttributeValue::Text(v) => hasher.text("str").text(v),
            AttributeValue::Flag(v) => hasher.text("bool").flag(*v),
        };
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Real(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Flag(value)
    }
}

/// A bit dimension: a literal number or a symbolic reference.
///
/// Symbols hold either a named parameter of a parametric library (`"D1"`)
/// or a quantity string such as `"5.000 mm"` or `"118.000 °"`.
#[derive(Debug, Clone, PartialEq)]
pub enum Dimension {
    /// Literal value in millimeters or degrees.
    Value(f64),
    /// Named reference or quantity string.
    Symbol(String),
}

impl Dimension {
    /// Numeric value, parsing `"<number> <unit>"` quantity strings.
    ///
    /// Returns `None` for named references.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Dimension::Value(v) => Some(*v),
            Dimension::Symbol(text) => {
                let number = text
                    .trim()
                    .trim_end_matches("mm")
                    .trim_end_matches('°')
                    .trim_end_matches("deg")
                    .trim();
                number.parse().ok()
            }
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            Dimension::Value(v) => json!(v),
            Dimension::Symbol(s) => json!(s),
        }
    }

    /// Read a JSON number or string.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(Dimension::Value),
            Value::String(s) => Some(Dimension::Symbol(s.clone())),
            _ => None,
        }
    }

    /// Feed this dimension into a content hash.
    pub fn hash_into(&self, hasher: &mut ContentHasher) {
        match self {
            Dimension::Value(v) => hasher.text("value").real(*v),
            Dimension::Symbol(s) => hasher.text("symbol").text(s),
        };
    }
}

impl From<f64> for Dimension {
    fn from(value: f64) -> Self {
        Dimension::Value(value)
    }
}

impl From<&str> for Dimension {
    fn from(value: &str) -> Self {
        Dimension::Symbol(value.to_string())
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Value(v) => write!(f, "{v}"),
            Dimension::Symbol(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_accepts() {
        assert!(ValueType::Integer.accepts(&json!(2)));
        assert!(!ValueType::Integer.accepts(&json!(2.5)));
        assert!(ValueType::Real.accepts(&json!(2)));
        assert!(ValueType::Real.accepts(&json!(2.5)));
        assert!(ValueType::Text.accepts(&json!("HSS")));
        assert!(!ValueType::Flag.accepts(&json!("true")));
        assert_eq!(
            describe_types(&[ValueType::Real, ValueType::Text]),
            "(float, str)"
        );
    }

    #[test]
    fn test_attribute_value_json() {
        assert_eq!(
            AttributeValue::from_json(&json!(4)),
            Some(AttributeValue::Integer(4))
        );
        assert_eq!(
            AttributeValue::from_json(&json!(0.5)),
            Some(AttributeValue::Real(0.5))
        );
        assert_eq!(AttributeValue::from_json(&json!(null)), None);
        let real = AttributeValue::Real(2.0);
        assert_eq!(AttributeValue::from_json(&real.to_json()), Some(real));
    }

    #[test]
    fn test_dimension_as_number() {
        assert_eq!(Dimension::Value(3.0).as_number(), Some(3.0));
        assert_eq!(Dimension::from("5.000 mm").as_number(), Some(5.0));
        assert_eq!(Dimension::from("119.000 °").as_number(), Some(119.0));
        assert_eq!(Dimension::from("D1").as_number(), None);
    }

    #[test]
    fn test_dimension_json() {
        assert_eq!(Dimension::from_json(&json!(6.35)), Some(Dimension::Value(6.35)));
        assert_eq!(
            Dimension::from_json(&json!("D1")),
            Some(Dimension::Symbol("D1".into()))
        );
        assert_eq!(Dimension::from_json(&json!(true)), None);
    }
}
