//! Runtime values.

use std::cmp::Ordering;
use std::fmt;

use lumi_common::{Error, Result};
use serde::{Deserialize, Serialize};

use super::DataType;

/// Absolute epsilon used for float equality.
pub const FLOAT_EPSILON: f32 = 1e-4;

/// Compares two floats with an absolute epsilon, returning -1/0/1.
pub fn compare_floats(a: f32, b: f32) -> Ordering {
    let diff = a - b;
    if diff < -FLOAT_EPSILON {
        Ordering::Less
    } else if diff > FLOAT_EPSILON {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// A runtime value: null, a 32-bit float, or a UTF-8 string.
///
/// Values are immutable after construction. Equality compares tags first and
/// floats with an absolute epsilon of `1e-4`; ordering is by tag ordinal
/// (`Null < Float < Str`) and then by payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// The null value.
    Null,
    /// A float value.
    Float(f32),
    /// A string value.
    Str(String),
}

impl Value {
    /// Creates a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Creates a float value.
    pub fn float(v: f32) -> Self {
        Value::Float(v)
    }

    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the float payload, if any.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the exact type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Float(_) => DataType::Float,
            Value::Str(_) => DataType::Str,
        }
    }

    /// Returns true if this value inhabits `ty` under the widening lattice.
    pub fn instance_of(&self, ty: DataType) -> bool {
        self.data_type().is_subtype_of(ty)
    }

    fn tag_ordinal(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Float(_) => 1,
            Value::Str(_) => 2,
        }
    }

    /// Total ordering: tag ordinal first, then payload.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Null, Value::Null) => Ordering::Equal,
            (a, b) => a.tag_ordinal().cmp(&b.tag_ordinal()),
        }
    }

    /// Parses a textual value against a target type.
    ///
    /// This is the rule set used for CSV cells:
    /// - float targets parse decimals; a nullable float also maps the empty
    ///   string and the text `null` to [`Value::Null`]
    /// - string targets strip one pair of matched surrounding quotes; a
    ///   nullable string maps the empty cell to [`Value::Null`]
    /// - `any` keeps the raw text as a string
    pub fn parse_typed(ty: DataType, input: &str) -> Result<Value> {
        match ty {
            DataType::Float | DataType::NullableFloat => {
                if ty == DataType::NullableFloat && (input.is_empty() || input == "null") {
                    return Ok(Value::Null);
                }
                input
                    .parse::<f32>()
                    .map(Value::Float)
                    .map_err(|_| Error::new(format!("invalid number: {input}")))
            }
            DataType::Str | DataType::NullableStr => {
                if ty == DataType::NullableStr && input.is_empty() {
                    return Ok(Value::Null);
                }
                Ok(Value::Str(strip_quotes(input).to_string()))
            }
            DataType::Null => Ok(Value::Null),
            DataType::Any => Ok(Value::Str(input.to_string())),
        }
    }
}

fn strip_quotes(input: &str) -> &str {
    let bytes = input.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &input[1..input.len() - 1];
        }
    }
    input
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Float(a), Value::Float(b)) => compare_floats(*a, *b) == Ordering::Equal,
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

/// Formats a float with up to two decimals, trimming trailing zeros and a
/// trailing dot: `36.0 -> "36"`, `1.5 -> "1.5"`, `0.125 -> "0.13"`.
pub(crate) fn format_float(v: f32) -> String {
    let formatted = format!("{v:.2}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Float(v) => f.write_str(&format_float(*v)),
            Value::Str(s) => {
                f.write_str("'")?;
                for c in s.chars() {
                    if c == '\'' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("'")
            }
        }
    }
}

/// A comparison operator usable in `where` filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `>`
    Gt,
}

impl CompareOp {
    /// Parses the operator token used in queries.
    pub fn parse(op: &str) -> Result<CompareOp> {
        match op {
            "=" => Ok(CompareOp::Eq),
            "<" => Ok(CompareOp::Lt),
            ">" => Ok(CompareOp::Gt),
            other => Err(Error::new(format!("unsupported operator: {other}"))),
        }
    }

    /// Returns the comparison function for this operator.
    pub fn comparator(self) -> Comparator {
        match self {
            CompareOp::Eq => |lhs, rhs| lhs == rhs,
            CompareOp::Lt => |lhs, rhs| lhs.compare(rhs) == Ordering::Less,
            CompareOp::Gt => |lhs, rhs| lhs.compare(rhs) == Ordering::Greater,
        }
    }
}

/// Binary predicate over two values.
pub type Comparator = fn(&Value, &Value) -> bool;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_equality_uses_epsilon() {
        assert_eq!(Value::Float(1.0), Value::Float(1.00001));
        assert_ne!(Value::Float(1.0), Value::Float(1.1));
    }

    #[test]
    fn test_null_equals_null() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Float(0.0));
    }

    #[test]
    fn test_ordering_by_tag_then_payload() {
        assert_eq!(Value::Null.compare(&Value::Float(-1.0)), Ordering::Less);
        assert_eq!(
            Value::Float(9.0).compare(&Value::string("a")),
            Ordering::Less
        );
        assert_eq!(
            Value::string("b").compare(&Value::string("a")),
            Ordering::Greater
        );
        assert_eq!(Value::Float(1.0).compare(&Value::Float(2.0)), Ordering::Less);
    }

    #[test]
    fn test_instance_of() {
        assert!(Value::Null.instance_of(DataType::Any));
        assert!(Value::Float(1.0).instance_of(DataType::Any));
        assert!(Value::Null.instance_of(DataType::NullableFloat));
        assert!(Value::Float(1.0).instance_of(DataType::NullableFloat));
        assert!(!Value::string("x").instance_of(DataType::NullableFloat));
        assert!(Value::string("x").instance_of(DataType::NullableStr));
        assert!(!Value::Float(1.0).instance_of(DataType::Str));
    }

    #[test]
    fn test_display_float_trims_zeros() {
        assert_eq!(Value::Float(36.0).to_string(), "36");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Float(0.125).to_string(), "0.13");
        assert_eq!(Value::Float(0.0).to_string(), "0");
    }

    #[test]
    fn test_display_string_escapes_quotes() {
        assert_eq!(Value::string("he'llo").to_string(), r"'he\'llo'");
        assert_eq!(Value::string("a\\b").to_string(), r"'a\\b'");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_parse_typed_float() {
        assert_eq!(
            Value::parse_typed(DataType::Float, "1.5").unwrap(),
            Value::Float(1.5)
        );
        assert!(Value::parse_typed(DataType::Float, "null").is_err());
        assert!(Value::parse_typed(DataType::Float, "").is_err());
        assert_eq!(
            Value::parse_typed(DataType::NullableFloat, "").unwrap(),
            Value::Null
        );
        assert_eq!(
            Value::parse_typed(DataType::NullableFloat, "null").unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_parse_typed_string() {
        assert_eq!(
            Value::parse_typed(DataType::Str, "\"hi\"").unwrap(),
            Value::string("hi")
        );
        assert_eq!(
            Value::parse_typed(DataType::Str, "'hi'").unwrap(),
            Value::string("hi")
        );
        assert_eq!(
            Value::parse_typed(DataType::Str, "hi").unwrap(),
            Value::string("hi")
        );
        assert_eq!(
            Value::parse_typed(DataType::NullableStr, "").unwrap(),
            Value::Null
        );
        assert_eq!(
            Value::parse_typed(DataType::Any, "3.5").unwrap(),
            Value::string("3.5")
        );
    }

    #[test]
    fn test_comparators() {
        let eq = CompareOp::parse("=").unwrap().comparator();
        let lt = CompareOp::parse("<").unwrap().comparator();
        let gt = CompareOp::parse(">").unwrap().comparator();

        assert!(eq(&Value::Float(2.0), &Value::Float(2.0)));
        assert!(eq(&Value::Null, &Value::Null));
        assert!(lt(&Value::Float(1.0), &Value::Float(2.0)));
        assert!(gt(&Value::string("b"), &Value::string("a")));
        assert!(CompareOp::parse("!=").is_err());
    }
}
