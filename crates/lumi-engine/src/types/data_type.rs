//! The LumiDB type lattice.

use std::fmt;

use lumi_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// A LumiDB data type.
///
/// Types form a small widening lattice: everything is a subtype of [`Any`],
/// and [`Null`] plus the matching base type are subtypes of each nullable
/// type. Table fields, function signatures, and CSV parsing are all keyed on
/// these.
///
/// [`Any`]: DataType::Any
/// [`Null`]: DataType::Null
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// The type of the null value alone.
    Null,
    /// Top of the lattice; accepts every value.
    Any,
    /// 32-bit float, rendered `float`.
    Float,
    /// UTF-8 string, rendered `string`.
    Str,
    /// Float or null, rendered `float?`.
    NullableFloat,
    /// String or null, rendered `string?`.
    NullableStr,
}

impl DataType {
    /// Returns true if `self` is a subtype of `other` (reflexive).
    pub fn is_subtype_of(self, other: DataType) -> bool {
        match other {
            DataType::Any => true,
            DataType::NullableFloat => matches!(
                self,
                DataType::Null | DataType::Float | DataType::NullableFloat
            ),
            DataType::NullableStr => {
                matches!(self, DataType::Null | DataType::Str | DataType::NullableStr)
            }
            _ => self == other,
        }
    }

    /// Returns true if null values inhabit this type.
    pub fn is_nullable(self) -> bool {
        matches!(
            self,
            DataType::Null | DataType::Any | DataType::NullableFloat | DataType::NullableStr
        )
    }

    /// Parses a type name as written in queries (`add_field('age', 'float?')`).
    pub fn parse(name: &str) -> Result<DataType> {
        match name {
            "float" => Ok(DataType::Float),
            "string" => Ok(DataType::Str),
            "float?" => Ok(DataType::NullableFloat),
            "string?" => Ok(DataType::NullableStr),
            "null" => Ok(DataType::Null),
            "any" => Ok(DataType::Any),
            other => Err(Error::new(format!("unknown type: {other}"))),
        }
    }

    /// Returns the type name as written in queries.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Null => "null",
            DataType::Any => "any",
            DataType::Float => "float",
            DataType::Str => "string",
            DataType::NullableFloat => "float?",
            DataType::NullableStr => "string?",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_everything_widens_to_any() {
        for ty in [
            DataType::Null,
            DataType::Any,
            DataType::Float,
            DataType::Str,
            DataType::NullableFloat,
            DataType::NullableStr,
        ] {
            assert!(ty.is_subtype_of(DataType::Any));
        }
    }

    #[test]
    fn test_nullable_float_lattice() {
        assert!(DataType::Null.is_subtype_of(DataType::NullableFloat));
        assert!(DataType::Float.is_subtype_of(DataType::NullableFloat));
        assert!(DataType::NullableFloat.is_subtype_of(DataType::NullableFloat));
        assert!(!DataType::Str.is_subtype_of(DataType::NullableFloat));
        assert!(!DataType::NullableStr.is_subtype_of(DataType::NullableFloat));
    }

    #[test]
    fn test_nullable_str_lattice() {
        assert!(DataType::Null.is_subtype_of(DataType::NullableStr));
        assert!(DataType::Str.is_subtype_of(DataType::NullableStr));
        assert!(!DataType::Float.is_subtype_of(DataType::NullableStr));
    }

    #[test]
    fn test_base_types_are_not_interchangeable() {
        assert!(!DataType::Float.is_subtype_of(DataType::Str));
        assert!(!DataType::Str.is_subtype_of(DataType::Float));
        assert!(!DataType::Any.is_subtype_of(DataType::Float));
    }

    #[test]
    fn test_parse_round_trips_names() {
        for name in ["float", "string", "float?", "string?", "null", "any"] {
            let ty = DataType::parse(name).unwrap();
            assert_eq!(ty.name(), name);
        }
        assert!(DataType::parse("int").is_err());
    }
}
