//! Table schemas.

use std::collections::HashMap;
use std::fmt;

use lumi_common::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::types::{DataType, Value};

/// A named, typed field in a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name, unique within a schema.
    pub name: String,
    /// Declared type; row values must widen to it.
    pub data_type: DataType,
}

impl Field {
    /// Creates a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.data_type)
    }
}

/// An ordered sequence of fields with a name→index lookup map.
///
/// Field names are unique and indices match insertion order. Schemas are
/// never mutated once a table is visible to engine code; derived tables are
/// built with fresh schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn empty() -> Self {
        Self {
            fields: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Creates a schema from fields, failing on duplicate names.
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        let mut schema = Self::empty();
        for field in fields {
            schema.add_field(field)?;
        }
        Ok(schema)
    }

    /// Appends a field; the name must not already exist.
    pub fn add_field(&mut self, field: Field) -> Result<()> {
        if self.index.contains_key(&field.name) {
            return Err(Error::new(format!("field already exists: {}", field.name)));
        }
        self.index.insert(field.name.clone(), self.fields.len());
        self.fields.push(field);
        Ok(())
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the field at `index`.
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Returns the field names in declaration order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Resolves a field name to its index.
    pub fn field_index(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::new(format!("field not found: {name}")))
    }

    /// Resolves a list of field names to indices, in the given order.
    pub fn field_indices<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| self.field_index(name.as_ref()))
            .collect()
    }

    /// Validates a row against this schema: size, then per-field widening.
    pub fn check_row(&self, row: &[Value]) -> Result<()> {
        if row.len() != self.fields.len() {
            return Err(Error::new(format!(
                "row size not matched with schema, expected {}, got {}",
                self.fields.len(),
                row.len()
            )));
        }
        for (value, field) in row.iter().zip(&self.fields) {
            if !value.instance_of(field.data_type) {
                return Err(Error::new(format!(
                    "field type not matched with schema, field: {}, type: {}, value type: {}",
                    field.name,
                    field.data_type,
                    value.data_type()
                )));
            }
        }
        Ok(())
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{field}")?;
        }
        write!(f, "]")
    }
}
