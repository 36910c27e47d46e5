//! Parsed query AST.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Value;

/// One stage of a pipeline: a function name and its literal arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFunction {
    /// Function name.
    pub name: String,
    /// Arguments in call order.
    pub args: Vec<Value>,
}

impl QueryFunction {
    /// Creates a stage.
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

impl fmt::Display for QueryFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// A non-empty pipeline of stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Stages in pipe order; the first runs as root, the rest as leaves.
    pub functions: Vec<QueryFunction>,
}

impl Query {
    /// Creates a query.
    pub fn new(functions: Vec<QueryFunction>) -> Self {
        Self { functions }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, func) in self.functions.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{func}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let query = Query::new(vec![
            QueryFunction::new("f1", vec![Value::Float(10.0), Value::string("he'llo")]),
            QueryFunction::new("f2", vec![]),
        ]);
        assert_eq!(query.to_string(), r"f1(10, 'he\'llo') | f2()");
    }
}
