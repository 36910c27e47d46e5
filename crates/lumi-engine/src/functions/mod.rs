//! The pipeline function contract and the built-in library.
//!
//! A pipeline `f0 | f1 | ... | fn` runs `f0` as the *root* and the rest as
//! *leaves*: the engine calls `f0.execute_root`, then each leaf's
//! `execute_leaf` in pipe order, then `f0.finalize_root`. State flows through
//! the shared [`PipelineData`] slot the root initializes and the leaves
//! refine; `finalize_root` turns it into the result table.

mod create;
mod delete;
mod insert;
mod meta;
mod query;
mod update;

use std::fmt;
use std::sync::Arc;

use lumi_common::{Error, Result};

use crate::catalog::{FunctionRef, TableRef};
use crate::database::Database;
use crate::table::{Row, Schema};
use crate::types::{DataType, Value};

/// The type contract of a function, checked before any callback runs.
#[derive(Debug, Clone)]
pub enum FunctionSignature {
    /// Exact arity with a type per position.
    Fixed(Vec<DataType>),
    /// Any number of arguments of one element type (zero allowed).
    Variadic(DataType),
}

impl FunctionSignature {
    /// Checks `args` against this signature.
    pub fn check(&self, args: &[Value]) -> Result<()> {
        match self {
            FunctionSignature::Fixed(types) => {
                if args.len() != types.len() {
                    return Err(Error::new(format!(
                        "arguments size mismatch, expected {}, got {}",
                        types.len(),
                        args.len()
                    )));
                }
                for (i, (arg, ty)) in args.iter().zip(types).enumerate() {
                    if !arg.instance_of(*ty) {
                        return Err(type_mismatch(i, *ty, arg));
                    }
                }
                Ok(())
            }
            FunctionSignature::Variadic(ty) => {
                for (i, arg) in args.iter().enumerate() {
                    if !arg.instance_of(*ty) {
                        return Err(type_mismatch(i, *ty, arg));
                    }
                }
                Ok(())
            }
        }
    }
}

fn type_mismatch(index: usize, expected: DataType, got: &Value) -> Error {
    Error::new(format!(
        "argument {} type mismatch, expected {}, got {}",
        index + 1,
        expected,
        got.data_type()
    ))
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        match self {
            FunctionSignature::Fixed(types) => {
                for (i, ty) in types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{ty}")?;
                }
            }
            FunctionSignature::Variadic(ty) => {
                write!(f, "{ty}, ...")?;
            }
        }
        write!(f, ")")
    }
}

/// Renders a function as `name(sig)`, as shown by `show_functions` and the
/// completer.
pub fn format_function(func: &dyn Function) -> String {
    format!("{}{}", func.name(), func.signature())
}

/// A predicate over a row and its index.
pub type RowPredicate = Box<dyn Fn(&[Value], usize) -> bool>;

/// An AND-combination of row predicates, accumulated by `where` stages under
/// `update` and `delete` roots.
#[derive(Default)]
pub struct Filters {
    predicates: Vec<RowPredicate>,
}

impl Filters {
    /// Adds another conjunct.
    pub fn add(&mut self, predicate: RowPredicate) {
        self.predicates.push(predicate);
    }

    /// Returns true if every predicate accepts the row.
    pub fn matches(&self, row: &[Value], row_index: usize) -> bool {
        self.predicates.iter().all(|p| p(row, row_index))
    }
}

impl fmt::Debug for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Filters({})", self.predicates.len())
    }
}

/// State accumulated by a `create_table` pipeline.
#[derive(Debug)]
pub struct CreateTableData {
    /// Table to create.
    pub name: String,
    /// Schema grown by `add_field` stages.
    pub schema: Schema,
}

/// State accumulated by an `insert` pipeline.
#[derive(Debug)]
pub struct InsertData {
    /// Target table.
    pub table: TableRef,
    /// Validated rows staged by `add_row` / `load_csv`.
    pub rows: Vec<Row>,
}

/// State carried by a `query` pipeline: the current (possibly derived) table.
#[derive(Debug)]
pub struct QueryData {
    /// Current table; starts as the catalog table, replaced by each
    /// transforming stage.
    pub table: TableRef,
}

/// State accumulated by an `update` pipeline.
#[derive(Debug)]
pub struct UpdateData {
    /// Target table.
    pub table: TableRef,
    /// AND-filters from `where` stages.
    pub filters: Filters,
    /// `(field, value)` assignments from `set_value` stages.
    pub updates: Vec<(String, Value)>,
}

/// State accumulated by a `delete` pipeline.
#[derive(Debug)]
pub struct DeleteData {
    /// Target table.
    pub table: TableRef,
    /// AND-filters from `where` stages.
    pub filters: Filters,
}

/// The shared slot carried from `execute_root` through every `execute_leaf`
/// into `finalize_root`.
///
/// Each root places its own variant here; leaves pattern match and refuse
/// roots they do not support.
#[derive(Debug, Default)]
pub enum PipelineData {
    /// No root has run yet (or the root keeps no state).
    #[default]
    Empty,
    /// `create_table` pipeline.
    CreateTable(CreateTableData),
    /// `insert` pipeline.
    Insert(InsertData),
    /// `query` pipeline.
    Query(QueryData),
    /// `update` pipeline.
    Update(UpdateData),
    /// `delete` pipeline.
    Delete(DeleteData),
}

/// Context passed to `execute_root`.
pub struct RootExecuteContext<'a> {
    /// Catalog handle; callbacks may re-enter [`Database::execute`].
    pub db: &'a Database,
    /// The root's arguments, already signature-checked.
    pub args: &'a [Value],
    /// Shared pipeline state to initialize.
    pub data: &'a mut PipelineData,
}

/// Context passed to `execute_leaf`.
pub struct LeafExecuteContext<'a> {
    /// Catalog handle.
    pub db: &'a Database,
    /// This leaf's arguments, already signature-checked.
    pub args: &'a [Value],
    /// Shared pipeline state to refine.
    pub data: &'a mut PipelineData,
    /// The pipeline's root function, for diagnostics.
    pub root: &'a FunctionRef,
}

/// Context passed to `finalize_root`.
pub struct RootFinalizeContext<'a> {
    /// Catalog handle.
    pub db: &'a Database,
    /// The root's arguments.
    pub args: &'a [Value],
    /// Shared pipeline state accumulated by the leaves.
    pub data: &'a mut PipelineData,
    /// The pipeline result; an empty unnamed table is returned if unset.
    pub result: Option<TableRef>,
}

/// A pipeline function: metadata plus the three lifecycle callbacks.
///
/// At least one of [`can_root`](Function::can_root) /
/// [`can_leaf`](Function::can_leaf) must be true. Callbacks may assume the
/// signature has already been validated.
pub trait Function: Send + Sync {
    /// Function name as written in queries.
    fn name(&self) -> &str;

    /// The type contract for the argument list.
    fn signature(&self) -> &FunctionSignature;

    /// One-line help text.
    fn description(&self) -> &str;

    /// Whether this function may start a pipeline.
    fn can_root(&self) -> bool {
        false
    }

    /// Whether this function may appear after the first stage.
    fn can_leaf(&self) -> bool {
        false
    }

    /// Runs as the pipeline root, before any leaf.
    fn execute_root(&self, _ctx: &mut RootExecuteContext) -> Result<()> {
        Err(Error::not_implemented(format!(
            "{} cannot run as a root function",
            self.name()
        )))
    }

    /// Runs as a leaf stage.
    fn execute_leaf(&self, _ctx: &mut LeafExecuteContext) -> Result<()> {
        Err(Error::not_implemented(format!(
            "{} cannot run as a leaf function",
            self.name()
        )))
    }

    /// Runs after every leaf, producing the pipeline result.
    fn finalize_root(&self, _ctx: &mut RootFinalizeContext) -> Result<()> {
        Err(Error::not_implemented(format!(
            "{} cannot finalize a pipeline",
            self.name()
        )))
    }
}

/// Error for a leaf that received pipeline state from an unsupported root.
pub(crate) fn invalid_root(ctx: &LeafExecuteContext) -> Error {
    Error::new(format!("invalid pipeline root: {}", ctx.root.name()))
}

/// Extracts a string argument; signature checking makes a miss a bug.
pub fn str_arg(args: &[Value], index: usize) -> Result<&str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::new(format!("argument {} is not a string", index + 1)))
}

/// Extracts a float argument.
pub fn float_arg(args: &[Value], index: usize) -> Result<f32> {
    args.get(index)
        .and_then(Value::as_float)
        .ok_or_else(|| Error::new(format!("argument {} is not a float", index + 1)))
}

/// Collects variadic string arguments (field name lists).
pub fn string_args(args: &[Value]) -> Result<Vec<String>> {
    args.iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::new(format!("argument {} is not a string", i + 1)))
        })
        .collect()
}

/// The built-in function library, in registration order.
pub fn builtin_functions() -> Vec<FunctionRef> {
    vec![
        Arc::new(meta::ShowTables::new()),
        Arc::new(meta::ShowFunctions::new()),
        Arc::new(meta::ShowPlugins::new()),
        Arc::new(meta::DescTable::new()),
        Arc::new(meta::LoadPlugin::new()),
        Arc::new(meta::UnloadPlugin::new()),
        Arc::new(create::CreateTable::new()),
        Arc::new(create::AddField::new()),
        Arc::new(update::Update::new()),
        Arc::new(delete::Delete::new()),
        Arc::new(update::SetValue::new()),
        Arc::new(insert::Insert::new()),
        Arc::new(insert::AddRow::new()),
        Arc::new(insert::LoadCsv::new()),
        Arc::new(query::QueryTable::new()),
        Arc::new(query::Select::new()),
        Arc::new(query::Limit::new()),
        Arc::new(query::Where::new()),
        Arc::new(query::Sort::new()),
        Arc::new(query::SortDesc::new()),
        Arc::new(query::Avg::new()),
        Arc::new(query::Max::new()),
        Arc::new(query::Min::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_signature_check() {
        let sig = FunctionSignature::Fixed(vec![DataType::Str, DataType::Float]);
        sig.check(&[Value::string("a"), Value::Float(1.0)]).unwrap();

        let err = sig.check(&[Value::string("a")]).unwrap_err();
        assert!(err.message.contains("arguments size mismatch"));

        let err = sig
            .check(&[Value::string("a"), Value::string("b")])
            .unwrap_err();
        assert_eq!(
            err.message,
            "argument 2 type mismatch, expected float, got string"
        );
    }

    #[test]
    fn test_variadic_signature_check() {
        let sig = FunctionSignature::Variadic(DataType::Str);
        sig.check(&[]).unwrap();
        sig.check(&[Value::string("a"), Value::string("b")]).unwrap();

        let err = sig.check(&[Value::string("a"), Value::Float(1.0)]).unwrap_err();
        assert_eq!(
            err.message,
            "argument 2 type mismatch, expected string, got float"
        );
    }

    #[test]
    fn test_variadic_any_accepts_nulls() {
        let sig = FunctionSignature::Variadic(DataType::Any);
        sig.check(&[Value::Null, Value::Float(1.0), Value::string("x")])
            .unwrap();
    }

    #[test]
    fn test_signature_display() {
        let sig = FunctionSignature::Fixed(vec![DataType::Str, DataType::Any]);
        assert_eq!(sig.to_string(), "(string, any)");
        let sig = FunctionSignature::Variadic(DataType::Str);
        assert_eq!(sig.to_string(), "(string, ...)");
        let sig = FunctionSignature::Fixed(vec![]);
        assert_eq!(sig.to_string(), "()");
    }

    #[test]
    fn test_filters_and_semantics() {
        let mut filters = Filters::default();
        assert!(filters.matches(&[Value::Float(1.0)], 0));

        filters.add(Box::new(|row, _| row[0] == Value::Float(1.0)));
        filters.add(Box::new(|_, idx| idx < 5));
        assert!(filters.matches(&[Value::Float(1.0)], 0));
        assert!(!filters.matches(&[Value::Float(2.0)], 0));
        assert!(!filters.matches(&[Value::Float(1.0)], 7));
    }

    #[test]
    fn test_builtin_roster() {
        let functions = builtin_functions();
        assert_eq!(functions.len(), 23);
        for func in &functions {
            assert!(func.can_root() || func.can_leaf(), "{}", func.name());
        }
    }
}
