//! The `query | select / where / sort / limit / min / max / avg` pipeline.

use lumi_common::{Error, Result};

use crate::catalog::new_table_ref;
use crate::table::{Field, Schema, Table};
use crate::types::{CompareOp, DataType, Value};

use super::{
    float_arg, invalid_root, str_arg, string_args, Function, FunctionSignature,
    LeafExecuteContext, PipelineData, QueryData, RootExecuteContext, RootFinalizeContext,
};

/// `query(table)` — root of the read pipeline.
///
/// Leaves replace the carried table with derived tables; finalize returns
/// whatever the last stage produced.
pub struct QueryTable {
    signature: FunctionSignature,
}

impl QueryTable {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str]),
        }
    }
}

impl Function for QueryTable {
    fn name(&self) -> &str {
        "query"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "query table"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, ctx: &mut RootExecuteContext) -> Result<()> {
        let table_name = str_arg(ctx.args, 0)?;
        let table = ctx.db.get_table(table_name)?;
        *ctx.data = PipelineData::Query(QueryData { table });
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let PipelineData::Query(data) = ctx.data else {
            return Err(Error::new("invalid pipeline state"));
        };
        ctx.result = Some(data.table.clone());
        Ok(())
    }
}

fn query_data<'a>(ctx: &'a mut LeafExecuteContext<'_>) -> Result<&'a mut QueryData> {
    match ctx.data {
        PipelineData::Query(data) => Ok(data),
        _ => Err(Error::new(format!(
            "invalid pipeline root: {}",
            ctx.root.name()
        ))),
    }
}

/// `select(field1, field2, ...)` — projects the carried table.
pub struct Select {
    signature: FunctionSignature,
}

impl Select {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Variadic(DataType::Str),
        }
    }
}

impl Function for Select {
    fn name(&self) -> &str {
        "select"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "select fields of table"
    }

    fn can_leaf(&self) -> bool {
        true
    }

    fn execute_leaf(&self, ctx: &mut LeafExecuteContext) -> Result<()> {
        let field_names = string_args(ctx.args)?;
        let data = query_data(ctx)?;
        let selected = data.table.read().select_names(&field_names)?;
        data.table = new_table_ref(selected);
        Ok(())
    }
}

/// `where(field, op, value)` — filters rows under a `query` root, or
/// accumulates an AND filter under `update` / `delete` roots.
pub struct Where {
    signature: FunctionSignature,
}

impl Where {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str, DataType::Str, DataType::Any]),
        }
    }
}

impl Function for Where {
    fn name(&self) -> &str {
        "where"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "where filter row, (<field>, <op>, <value>), support ('<', '=', '>') op currently"
    }

    fn can_leaf(&self) -> bool {
        true
    }

    fn execute_leaf(&self, ctx: &mut LeafExecuteContext) -> Result<()> {
        let field_name = str_arg(ctx.args, 0)?.to_string();
        let compare = CompareOp::parse(str_arg(ctx.args, 1)?)?.comparator();
        let value = ctx.args[2].clone();

        match ctx.data {
            PipelineData::Query(data) => {
                let filtered = {
                    let table = data.table.read();
                    let field_idx = table.schema().field_index(&field_name)?;
                    table.filter(|row, _| compare(&row[field_idx], &value))
                };
                data.table = new_table_ref(filtered);
                Ok(())
            }
            PipelineData::Update(data) => {
                let field_idx = data.table.read().schema().field_index(&field_name)?;
                data.filters
                    .add(Box::new(move |row, _| compare(&row[field_idx], &value)));
                Ok(())
            }
            PipelineData::Delete(data) => {
                let field_idx = data.table.read().schema().field_index(&field_name)?;
                data.filters
                    .add(Box::new(move |row, _| compare(&row[field_idx], &value)));
                Ok(())
            }
            _ => Err(invalid_root(ctx)),
        }
    }
}

/// `limit(count)` — keeps the first `count` rows.
pub struct Limit {
    signature: FunctionSignature,
}

impl Limit {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Float]),
        }
    }
}

impl Function for Limit {
    fn name(&self) -> &str {
        "limit"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "limit return rows"
    }

    fn can_leaf(&self) -> bool {
        true
    }

    fn execute_leaf(&self, ctx: &mut LeafExecuteContext) -> Result<()> {
        let count = float_arg(ctx.args, 0)?;
        if count < 0.0 {
            return Err(Error::new(format!("limit must not be negative: {count}")));
        }
        let count = count.trunc() as usize;

        let data = query_data(ctx)?;
        let limited = data.table.read().limit(0, count);
        data.table = new_table_ref(limited);
        Ok(())
    }
}

fn sort_leaf(ctx: &mut LeafExecuteContext, ascending: bool) -> Result<()> {
    let field_names = string_args(ctx.args)?;
    if field_names.is_empty() {
        return Err(Error::new("sort fields can not be empty"));
    }

    let data = query_data(ctx)?;
    let sorted = data.table.read().sort(&field_names, ascending)?;
    data.table = new_table_ref(sorted);
    Ok(())
}

/// `sort(field1, field2, ...)` — ascending lexicographic sort.
pub struct Sort {
    signature: FunctionSignature,
}

impl Sort {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Variadic(DataType::Str),
        }
    }
}

impl Function for Sort {
    fn name(&self) -> &str {
        "sort"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "sort fields of table asc (field1, field2, ...)"
    }

    fn can_leaf(&self) -> bool {
        true
    }

    fn execute_leaf(&self, ctx: &mut LeafExecuteContext) -> Result<()> {
        sort_leaf(ctx, true)
    }
}

/// `sort_desc(field1, field2, ...)` — descending lexicographic sort.
pub struct SortDesc {
    signature: FunctionSignature,
}

impl SortDesc {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Variadic(DataType::Str),
        }
    }
}

impl Function for SortDesc {
    fn name(&self) -> &str {
        "sort_desc"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "sort fields of table desc (field1, field2, ...)"
    }

    fn can_leaf(&self) -> bool {
        true
    }

    fn execute_leaf(&self, ctx: &mut LeafExecuteContext) -> Result<()> {
        sort_leaf(ctx, false)
    }
}

/// Folds each chosen column into an accumulator, starting from null.
fn fold_fields<F>(table: &Table, indices: &[usize], mut fold: F) -> Vec<Value>
where
    F: FnMut(&mut Value, &Value),
{
    let mut accs = vec![Value::Null; indices.len()];
    for row in table.rows() {
        for (acc, &idx) in accs.iter_mut().zip(indices) {
            fold(acc, &row[idx]);
        }
    }
    accs
}

/// Builds the one-row result table `op(field1), op(field2), ...`.
fn aggregate_table(
    op: &str,
    field_names: &[String],
    column_types: &[DataType],
    accs: Vec<Value>,
) -> Result<Table> {
    let mut schema = Schema::empty();
    for (name, ty) in field_names.iter().zip(column_types) {
        schema.add_field(Field::new(format!("{op}({name})"), *ty))?;
    }
    let mut out = Table::new("", schema);
    out.add_row(accs)?;
    Ok(out)
}

fn aggregate_leaf<F>(ctx: &mut LeafExecuteContext, op: &str, fold: F) -> Result<()>
where
    F: FnMut(&mut Value, &Value),
{
    let field_names = string_args(ctx.args)?;
    let data = query_data(ctx)?;

    let out = {
        let table = data.table.read();
        let indices = table.schema().field_indices(&field_names)?;
        let column_types: Vec<DataType> = indices
            .iter()
            .map(|&i| table.schema().fields()[i].data_type)
            .collect();
        let accs = fold_fields(&table, &indices, fold);
        aggregate_table(op, &field_names, &column_types, accs)?
    };

    data.table = new_table_ref(out);
    Ok(())
}

/// `max(field1, field2, ...)` — per-field maximum.
pub struct Max {
    signature: FunctionSignature,
}

impl Max {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Variadic(DataType::Str),
        }
    }
}

impl Function for Max {
    fn name(&self) -> &str {
        "max"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "aggregation max(field1, field2, ...)"
    }

    fn can_leaf(&self) -> bool {
        true
    }

    fn execute_leaf(&self, ctx: &mut LeafExecuteContext) -> Result<()> {
        aggregate_leaf(ctx, "max", |acc, elem| {
            if acc.is_null() || acc.compare(elem) == std::cmp::Ordering::Less {
                *acc = elem.clone();
            }
        })
    }
}

/// `min(field1, field2, ...)` — per-field minimum, ignoring nulls once a
/// non-null seed is found.
pub struct Min {
    signature: FunctionSignature,
}

impl Min {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Variadic(DataType::Str),
        }
    }
}

impl Function for Min {
    fn name(&self) -> &str {
        "min"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "aggregation min(field1, field2, ...)"
    }

    fn can_leaf(&self) -> bool {
        true
    }

    fn execute_leaf(&self, ctx: &mut LeafExecuteContext) -> Result<()> {
        aggregate_leaf(ctx, "min", |acc, elem| {
            if acc.is_null() {
                *acc = elem.clone();
            } else if !elem.is_null() && elem.compare(acc) == std::cmp::Ordering::Less {
                *acc = elem.clone();
            }
        })
    }
}

/// `avg(field1, field2, ...)` — per-field mean over float columns.
///
/// Nulls contribute nothing to the sum but the divisor is the total row
/// count, nulls included.
pub struct Avg {
    signature: FunctionSignature,
}

impl Avg {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Variadic(DataType::Str),
        }
    }
}

impl Function for Avg {
    fn name(&self) -> &str {
        "avg"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "aggregation avg(field)"
    }

    fn can_leaf(&self) -> bool {
        true
    }

    fn execute_leaf(&self, ctx: &mut LeafExecuteContext) -> Result<()> {
        let field_names = string_args(ctx.args)?;
        let data = query_data(ctx)?;

        let out = {
            let table = data.table.read();
            let indices = table.schema().field_indices(&field_names)?;

            for &idx in &indices {
                let field = &table.schema().fields()[idx];
                if !matches!(field.data_type, DataType::Float | DataType::NullableFloat) {
                    return Err(Error::new(format!(
                        "invalid field type: {}, name: {}",
                        field.data_type, field.name
                    )));
                }
            }

            let sums = fold_fields(&table, &indices, |acc, elem| {
                if let Some(v) = elem.as_float() {
                    let sum = acc.as_float().unwrap_or(0.0) + v;
                    *acc = Value::Float(sum);
                }
            });

            let num_rows = table.num_rows() as f32;
            let means: Vec<Value> = sums
                .into_iter()
                .map(|sum| Value::Float(sum.as_float().unwrap_or(0.0) / num_rows))
                .collect();

            let column_types = vec![DataType::Float; indices.len()];
            aggregate_table("avg", &field_names, &column_types, means)?
        };

        data.table = new_table_ref(out);
        Ok(())
    }
}
