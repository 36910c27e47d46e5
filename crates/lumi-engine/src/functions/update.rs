//! The `update | where / set_value ...` pipeline.

use lumi_common::{Error, Result};

use crate::types::DataType;

use super::{
    invalid_root, str_arg, Filters, Function, FunctionSignature, LeafExecuteContext,
    PipelineData, RootExecuteContext, RootFinalizeContext, UpdateData,
};

/// `update(table)` — root of the in-place update pipeline.
///
/// `where` leaves accumulate AND filters and `set_value` leaves accumulate
/// assignments; finalize applies every assignment to each row that passes
/// all filters.
pub struct Update {
    signature: FunctionSignature,
}

impl Update {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str]),
        }
    }
}

impl Function for Update {
    fn name(&self) -> &str {
        "update"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "update table"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, ctx: &mut RootExecuteContext) -> Result<()> {
        let table_name = str_arg(ctx.args, 0)?;
        let table = ctx.db.get_table(table_name)?;
        *ctx.data = PipelineData::Update(UpdateData {
            table,
            filters: Filters::default(),
            updates: Vec::new(),
        });
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let PipelineData::Update(data) = ctx.data else {
            return Err(Error::new("invalid pipeline state"));
        };

        let mut table = data.table.write();

        // Resolve assignment targets and typecheck before touching any row.
        let mut indexed_updates = Vec::with_capacity(data.updates.len());
        for (field_name, value) in &data.updates {
            let field_idx = table.schema().field_index(field_name)?;
            let field = &table.schema().fields()[field_idx];
            if !value.instance_of(field.data_type) {
                return Err(Error::new(format!(
                    "invalid type: {}, field: {}",
                    value.data_type(),
                    field.name
                )));
            }
            indexed_updates.push((field_idx, value.clone()));
        }

        let filters = &data.filters;
        table.update_rows(
            |row, idx| filters.matches(row, idx),
            |row| {
                for (field_idx, value) in &indexed_updates {
                    row[*field_idx] = value.clone();
                }
            },
        );

        drop(table);
        ctx.result = Some(data.table.clone());
        Ok(())
    }
}

/// `set_value(field, value)` — stages one assignment.
pub struct SetValue {
    signature: FunctionSignature,
}

impl SetValue {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str, DataType::Any]),
        }
    }
}

impl Function for SetValue {
    fn name(&self) -> &str {
        "set_value"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "set_value(field_name, value) update field value"
    }

    fn can_leaf(&self) -> bool {
        true
    }

    fn execute_leaf(&self, ctx: &mut LeafExecuteContext) -> Result<()> {
        let field_name = str_arg(ctx.args, 0)?.to_string();
        let value = ctx.args[1].clone();

        match ctx.data {
            PipelineData::Update(data) => {
                data.updates.push((field_name, value));
                Ok(())
            }
            _ => Err(invalid_root(ctx)),
        }
    }
}
