//! The `delete | where ...` pipeline.

use lumi_common::{Error, Result};

use crate::types::DataType;

use super::{
    str_arg, DeleteData, Filters, Function, FunctionSignature, PipelineData,
    RootExecuteContext, RootFinalizeContext,
};

/// `delete(table)` — root of the row-deletion pipeline.
///
/// Rows matching every accumulated `where` filter are removed in finalize;
/// with no filters, every row matches.
pub struct Delete {
    signature: FunctionSignature,
}

impl Delete {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str]),
        }
    }
}

impl Function for Delete {
    fn name(&self) -> &str {
        "delete"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "delete rows from table"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, ctx: &mut RootExecuteContext) -> Result<()> {
        let table_name = str_arg(ctx.args, 0)?;
        let table = ctx.db.get_table(table_name)?;
        *ctx.data = PipelineData::Delete(DeleteData {
            table,
            filters: Filters::default(),
        });
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let PipelineData::Delete(data) = ctx.data else {
            return Err(Error::new("invalid pipeline state"));
        };

        let removed = data
            .table
            .write()
            .delete_rows(|row, idx| data.filters.matches(row, idx));
        tracing::debug!(removed, "delete finished");

        ctx.result = Some(data.table.clone());
        Ok(())
    }
}
