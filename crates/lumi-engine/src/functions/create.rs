//! The `create_table | add_field ...` pipeline.

use lumi_common::{Error, Result};

use crate::query::{Query, QueryFunction};
use crate::table::{Field, Schema, Table};
use crate::types::{DataType, Value};

use super::{
    invalid_root, str_arg, CreateTableData, Function, FunctionSignature, LeafExecuteContext,
    PipelineData, RootExecuteContext, RootFinalizeContext,
};

/// `create_table(name)` — root of the table-creation pipeline.
///
/// The schema is assembled by `add_field` leaves; finalize inserts the table
/// into the catalog and returns its description.
pub struct CreateTable {
    signature: FunctionSignature,
}

impl CreateTable {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str]),
        }
    }
}

impl Function for CreateTable {
    fn name(&self) -> &str {
        "create_table"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "create a table. Use like `create_table(\"stu\") | add_field(\"name\", \"string\")`"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, ctx: &mut RootExecuteContext) -> Result<()> {
        let name = str_arg(ctx.args, 0)?;
        *ctx.data = PipelineData::CreateTable(CreateTableData {
            name: name.to_string(),
            schema: Schema::empty(),
        });
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let PipelineData::CreateTable(data) = ctx.data else {
            return Err(Error::new("invalid pipeline state"));
        };

        if data.schema.is_empty() {
            return Err(Error::new("schema is empty"));
        }

        let table = Table::new(data.name.clone(), data.schema.clone());
        ctx.db.create_table(table)?;

        let desc = Query::new(vec![QueryFunction::new(
            "desc_table",
            vec![Value::string(&data.name)],
        )]);
        ctx.result = Some(ctx.db.execute(desc).join()?);
        Ok(())
    }
}

/// `add_field(name, type)` — appends a field to the pending schema.
pub struct AddField {
    signature: FunctionSignature,
}

impl AddField {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str, DataType::Str]),
        }
    }
}

impl Function for AddField {
    fn name(&self) -> &str {
        "add_field"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "add a field to the table. Supported types are `float`, `string`, `float?`, `string?`. \
         The `?` means nullable."
    }

    fn can_leaf(&self) -> bool {
        true
    }

    fn execute_leaf(&self, ctx: &mut LeafExecuteContext) -> Result<()> {
        let field_name = str_arg(ctx.args, 0)?.to_string();
        let field_type = DataType::parse(str_arg(ctx.args, 1)?)?;

        match ctx.data {
            PipelineData::CreateTable(data) => {
                data.schema.add_field(Field::new(field_name, field_type))
            }
            _ => Err(invalid_root(ctx)),
        }
    }
}
