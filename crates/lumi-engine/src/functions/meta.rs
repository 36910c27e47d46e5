//! Catalog introspection and plugin lifecycle functions.

use lumi_common::Result;

use crate::catalog::new_table_ref;
use crate::query::{Query, QueryFunction};
use crate::table::{Field, Schema, Table};
use crate::types::{DataType, Value};

use super::{
    format_function, str_arg, Function, FunctionSignature, RootExecuteContext,
    RootFinalizeContext,
};

fn plugin_row_schema() -> Result<Schema> {
    Schema::new(vec![
        Field::new("id", DataType::Str),
        Field::new("name", DataType::Str),
        Field::new("version", DataType::Str),
        Field::new("description", DataType::Str),
        Field::new("load_path", DataType::Str),
    ])
}

/// `show_tables()` — one row per catalog table.
pub struct ShowTables {
    signature: FunctionSignature,
}

impl ShowTables {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![]),
        }
    }
}

impl Function for ShowTables {
    fn name(&self) -> &str {
        "show_tables"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "show tables in the database"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, _ctx: &mut RootExecuteContext) -> Result<()> {
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let schema = Schema::new(vec![Field::new("name", DataType::Str)])?;
        let mut out = Table::new("show_tables", schema);
        for table in ctx.db.list_tables() {
            out.add_row(vec![Value::string(table.read().name())])?;
        }
        ctx.result = Some(new_table_ref(out));
        Ok(())
    }
}

/// `show_functions()` — signature, pipeline role, and description of every
/// registered function.
pub struct ShowFunctions {
    signature: FunctionSignature,
}

impl ShowFunctions {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![]),
        }
    }
}

impl Function for ShowFunctions {
    fn name(&self) -> &str {
        "show_functions"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "show functions in the database"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, _ctx: &mut RootExecuteContext) -> Result<()> {
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let schema = Schema::new(vec![
            Field::new("signature", DataType::Str),
            Field::new("type", DataType::Str),
            Field::new("description", DataType::Str),
        ])?;
        let mut out = Table::new("", schema);
        for func in ctx.db.list_functions() {
            let role = if func.can_root() { "root" } else { "leaf" };
            out.add_row(vec![
                Value::string(format_function(func.as_ref())),
                Value::string(role),
                Value::string(func.description()),
            ])?;
        }
        ctx.result = Some(new_table_ref(out));
        Ok(())
    }
}

/// `show_plugins()` — one row per loaded plugin.
pub struct ShowPlugins {
    signature: FunctionSignature,
}

impl ShowPlugins {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![]),
        }
    }
}

impl Function for ShowPlugins {
    fn name(&self) -> &str {
        "show_plugins"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "show plugins in the database"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, _ctx: &mut RootExecuteContext) -> Result<()> {
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let mut out = Table::new("", plugin_row_schema()?);
        for plugin in ctx.db.list_plugins() {
            out.add_row(vec![
                Value::string(plugin.id()),
                Value::string(plugin.name()),
                Value::string(plugin.version()),
                Value::string(plugin.description()),
                Value::string(plugin.load_path()),
            ])?;
        }
        ctx.result = Some(new_table_ref(out));
        Ok(())
    }
}

/// `desc_table(name)` — one row describing the field types plus a `rows`
/// column holding the row count.
pub struct DescTable {
    signature: FunctionSignature,
}

impl DescTable {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str]),
        }
    }
}

impl Function for DescTable {
    fn name(&self) -> &str {
        "desc_table"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "describe table"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, _ctx: &mut RootExecuteContext) -> Result<()> {
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let table_name = str_arg(ctx.args, 0)?;
        let table = ctx.db.get_table(table_name)?;
        let table = table.read();

        let mut schema = Schema::empty();
        for field in table.schema().fields() {
            schema.add_field(Field::new(field.name.clone(), DataType::Str))?;
        }
        schema.add_field(Field::new("rows", DataType::Float))?;

        let mut row: Vec<Value> = table
            .schema()
            .fields()
            .iter()
            .map(|f| Value::string(f.data_type.name()))
            .collect();
        row.push(Value::Float(table.num_rows() as f32));

        let mut out = Table::new("desc_table", schema);
        out.add_row(row)?;
        ctx.result = Some(new_table_ref(out));
        Ok(())
    }
}

/// `load_plugin(path)` — loads a plugin library and reports it.
pub struct LoadPlugin {
    signature: FunctionSignature,
}

impl LoadPlugin {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str]),
        }
    }
}

impl Function for LoadPlugin {
    fn name(&self) -> &str {
        "load_plugin"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "load plugin to the database"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, _ctx: &mut RootExecuteContext) -> Result<()> {
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let load_path = str_arg(ctx.args, 0)?;
        let plugin = ctx.db.load_plugin(load_path)?;

        let mut out = Table::new("", plugin_row_schema()?);
        out.add_row(vec![
            Value::string(plugin.id()),
            Value::string(plugin.name()),
            Value::string(plugin.version()),
            Value::string(plugin.description()),
            Value::string(plugin.load_path()),
        ])?;

        tracing::info!(name = plugin.name(), "load plugin ok");
        ctx.result = Some(new_table_ref(out));
        Ok(())
    }
}

/// `unload_plugin(id)` — unloads by id, then returns the remaining plugins.
pub struct UnloadPlugin {
    signature: FunctionSignature,
}

impl UnloadPlugin {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str]),
        }
    }
}

impl Function for UnloadPlugin {
    fn name(&self) -> &str {
        "unload_plugin"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "unload plugin"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, _ctx: &mut RootExecuteContext) -> Result<()> {
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let plugin_id = str_arg(ctx.args, 0)?;
        ctx.db.unload_plugin(plugin_id)?;

        let show = Query::new(vec![QueryFunction::new("show_plugins", vec![])]);
        let result = ctx.db.execute(show).join()?;

        tracing::info!(id = plugin_id, "unload plugin ok");
        ctx.result = Some(result);
        Ok(())
    }
}
