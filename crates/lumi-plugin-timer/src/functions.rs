//! Pipeline functions contributed by the timer plugin.

use std::sync::Arc;

use lumi_common::Result;
use lumi_engine::catalog::new_table_ref;
use lumi_engine::functions::{
    str_arg, Function, FunctionSignature, RootExecuteContext, RootFinalizeContext,
};
use lumi_engine::query::{Query, QueryFunction};
use lumi_engine::table::{Field, Schema, Table};
use lumi_engine::types::{DataType, Value};

use crate::manager::TimerManager;

fn show_timers_query() -> Query {
    Query::new(vec![QueryFunction::new("show_timers", vec![])])
}

/// `find_missing_values(table, field)` — rows where the field is null.
pub struct FindMissingValues {
    signature: FunctionSignature,
}

impl FindMissingValues {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str, DataType::Str]),
        }
    }
}

impl Function for FindMissingValues {
    fn name(&self) -> &str {
        "find_missing_values"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "timer-plugin: find_missing_values(<table>, <field>)"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, _ctx: &mut RootExecuteContext) -> Result<()> {
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let table = ctx.args[0].clone();
        let field = ctx.args[1].clone();

        let query = Query::new(vec![
            QueryFunction::new("query", vec![table]),
            QueryFunction::new("where", vec![field, Value::string("="), Value::Null]),
        ]);
        ctx.result = Some(ctx.db.execute(query).join()?);
        Ok(())
    }
}

/// `add_timer(interval, query)` — schedules a pipeline, then shows the
/// timers.
pub struct AddTimer {
    signature: FunctionSignature,
    manager: Arc<TimerManager>,
}

impl AddTimer {
    pub fn new(manager: Arc<TimerManager>) -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str, DataType::Str]),
            manager,
        }
    }
}

impl Function for AddTimer {
    fn name(&self) -> &str {
        "add_timer"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "timer-plugin: add_timer(<time-str>, <query-str>)"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, _ctx: &mut RootExecuteContext) -> Result<()> {
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let interval = str_arg(ctx.args, 0)?;
        let query = str_arg(ctx.args, 1)?;

        let id = self.manager.add_timer(interval, query)?;
        tracing::info!(id = %id, "timer-plugin: added timer");

        ctx.result = Some(ctx.db.execute(show_timers_query()).join()?);
        Ok(())
    }
}

/// `remove_timer(id)` — cancels a timer, then shows the remaining ones.
pub struct RemoveTimer {
    signature: FunctionSignature,
    manager: Arc<TimerManager>,
}

impl RemoveTimer {
    pub fn new(manager: Arc<TimerManager>) -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str]),
            manager,
        }
    }
}

impl Function for RemoveTimer {
    fn name(&self) -> &str {
        "remove_timer"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "timer-plugin: remove_timer(<timer-id>)"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, _ctx: &mut RootExecuteContext) -> Result<()> {
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let id = str_arg(ctx.args, 0)?;
        self.manager.remove_timer(id)?;
        tracing::info!(id, "timer-plugin: removed timer");

        ctx.result = Some(ctx.db.execute(show_timers_query()).join()?);
        Ok(())
    }
}

/// `show_timers()` — one row per live timer.
pub struct ShowTimers {
    signature: FunctionSignature,
    manager: Arc<TimerManager>,
}

impl ShowTimers {
    pub fn new(manager: Arc<TimerManager>) -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![]),
            manager,
        }
    }
}

impl Function for ShowTimers {
    fn name(&self) -> &str {
        "show_timers"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "timer-plugin: show_timers()"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, _ctx: &mut RootExecuteContext) -> Result<()> {
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Str),
            Field::new("interval", DataType::Str),
            Field::new("query", DataType::Str),
        ])?;

        let mut out = Table::new("timers", schema);
        for timer in self.manager.list_timers() {
            out.add_row(vec![
                Value::string(timer.id),
                Value::string(timer.interval),
                Value::string(timer.query),
            ])?;
        }

        ctx.result = Some(new_table_ref(out));
        Ok(())
    }
}
