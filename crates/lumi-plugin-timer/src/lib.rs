//! Timer plugin: schedule pipelines to run at fixed second intervals.
//!
//! Registers `add_timer`, `remove_timer`, `show_timers`, and
//! `find_missing_values`. A background ticker thread owned by the
//! [`manager::TimerManager`] fires due timers; timers survive until removed
//! or the plugin is unloaded.

mod functions;
mod manager;

use std::os::raw::c_int;
use std::ptr;
use std::sync::Arc;

use lumi_engine::plugin::{PluginContext, PluginDef};
use lumi_engine::Database;

use manager::TimerManager;

/// Borrowed database pointer received over the plugin ABI.
///
/// The host guarantees the database outlives the plugin, and runs our
/// lifecycle hooks one at a time.
#[derive(Clone, Copy)]
pub(crate) struct DbHandle(*const Database);

unsafe impl Send for DbHandle {}
unsafe impl Sync for DbHandle {}

impl DbHandle {
    fn new(ptr: *const Database) -> Self {
        Self(ptr)
    }

    pub(crate) fn db(&self) -> &Database {
        unsafe { &*self.0 }
    }
}

struct TimerPlugin {
    db: DbHandle,
    manager: Arc<TimerManager>,
}

const FUNCTION_NAMES: [&str; 4] = [
    "find_missing_values",
    "add_timer",
    "remove_timer",
    "show_timers",
];

impl TimerPlugin {
    fn new(db: DbHandle) -> Self {
        Self {
            db,
            manager: Arc::new(TimerManager::new(db)),
        }
    }

    fn register(&self) -> Result<(), lumi_common::Error> {
        self.db.db().register_function_list(vec![
            Arc::new(functions::FindMissingValues::new()),
            Arc::new(functions::AddTimer::new(self.manager.clone())),
            Arc::new(functions::RemoveTimer::new(self.manager.clone())),
            Arc::new(functions::ShowTimers::new(self.manager.clone())),
        ])
    }
}

impl Drop for TimerPlugin {
    fn drop(&mut self) {
        if let Err(e) = self.db.db().unregister_function_list(&FUNCTION_NAMES) {
            tracing::error!("timer-plugin: failed to unregister functions: {e}");
        }
    }
}

extern "C" fn on_load(ctx: *mut PluginContext) -> c_int {
    let ctx = unsafe { &mut *ctx };
    if ctx.db.is_null() {
        ctx.error = c"missing database handle".as_ptr();
        return 1;
    }

    let db = DbHandle::new(ctx.db as *const Database);
    let plugin = Box::new(TimerPlugin::new(db));

    if let Err(e) = plugin.register() {
        tracing::error!("timer-plugin: {e}");
        ctx.error = c"failed to register timer functions".as_ptr();
        return 1;
    }

    ctx.user_data = Box::into_raw(plugin).cast();
    0
}

extern "C" fn on_unload(ctx: *mut PluginContext) -> c_int {
    let ctx = unsafe { &mut *ctx };
    if !ctx.user_data.is_null() {
        drop(unsafe { Box::from_raw(ctx.user_data as *mut TimerPlugin) });
        ctx.user_data = ptr::null_mut();
    }
    0
}

/// Plugin entry point resolved by the host.
///
/// # Safety
///
/// Only called by the LumiDB plugin loader.
#[no_mangle]
pub extern "C" fn lumi_db_get_plugin_def() -> PluginDef {
    PluginDef {
        name: c"timer-plugin".as_ptr(),
        version: c"0.1.0".as_ptr(),
        description: c"LumiDB Timer Plugin".as_ptr(),
        on_load: Some(on_load),
        on_unload: Some(on_unload),
    }
}
