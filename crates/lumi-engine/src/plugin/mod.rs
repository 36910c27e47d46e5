//! Dynamic-library plugin host.
//!
//! A plugin is a shared library exporting the C-linkage symbol
//! `lumi_db_get_plugin_def`, which returns the [`PluginDef`] describing it.
//! The load sequence is: open the library, resolve the symbol, call the
//! getter, run `on_load`; a non-zero return unloads the library immediately
//! and surfaces the diagnostic the plugin left in its context. `on_unload`
//! always runs before the library handle is released.

mod api;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;

use libloading::{Library, Symbol};
use lumi_common::{Error, Result};

pub use api::{PluginContext, PluginDef, PluginEntryFn, PLUGIN_ENTRY_SYMBOL};

use crate::database::Database;

/// A loaded plugin instance, owned by the catalog.
///
/// Dropping the instance runs the plugin's `on_unload` hook and then closes
/// the library.
pub struct Plugin {
    id: String,
    name: String,
    version: String,
    description: String,
    load_path: String,
    def: PluginDef,
    ctx: PluginContext,
    library: Library,
}

// The raw pointers in `def`/`ctx` are only handed to the plugin's own hooks,
// which the host invokes from a single thread at a time: `on_load` during
// `Plugin::load` and `on_unload` during drop.
unsafe impl Send for Plugin {}
unsafe impl Sync for Plugin {}

impl Plugin {
    /// Loads a plugin library and runs its `on_load` hook.
    pub(crate) fn load(db: &Database, id: String, path: &str) -> Result<Plugin> {
        let library = unsafe { Library::new(path) }
            .map_err(|e| Error::new(format!("failed to load plugin library: {e}")))?;

        let def = {
            let entry: Symbol<PluginEntryFn> =
                unsafe { library.get(PLUGIN_ENTRY_SYMBOL) }.map_err(|_| {
                    Error::new(
                        "failed to find symbol `lumi_db_get_plugin_def` in plugin, \
                         please check if the plugin is valid",
                    )
                })?;
            unsafe { entry() }
        };

        let Some(on_load) = def.on_load else {
            return Err(Error::new("plugin definition does not have on_load function"));
        };

        let mut ctx = PluginContext {
            user_data: ptr::null_mut(),
            db: db as *const Database as *mut std::os::raw::c_void,
            error: ptr::null(),
        };

        if on_load(&mut ctx) != 0 {
            // `library` drops here, unloading the failed plugin immediately.
            let detail = unsafe { cstr_to_string(ctx.error) };
            return Err(Error::new(format!("failed to load plugin: {detail}")));
        }

        Ok(Plugin {
            id,
            name: unsafe { cstr_to_string(def.name) },
            version: unsafe { cstr_to_string(def.version) },
            description: unsafe { cstr_to_string(def.description) },
            load_path: path.to_string(),
            def,
            ctx,
            library,
        })
    }

    /// Catalog-assigned id (monotonic decimal).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Plugin name from its definition.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugin version from its definition.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Plugin description from its definition.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Path the library was loaded from.
    pub fn load_path(&self) -> &str {
        &self.load_path
    }
}

impl Drop for Plugin {
    fn drop(&mut self) {
        if let Some(on_unload) = self.def.on_unload {
            if on_unload(&mut self.ctx) != 0 {
                tracing::warn!(plugin = %self.name, "plugin on_unload reported failure");
            }
        }
        // `self.library` is released after this body, once the hook is done.
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("load_path", &self.load_path)
            .finish()
    }
}

unsafe fn cstr_to_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}
