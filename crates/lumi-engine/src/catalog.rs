//! The catalog: tables, functions, and plugins, plus the version counter
//! that drives completer refresh in the REPL.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use lumi_common::{Error, IdGenerator, Result};
use parking_lot::{Mutex, RwLock};

use crate::functions::Function;
use crate::plugin::Plugin;
use crate::table::Table;

/// Shared handle to a catalog table.
pub type TableRef = Arc<RwLock<Table>>;
/// Shared handle to a registered function.
pub type FunctionRef = Arc<dyn Function>;
/// Shared handle to a loaded plugin.
pub type PluginRef = Arc<Plugin>;

/// Wraps a table into a shareable handle.
pub fn new_table_ref(table: Table) -> TableRef {
    Arc::new(RwLock::new(table))
}

// Insertion order is iteration order for all three maps, which is what
// show_tables / show_functions / show_plugins present.
#[derive(Default)]
struct CatalogState {
    tables: IndexMap<String, TableRef>,
    functions: IndexMap<String, FunctionRef>,
    plugins: IndexMap<String, PluginRef>,
}

/// Thread-safe collection of tables, functions, and plugins.
///
/// One mutex guards all three maps. Every successful mutation bumps the
/// version by exactly one; reads clone handles out and never hold the lock
/// while callbacks run.
pub struct Catalog {
    state: Mutex<CatalogState>,
    version: AtomicI64,
    plugin_ids: IdGenerator,
}

impl Catalog {
    /// Creates an empty catalog at version 0.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CatalogState::default()),
            version: AtomicI64::new(0),
            plugin_ids: IdGenerator::new(),
        }
    }

    /// Current version; bumped on every successful mutation.
    pub fn version(&self) -> i64 {
        self.version.load(Ordering::Acquire)
    }

    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::Release);
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// Inserts a new table; the name must be free.
    pub fn create_table(&self, table: Table) -> Result<TableRef> {
        let mut state = self.state.lock();
        if state.tables.contains_key(table.name()) {
            return Err(Error::new(format!("table already exists: {}", table.name())));
        }
        let table_ref = new_table_ref(table);
        state
            .tables
            .insert(table_ref.read().name().to_string(), table_ref.clone());
        self.bump_version();
        Ok(table_ref)
    }

    /// Removes a table. Removing an unknown name is a no-op without a
    /// version bump.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.tables.shift_remove(name).is_some() {
            self.bump_version();
        }
        Ok(())
    }

    /// Looks up a table by name.
    pub fn get_table(&self, name: &str) -> Result<TableRef> {
        let state = self.state.lock();
        state
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::new(format!("table not found: {name}")))
    }

    /// Returns all tables in insertion order.
    pub fn list_tables(&self) -> Vec<TableRef> {
        self.state.lock().tables.values().cloned().collect()
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Registers a function; the name must be free.
    pub fn register_function(&self, func: FunctionRef) -> Result<()> {
        let mut state = self.state.lock();
        Self::insert_function(&mut state, func)?;
        self.bump_version();
        Ok(())
    }

    /// Registers a batch of functions atomically: either all are inserted
    /// and the version bumps once, or none are.
    pub fn register_function_list(&self, funcs: Vec<FunctionRef>) -> Result<()> {
        let mut state = self.state.lock();
        for func in &funcs {
            if state.functions.contains_key(func.name()) {
                return Err(Error::new(format!(
                    "function already exists: {}",
                    func.name()
                )));
            }
        }
        for func in funcs {
            // A duplicate inside the batch itself still fails atomically
            // because nothing has been published past this lock yet.
            Self::insert_function(&mut state, func)?;
        }
        self.bump_version();
        Ok(())
    }

    fn insert_function(state: &mut CatalogState, func: FunctionRef) -> Result<()> {
        let name = func.name().to_string();
        if state.functions.contains_key(&name) {
            return Err(Error::new(format!("function already exists: {name}")));
        }
        state.functions.insert(name, func);
        Ok(())
    }

    /// Unregisters a function. Unknown names are a no-op without a bump.
    pub fn unregister_function(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.functions.shift_remove(name).is_some() {
            self.bump_version();
        }
        Ok(())
    }

    /// Unregisters a batch of functions; one version bump if anything was
    /// removed.
    pub fn unregister_function_list<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let mut state = self.state.lock();
        let mut removed = 0;
        for name in names {
            if state.functions.shift_remove(name.as_ref()).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            self.bump_version();
        }
        Ok(())
    }

    /// Looks up a function by name.
    pub fn get_function(&self, name: &str) -> Result<FunctionRef> {
        let state = self.state.lock();
        state
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::new(format!("function not found: {name}")))
    }

    /// Resolves a list of function names under a single lock acquisition.
    pub fn resolve_functions(&self, names: &[&str]) -> Result<Vec<FunctionRef>> {
        let state = self.state.lock();
        names
            .iter()
            .map(|name| {
                state
                    .functions
                    .get(*name)
                    .cloned()
                    .ok_or_else(|| Error::new(format!("function not found: {name}")))
            })
            .collect()
    }

    /// Returns all functions in registration order.
    pub fn list_functions(&self) -> Vec<FunctionRef> {
        self.state.lock().functions.values().cloned().collect()
    }

    // ========================================================================
    // Plugins
    // ========================================================================

    /// Returns the id the next loaded plugin will get.
    pub fn next_plugin_id(&self) -> String {
        self.plugin_ids.next_id()
    }

    /// Inserts a loaded plugin under its id.
    pub fn add_plugin(&self, plugin: PluginRef) -> Result<()> {
        let mut state = self.state.lock();
        if state.plugins.contains_key(plugin.id()) {
            return Err(Error::new(format!("plugin already exists: {}", plugin.id())));
        }
        state.plugins.insert(plugin.id().to_string(), plugin);
        self.bump_version();
        Ok(())
    }

    /// Removes a plugin by id and returns it so the caller can drop it (and
    /// run its unload hook) with no lock held. Unknown ids are a no-op
    /// without a bump.
    pub fn remove_plugin(&self, id: &str) -> Result<Option<PluginRef>> {
        let mut state = self.state.lock();
        let removed = state.plugins.shift_remove(id);
        if removed.is_some() {
            self.bump_version();
        }
        Ok(removed)
    }

    /// Looks up a plugin by id.
    pub fn get_plugin(&self, id: &str) -> Result<PluginRef> {
        let state = self.state.lock();
        state
            .plugins
            .get(id)
            .cloned()
            .ok_or_else(|| Error::new(format!("plugin not found: {id}")))
    }

    /// Returns all plugins in load order.
    pub fn list_plugins(&self) -> Vec<PluginRef> {
        self.state.lock().plugins.values().cloned().collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Catalog {
    fn drop(&mut self) {
        // Unload hooks may call back into the catalog to unregister their
        // functions, so plugins go first, with the lock released and the
        // table/function maps still populated.
        let plugins: Vec<PluginRef> = {
            let mut state = self.state.lock();
            state.plugins.drain(..).map(|(_, plugin)| plugin).collect()
        };
        drop(plugins);
    }
}
