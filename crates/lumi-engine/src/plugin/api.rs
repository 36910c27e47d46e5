//! The plugin C ABI.
//!
//! These types cross the dynamic-library boundary and must not change
//! without a major version bump.

use std::os::raw::{c_char, c_int, c_void};

/// Name of the entry symbol every plugin library exports.
pub const PLUGIN_ENTRY_SYMBOL: &[u8] = b"lumi_db_get_plugin_def\0";

/// Context handed to the lifecycle hooks.
#[repr(C)]
pub struct PluginContext {
    /// Plugin-owned scratch pointer; the host never touches it.
    pub user_data: *mut c_void,
    /// The hosting database; plugins cast this back to `&Database`.
    pub db: *mut c_void,
    /// Set by a hook before returning non-zero to explain the failure.
    pub error: *const c_char,
}

/// A plugin's self-description and lifecycle hooks.
///
/// Hooks return 0 on success; any other value fails the operation and the
/// host reads [`PluginContext::error`] for the diagnostic.
#[repr(C)]
pub struct PluginDef {
    /// Plugin name.
    pub name: *const c_char,
    /// Plugin version string.
    pub version: *const c_char,
    /// One-line description.
    pub description: *const c_char,
    /// Called once right after the library is opened.
    pub on_load: Option<extern "C" fn(ctx: *mut PluginContext) -> c_int>,
    /// Called before the library is released.
    pub on_unload: Option<extern "C" fn(ctx: *mut PluginContext) -> c_int>,
}

/// Type of the `lumi_db_get_plugin_def` entry point.
pub type PluginEntryFn = unsafe extern "C" fn() -> PluginDef;
