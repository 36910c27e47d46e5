//! Monotonic id generation.

use std::sync::atomic::{AtomicI64, Ordering};

/// Hands out monotonically increasing decimal string ids, starting at 1.
///
/// Used by the catalog to name loaded plugins.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicI64,
}

impl IdGenerator {
    /// Creates a generator whose first id is `"1"`.
    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(1),
        }
    }

    /// Returns the next id.
    pub fn next_id(&self) -> String {
        self.next.fetch_add(1, Ordering::Relaxed).to_string()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
