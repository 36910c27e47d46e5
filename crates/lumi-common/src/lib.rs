//! Shared error handling and small utilities for LumiDB.
//!
//! This crate provides the unified [`Error`]/[`Result`] pair used across all
//! LumiDB components, plus the [`IdGenerator`] the catalog uses for plugin
//! ids.

mod error;
mod ids;

pub use error::{Error, Result, Status};
pub use ids::IdGenerator;
