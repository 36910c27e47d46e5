//! Tables and schemas.

mod schema;
#[allow(clippy::module_inception)]
mod table;

pub use schema::{Field, Schema};
pub use table::{Row, Table};
