//! LumiDB engine.
//!
//! An in-memory, single-node tabular data store driven by a small pipeline
//! query language of the form `f0(args) | f1(args) | ... | fn(args)`.
//!
//! The engine is organized as:
//!
//! - [`types`] — the value/type lattice (`float`, `string`, nullable
//!   variants, `null`, `any`) with widening and epsilon float comparison.
//! - [`table`] — named schemas and row storage with the relational
//!   primitives the built-in functions compose.
//! - [`query`] — the lexer and recursive-descent parser for the pipeline
//!   language, shared by the engine and the REPL highlighter/completer.
//! - [`functions`] — the root/leaf function contract and the built-in
//!   library (`create_table`, `insert`, `query`, `update`, `delete`,
//!   aggregations, and the `show_*` meta functions).
//! - [`catalog`] — the versioned, thread-safe collection of tables,
//!   functions, and plugins.
//! - [`executor`] — the single-worker task queue behind
//!   [`Database::execute`].
//! - [`plugin`] — the dynamic-library plugin host and its C ABI.
//!
//! # Usage
//!
//! ```no_run
//! use lumi_engine::{Database, query::parse_query};
//!
//! let db = Database::open().unwrap();
//! let query = parse_query("create_table('stu') | add_field('name', 'string')").unwrap();
//! let table = db.execute(query).join().unwrap();
//! println!("{}", table.read().name());
//! ```

pub mod catalog;
pub mod database;
pub mod executor;
pub mod functions;
pub mod plugin;
pub mod query;
pub mod table;
pub mod types;

pub use catalog::{Catalog, FunctionRef, PluginRef, TableRef};
pub use database::Database;
pub use executor::TaskHandle;
pub use lumi_common::{Error, Result, Status};
pub use table::{Row, Schema, Table};
pub use types::{CompareOp, DataType, Value};
