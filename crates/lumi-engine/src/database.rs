//! The database facade: catalog + executor + the pipeline protocol.

use std::sync::{Arc, OnceLock, Weak};

use lumi_common::{Error, Result};

use crate::catalog::{new_table_ref, Catalog, FunctionRef, PluginRef, TableRef};
use crate::executor::{Executor, TaskHandle};
use crate::functions::{
    builtin_functions, LeafExecuteContext, PipelineData, RootExecuteContext, RootFinalizeContext,
};
use crate::plugin::Plugin;
use crate::query::Query;
use crate::table::{Schema, Table};

/// An in-memory LumiDB instance.
///
/// All query execution goes through [`execute`](Database::execute), which
/// runs on a single worker thread; two non-overlapping calls observe each
/// other's catalog changes in submission order. Built-in functions may
/// re-enter `execute` from inside the worker, where the call runs inline.
pub struct Database {
    catalog: Catalog,
    executor: Executor,
    // Set once at open; lets plugins holding a bare `&Database` re-enter
    // `execute`, and makes re-entry during shutdown fail cleanly instead of
    // reviving a dying Arc.
    self_ref: OnceLock<Weak<Database>>,
}

impl Database {
    /// Creates a database with the built-in functions registered.
    pub fn open() -> Result<Arc<Database>> {
        let executor = Executor::new()
            .map_err(|e| Error::new(format!("failed to start executor: {e}")))?;

        let db = Arc::new(Database {
            catalog: Catalog::new(),
            executor,
            self_ref: OnceLock::new(),
        });
        let _ = db.self_ref.set(Arc::downgrade(&db));

        db.catalog
            .register_function_list(builtin_functions())
            .map_err(|e| e.context("failed to register builtin functions"))?;

        Ok(db)
    }

    fn shared(&self) -> Result<Arc<Database>> {
        self.self_ref
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| Error::new("database is shutting down"))
    }

    /// Catalog version; bumped on every successful mutation.
    pub fn version(&self) -> i64 {
        self.catalog.version()
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// Inserts a new table into the catalog.
    pub fn create_table(&self, table: Table) -> Result<TableRef> {
        self.catalog.create_table(table)
    }

    /// Drops a table; unknown names are a no-op.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.catalog.drop_table(name)
    }

    /// Looks up a table by name.
    pub fn get_table(&self, name: &str) -> Result<TableRef> {
        self.catalog.get_table(name)
    }

    /// Returns all tables in creation order.
    pub fn list_tables(&self) -> Vec<TableRef> {
        self.catalog.list_tables()
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Registers a function.
    pub fn register_function(&self, func: FunctionRef) -> Result<()> {
        self.catalog.register_function(func)
    }

    /// Registers a batch of functions atomically.
    pub fn register_function_list(&self, funcs: Vec<FunctionRef>) -> Result<()> {
        self.catalog.register_function_list(funcs)
    }

    /// Unregisters a function; unknown names are a no-op.
    pub fn unregister_function(&self, name: &str) -> Result<()> {
        self.catalog.unregister_function(name)
    }

    /// Unregisters a batch of functions.
    pub fn unregister_function_list<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        self.catalog.unregister_function_list(names)
    }

    /// Looks up a function by name.
    pub fn get_function(&self, name: &str) -> Result<FunctionRef> {
        self.catalog.get_function(name)
    }

    /// Returns all functions in registration order.
    pub fn list_functions(&self) -> Vec<FunctionRef> {
        self.catalog.list_functions()
    }

    // ========================================================================
    // Plugins
    // ========================================================================

    /// Loads a plugin library and registers it in the catalog.
    pub fn load_plugin(&self, path: &str) -> Result<PluginRef> {
        let id = self.catalog.next_plugin_id();
        let plugin = Arc::new(Plugin::load(self, id, path)?);
        self.catalog.add_plugin(plugin.clone())?;
        Ok(plugin)
    }

    /// Unloads a plugin by id; its `on_unload` hook runs with no catalog
    /// lock held. Unknown ids are a no-op.
    pub fn unload_plugin(&self, id: &str) -> Result<()> {
        let removed = self.catalog.remove_plugin(id)?;
        drop(removed);
        Ok(())
    }

    /// Looks up a plugin by id.
    pub fn get_plugin(&self, id: &str) -> Result<PluginRef> {
        self.catalog.get_plugin(id)
    }

    /// Returns all plugins in load order.
    pub fn list_plugins(&self) -> Vec<PluginRef> {
        self.catalog.list_plugins()
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Submits a query to the worker and returns a handle for the result.
    pub fn execute(&self, query: Query) -> TaskHandle<Result<TableRef>> {
        match self.shared() {
            Ok(db) => self.executor.submit(move || db.execute_query(&query)),
            Err(e) => TaskHandle::ready(Err(e)),
        }
    }

    fn execute_query(&self, query: &Query) -> Result<TableRef> {
        if query.functions.is_empty() {
            return Err(Error::new("no function to execute"));
        }

        let names: Vec<&str> = query.functions.iter().map(|f| f.name.as_str()).collect();
        let funcs = self
            .catalog
            .resolve_functions(&names)
            .map_err(|e| e.context("failed to resolve"))?;

        for (func, stage) in funcs.iter().zip(&query.functions) {
            func.signature()
                .check(&stage.args)
                .map_err(|e| e.context(format!("function {} typecheck failed", func.name())))?;
        }

        let root = funcs[0].clone();
        if !root.can_root() {
            return Err(Error::new(format!(
                "function {} is not allowed to be root",
                root.name()
            )));
        }
        for func in &funcs[1..] {
            if !func.can_leaf() {
                return Err(Error::new(format!(
                    "function {} is not allowed to be leaf",
                    func.name()
                )));
            }
        }

        let mut data = PipelineData::Empty;

        let mut root_ctx = RootExecuteContext {
            db: self,
            args: &query.functions[0].args,
            data: &mut data,
        };
        root.execute_root(&mut root_ctx)
            .map_err(|e| e.context(format!("failed to execute: {}", root.name())))?;

        for (func, stage) in funcs[1..].iter().zip(&query.functions[1..]) {
            let mut leaf_ctx = LeafExecuteContext {
                db: self,
                args: &stage.args,
                data: &mut data,
                root: &root,
            };
            func.execute_leaf(&mut leaf_ctx)
                .map_err(|e| e.context(format!("failed to execute: {}", func.name())))?;
        }

        let mut final_ctx = RootFinalizeContext {
            db: self,
            args: &query.functions[0].args,
            data: &mut data,
            result: None,
        };
        root.finalize_root(&mut final_ctx)
            .map_err(|e| e.context(format!("failed to finalize: {}", root.name())))?;

        Ok(final_ctx
            .result
            .unwrap_or_else(|| new_table_ref(Table::new("", Schema::empty()))))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::query::parse_query;
    use crate::types::Value;

    use super::*;

    fn run(db: &Arc<Database>, input: &str) -> Result<TableRef> {
        db.execute(parse_query(input)?).join()
    }

    fn rows(table: &TableRef) -> Vec<Vec<Value>> {
        table.read().rows().to_vec()
    }

    fn header(table: &TableRef) -> Vec<String> {
        table.read().schema().field_names()
    }

    fn student_db() -> Arc<Database> {
        let db = Database::open().unwrap();
        run(
            &db,
            "create_table('stu') | add_field('name','string') | add_field('age','float')",
        )
        .unwrap();
        run(&db, "insert('stu') | add_row('Ada', 36) | add_row('Lin', 22)").unwrap();
        db
    }

    #[test]
    fn test_create_insert_select() {
        let db = student_db();
        let result = run(&db, "query('stu') | select('name')").unwrap();
        assert_eq!(header(&result), vec!["name"]);
        assert_eq!(
            rows(&result),
            vec![vec![Value::string("Ada")], vec![Value::string("Lin")]]
        );
    }

    #[test]
    fn test_where_and_sort_desc() {
        let db = student_db();
        let result = run(&db, "query('stu') | where('age','>',25) | sort_desc('age')").unwrap();
        assert_eq!(header(&result), vec!["name", "age"]);
        assert_eq!(
            rows(&result),
            vec![vec![Value::string("Ada"), Value::Float(36.0)]]
        );
    }

    #[test]
    fn test_avg_counts_null_rows_in_denominator() {
        let db = Database::open().unwrap();
        run(&db, "create_table('t') | add_field('score','float?')").unwrap();
        run(
            &db,
            "insert('t') | add_row(10) | add_row(null) | add_row(20) | add_row(30)",
        )
        .unwrap();

        let result = run(&db, "query('t') | avg('score')").unwrap();
        assert_eq!(header(&result), vec!["avg(score)"]);
        assert_eq!(rows(&result), vec![vec![Value::Float(15.0)]]);
    }

    #[test]
    fn test_load_csv_with_reordered_headers() {
        let db = Database::open().unwrap();
        run(&db, "create_table('t') | add_field('a','float') | add_field('b','string')").unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "b,a\nhello,1\nworld,2\n").unwrap();

        let query = format!("insert('t') | load_csv('{}')", file.path().display());
        let result = run(&db, &query).unwrap();
        assert_eq!(
            rows(&result),
            vec![
                vec![Value::Float(1.0), Value::string("hello")],
                vec![Value::Float(2.0), Value::string("world")],
            ]
        );
    }

    #[test]
    fn test_update_with_filter() {
        let db = Database::open().unwrap();
        run(&db, "create_table('t') | add_field('k','string') | add_field('v','float')").unwrap();
        run(&db, "insert('t') | add_row('x', 1) | add_row('y', 2)").unwrap();

        let result = run(&db, "update('t') | where('k','=','y') | set_value('v', 99)").unwrap();
        assert_eq!(
            rows(&result),
            vec![
                vec![Value::string("x"), Value::Float(1.0)],
                vec![Value::string("y"), Value::Float(99.0)],
            ]
        );
    }

    #[test]
    fn test_delete_with_filter() {
        let db = student_db();
        let result = run(&db, "delete('stu') | where('age','<',30)").unwrap();
        assert_eq!(rows(&result), vec![vec![Value::string("Ada"), Value::Float(36.0)]]);
        // The catalog table itself was mutated.
        assert_eq!(db.get_table("stu").unwrap().read().num_rows(), 1);
    }

    #[test]
    fn test_where_null_selects_null_rows() {
        let db = Database::open().unwrap();
        run(&db, "create_table('t') | add_field('score','float?')").unwrap();
        run(&db, "insert('t') | add_row(10) | add_row(null) | add_row(20)").unwrap();

        let result = run(&db, "query('t') | where('score','=',null)").unwrap();
        assert_eq!(rows(&result), vec![vec![Value::Null]]);
    }

    #[test]
    fn test_create_table_returns_description() {
        let db = Database::open().unwrap();
        let result = run(
            &db,
            "create_table('stu') | add_field('name','string') | add_field('age','float')",
        )
        .unwrap();
        // create_table re-enters execute for desc_table on the worker thread.
        assert_eq!(header(&result), vec!["name", "age", "rows"]);
        assert_eq!(
            rows(&result),
            vec![vec![
                Value::string("string"),
                Value::string("float"),
                Value::Float(0.0)
            ]]
        );
    }

    #[test]
    fn test_empty_schema_fails_finalize() {
        let db = Database::open().unwrap();
        let err = run(&db, "create_table('t')").unwrap_err();
        assert_eq!(err.message, "failed to finalize: create_table: schema is empty");
    }

    #[test]
    fn test_unknown_function_fails_resolve() {
        let db = Database::open().unwrap();
        let err = run(&db, "frobnicate()").unwrap_err();
        assert_eq!(err.message, "failed to resolve: function not found: frobnicate");
    }

    #[test]
    fn test_typecheck_failure_is_annotated() {
        let db = Database::open().unwrap();
        let err = run(&db, "query(42)").unwrap_err();
        assert_eq!(
            err.message,
            "function query typecheck failed: argument 1 type mismatch, expected string, got float"
        );
    }

    #[test]
    fn test_role_errors() {
        let db = student_db();
        let err = run(&db, "select('name')").unwrap_err();
        assert!(err.message.contains("not allowed to be root"));

        let err = run(&db, "query('stu') | insert('stu')").unwrap_err();
        assert!(err.message.contains("not allowed to be leaf"));
    }

    #[test]
    fn test_leaf_under_wrong_root() {
        let db = student_db();
        let err = run(&db, "query('stu') | add_field('x','float')").unwrap_err();
        assert!(err.message.contains("invalid pipeline root: query"));
    }

    #[test]
    fn test_empty_query_programmatically() {
        let db = Database::open().unwrap();
        let err = db.execute(Query::new(vec![])).join().unwrap_err();
        assert_eq!(err.message, "no function to execute");
    }

    #[test]
    fn test_sort_without_fields_fails() {
        let db = student_db();
        let err = run(&db, "query('stu') | sort()").unwrap_err();
        assert!(err.message.contains("sort fields can not be empty"));
    }

    #[test]
    fn test_limit_clips_and_truncates() {
        let db = student_db();
        let result = run(&db, "query('stu') | limit(99)").unwrap();
        assert_eq!(rows(&result).len(), 2);

        let result = run(&db, "query('stu') | limit(1.9)").unwrap();
        assert_eq!(rows(&result).len(), 1);

        let err = run(&db, "query('stu') | limit(-1)").unwrap_err();
        assert!(err.message.contains("must not be negative"));
    }

    #[test]
    fn test_min_max() {
        let db = student_db();
        let result = run(&db, "query('stu') | min('age')").unwrap();
        assert_eq!(header(&result), vec!["min(age)"]);
        assert_eq!(rows(&result), vec![vec![Value::Float(22.0)]]);

        let result = run(&db, "query('stu') | max('age', 'name')").unwrap();
        assert_eq!(header(&result), vec!["max(age)", "max(name)"]);
        assert_eq!(
            rows(&result),
            vec![vec![Value::Float(36.0), Value::string("Lin")]]
        );
    }

    #[test]
    fn test_min_skips_nulls_after_seed() {
        let db = Database::open().unwrap();
        run(&db, "create_table('t') | add_field('score','float?')").unwrap();
        run(&db, "insert('t') | add_row(null) | add_row(20) | add_row(null) | add_row(10)")
            .unwrap();

        let result = run(&db, "query('t') | min('score')").unwrap();
        assert_eq!(rows(&result), vec![vec![Value::Float(10.0)]]);
    }

    #[test]
    fn test_avg_rejects_string_fields() {
        let db = student_db();
        let err = run(&db, "query('stu') | avg('name')").unwrap_err();
        assert!(err.message.contains("invalid field type"));
    }

    #[test]
    fn test_show_tables_and_functions() {
        let db = student_db();
        let result = run(&db, "show_tables").unwrap();
        assert_eq!(header(&result), vec!["name"]);
        assert_eq!(rows(&result), vec![vec![Value::string("stu")]]);

        let result = run(&db, "show_functions()").unwrap();
        assert_eq!(header(&result), vec!["signature", "type", "description"]);
        assert_eq!(rows(&result).len(), db.list_functions().len());
    }

    #[test]
    fn test_desc_table() {
        let db = student_db();
        let result = run(&db, "desc_table('stu')").unwrap();
        assert_eq!(header(&result), vec!["name", "age", "rows"]);
        assert_eq!(
            rows(&result),
            vec![vec![
                Value::string("string"),
                Value::string("float"),
                Value::Float(2.0)
            ]]
        );
    }

    #[test]
    fn test_duplicate_table_creation_fails() {
        let db = student_db();
        let err = run(&db, "create_table('stu') | add_field('x','float')").unwrap_err();
        assert!(err.message.contains("table already exists"));
    }

    #[test]
    fn test_insert_add_row_schema_violation() {
        let db = student_db();
        let err = run(&db, "insert('stu') | add_row('only_name')").unwrap_err();
        assert!(err.message.contains("failed to execute: add_row"));
        // Nothing was committed.
        assert_eq!(db.get_table("stu").unwrap().read().num_rows(), 2);
    }

    #[test]
    fn test_result_row_invariant_holds() {
        let db = student_db();
        for input in [
            "query('stu')",
            "query('stu') | select('name')",
            "query('stu') | min('age')",
            "show_tables",
            "desc_table('stu')",
        ] {
            let table = run(&db, input).unwrap();
            let table = table.read();
            for row in table.rows() {
                table.schema().check_row(row).unwrap();
            }
        }
    }

    #[test]
    fn test_load_missing_plugin_fails() {
        let db = Database::open().unwrap();
        let err = run(&db, "load_plugin('/nonexistent/libplugin.so')").unwrap_err();
        assert!(err.message.contains("failed to load plugin library"));
    }

    #[test]
    fn test_unload_unknown_plugin_is_noop() {
        let db = Database::open().unwrap();
        let result = run(&db, "unload_plugin('42')").unwrap();
        assert_eq!(header(&result), vec!["id", "name", "version", "description", "load_path"]);
        assert!(rows(&result).is_empty());
    }

    #[test]
    fn test_queries_observe_each_other_in_submission_order() {
        let db = Database::open().unwrap();
        let first = db.execute(
            parse_query("create_table('seq') | add_field('x','float')").unwrap(),
        );
        let second = db.execute(parse_query("insert('seq') | add_row(1)").unwrap());
        let third = db.execute(parse_query("query('seq')").unwrap());

        first.join().unwrap();
        second.join().unwrap();
        let result = third.join().unwrap();
        assert_eq!(result.read().num_rows(), 1);
    }
}
