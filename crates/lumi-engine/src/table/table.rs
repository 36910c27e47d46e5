//! In-memory row storage and the relational primitives built-ins compose.

use std::cmp::Ordering;
use std::fmt;

use lumi_common::Result;

use crate::types::Value;

use super::{Field, Schema};

/// A single row of values; always `schema.len()` long.
pub type Row = Vec<Value>;

/// A named table: a schema plus an ordered, mutable sequence of rows.
///
/// Insertion order is stable and is the default iteration order. Mutating
/// operations validate fully before committing, so a failed call leaves the
/// table untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    schema: Schema,
    rows: Vec<Row>,
}

impl Table {
    /// Creates an empty table.
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            rows: Vec::new(),
        }
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the rows in insertion order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the number of rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Validates and appends a single row.
    pub fn add_row(&mut self, row: Row) -> Result<()> {
        self.schema.check_row(&row)?;
        self.rows.push(row);
        Ok(())
    }

    /// Validates every row first, then appends them all.
    pub fn add_row_list(&mut self, rows: Vec<Row>) -> Result<()> {
        for row in &rows {
            self.schema.check_row(row)?;
        }
        self.rows.extend(rows);
        Ok(())
    }

    /// Applies `mutate` in place to every row accepted by `pred`.
    pub fn update_rows<P, M>(&mut self, pred: P, mut mutate: M)
    where
        P: Fn(&[Value], usize) -> bool,
        M: FnMut(&mut Row),
    {
        for (idx, row) in self.rows.iter_mut().enumerate() {
            if pred(row, idx) {
                mutate(row);
            }
        }
    }

    /// Removes every row accepted by `pred`, preserving the order of the
    /// rest. Returns the number of rows removed.
    pub fn delete_rows<P>(&mut self, pred: P) -> usize
    where
        P: Fn(&[Value], usize) -> bool,
    {
        let before = self.rows.len();
        let mut idx = 0;
        self.rows.retain(|row| {
            let keep = !pred(row, idx);
            idx += 1;
            keep
        });
        before - self.rows.len()
    }

    /// Builds a new table containing only the chosen fields, in the given
    /// order.
    pub fn select_indices(&self, field_indices: &[usize]) -> Result<Table> {
        let mut schema = Schema::empty();
        for &idx in field_indices {
            let field = &self.schema.fields()[idx];
            schema.add_field(Field::new(field.name.clone(), field.data_type))?;
        }

        let mut table = Table::new(self.name.clone(), schema);
        for row in &self.rows {
            table
                .rows
                .push(field_indices.iter().map(|&i| row[i].clone()).collect());
        }
        Ok(table)
    }

    /// Builds a new table containing only the named fields.
    pub fn select_names<S: AsRef<str>>(&self, field_names: &[S]) -> Result<Table> {
        let indices = self.schema.field_indices(field_names)?;
        self.select_indices(&indices)
    }

    /// Builds a new table (same schema) keeping rows accepted by `pred`.
    pub fn filter<P>(&self, pred: P) -> Table
    where
        P: Fn(&[Value], usize) -> bool,
    {
        let mut table = Table::new(self.name.clone(), self.schema.clone());
        for (idx, row) in self.rows.iter().enumerate() {
            if pred(row, idx) {
                table.rows.push(row.clone());
            }
        }
        table
    }

    /// Builds a new table sorted lexicographically over the named fields.
    ///
    /// Ties fall through to the next field; fully equal rows keep their
    /// relative order.
    pub fn sort<S: AsRef<str>>(&self, field_names: &[S], ascending: bool) -> Result<Table> {
        let indices = self.schema.field_indices(field_names)?;

        let mut table = self.clone();
        table.rows.sort_by(|a, b| {
            for &idx in &indices {
                let ordering = a[idx].compare(&b[idx]);
                if ordering != Ordering::Equal {
                    return if ascending { ordering } else { ordering.reverse() };
                }
            }
            Ordering::Equal
        });
        Ok(table)
    }

    /// Builds a new table with the rows in `[offset, offset + count)`,
    /// clipped at the end.
    pub fn limit(&self, offset: usize, count: usize) -> Table {
        let mut table = Table::new(self.name.clone(), self.schema.clone());
        table.rows = self
            .rows
            .iter()
            .skip(offset)
            .take(count)
            .cloned()
            .collect();
        table
    }

    /// Left fold over the rows.
    pub fn aggregate<T, F>(&self, init: T, mut fold: F) -> T
    where
        F: FnMut(T, &[Value]) -> T,
    {
        let mut acc = init;
        for row in &self.rows {
            acc = fold(acc, row);
        }
        acc
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn sample_table() -> Table {
        let schema = Schema::new(vec![
            Field::new("name", DataType::Str),
            Field::new("age", DataType::Float),
        ])
        .unwrap();
        let mut table = Table::new("stu", schema);
        table
            .add_row(vec![Value::string("Ada"), Value::Float(36.0)])
            .unwrap();
        table
            .add_row(vec![Value::string("Lin"), Value::Float(22.0)])
            .unwrap();
        table
            .add_row(vec![Value::string("Bob"), Value::Float(22.0)])
            .unwrap();
        table
    }

    #[test]
    fn test_add_row_validates_schema() {
        let mut table = sample_table();
        let err = table
            .add_row(vec![Value::Float(1.0), Value::Float(2.0)])
            .unwrap_err();
        assert!(err.message.contains("field type"));
        assert_eq!(table.num_rows(), 3);
    }

    #[test]
    fn test_add_row_list_is_all_or_nothing() {
        let mut table = sample_table();
        let err = table
            .add_row_list(vec![
                vec![Value::string("Joe"), Value::Float(40.0)],
                vec![Value::string("bad row")],
            ])
            .unwrap_err();
        assert!(err.message.contains("row size"));
        // The valid first row must not have been committed.
        assert_eq!(table.num_rows(), 3);
    }

    #[test]
    fn test_select_produces_new_schema() {
        let table = sample_table();
        let selected = table.select_names(&["name"]).unwrap();
        assert_eq!(selected.schema().field_names(), vec!["name"]);
        assert_eq!(selected.rows()[0], vec![Value::string("Ada")]);
        assert_eq!(selected.num_rows(), 3);

        assert!(table.select_names(&["missing"]).is_err());
    }

    #[test]
    fn test_select_duplicate_field_rejected() {
        let table = sample_table();
        assert!(table.select_names(&["name", "name"]).is_err());
    }

    #[test]
    fn test_filter_keeps_matching_rows() {
        let table = sample_table();
        let filtered = table.filter(|row, _| row[1] == Value::Float(22.0));
        assert_eq!(filtered.num_rows(), 2);
        assert_eq!(filtered.rows()[0][0], Value::string("Lin"));
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let table = sample_table();
        let sorted = table.sort(&["age"], true).unwrap();
        // Lin and Bob tie on age and keep their insertion order.
        assert_eq!(sorted.rows()[0][0], Value::string("Lin"));
        assert_eq!(sorted.rows()[1][0], Value::string("Bob"));
        assert_eq!(sorted.rows()[2][0], Value::string("Ada"));

        let sorted = table.sort(&["age"], false).unwrap();
        assert_eq!(sorted.rows()[0][0], Value::string("Ada"));
    }

    #[test]
    fn test_sort_multi_field_tiebreak() {
        let table = sample_table();
        let sorted = table.sort(&["age", "name"], true).unwrap();
        assert_eq!(sorted.rows()[0][0], Value::string("Bob"));
        assert_eq!(sorted.rows()[1][0], Value::string("Lin"));
    }

    #[test]
    fn test_limit_clips_at_end() {
        let table = sample_table();
        assert_eq!(table.limit(0, 2).num_rows(), 2);
        assert_eq!(table.limit(0, 100).num_rows(), 3);
        assert_eq!(table.limit(2, 5).num_rows(), 1);
        assert_eq!(table.limit(9, 1).num_rows(), 0);
    }

    #[test]
    fn test_update_rows() {
        let mut table = sample_table();
        table.update_rows(
            |row, _| row[0] == Value::string("Lin"),
            |row| row[1] = Value::Float(23.0),
        );
        assert_eq!(table.rows()[1][1], Value::Float(23.0));
        assert_eq!(table.rows()[0][1], Value::Float(36.0));
    }

    #[test]
    fn test_delete_rows_returns_count_and_preserves_order() {
        let mut table = sample_table();
        let removed = table.delete_rows(|row, _| row[1] == Value::Float(22.0));
        assert_eq!(removed, 2);
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.rows()[0][0], Value::string("Ada"));
    }

    #[test]
    fn test_aggregate_folds_rows() {
        let table = sample_table();
        let total = table.aggregate(0.0_f32, |acc, row| {
            acc + row[1].as_float().unwrap_or_default()
        });
        assert!((total - 80.0).abs() < 1e-3);
    }
}
