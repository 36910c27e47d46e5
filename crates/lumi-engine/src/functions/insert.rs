//! The `insert | add_row / load_csv ...` pipeline.

use std::path::Path;

use csv::Trim;
use lumi_common::{Error, Result};

use crate::table::Row;
use crate::types::{DataType, Value};

use super::{
    invalid_root, str_arg, Function, FunctionSignature, InsertData, LeafExecuteContext,
    PipelineData, RootExecuteContext, RootFinalizeContext,
};

/// `insert(table)` — root of the insertion pipeline.
///
/// Rows staged by the leaves are committed atomically in finalize.
pub struct Insert {
    signature: FunctionSignature,
}

impl Insert {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str]),
        }
    }
}

impl Function for Insert {
    fn name(&self) -> &str {
        "insert"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "start to insert values to table"
    }

    fn can_root(&self) -> bool {
        true
    }

    fn execute_root(&self, ctx: &mut RootExecuteContext) -> Result<()> {
        let table_name = str_arg(ctx.args, 0)?;
        let table = ctx.db.get_table(table_name)?;
        *ctx.data = PipelineData::Insert(InsertData {
            table,
            rows: Vec::new(),
        });
        Ok(())
    }

    fn finalize_root(&self, ctx: &mut RootFinalizeContext) -> Result<()> {
        let PipelineData::Insert(data) = ctx.data else {
            return Err(Error::new("invalid pipeline state"));
        };

        data.table.write().add_row_list(std::mem::take(&mut data.rows))?;
        ctx.result = Some(data.table.clone());
        Ok(())
    }
}

/// `add_row(v1, v2, ...)` — stages one row, validated against the target
/// schema.
pub struct AddRow {
    signature: FunctionSignature,
}

impl AddRow {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Variadic(DataType::Any),
        }
    }
}

impl Function for AddRow {
    fn name(&self) -> &str {
        "add_row"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "add a row of values to insert"
    }

    fn can_leaf(&self) -> bool {
        true
    }

    fn execute_leaf(&self, ctx: &mut LeafExecuteContext) -> Result<()> {
        let PipelineData::Insert(data) = ctx.data else {
            return Err(invalid_root(ctx));
        };

        data.table.read().schema().check_row(ctx.args)?;
        data.rows.push(ctx.args.to_vec());
        Ok(())
    }
}

/// `load_csv(path)` — stages every row of a CSV file.
///
/// The header row must name each schema field exactly once, in any order;
/// cells are parsed with the type of the field they land in.
pub struct LoadCsv {
    signature: FunctionSignature,
}

impl LoadCsv {
    pub fn new() -> Self {
        Self {
            signature: FunctionSignature::Fixed(vec![DataType::Str]),
        }
    }
}

impl Function for LoadCsv {
    fn name(&self) -> &str {
        "load_csv"
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn description(&self) -> &str {
        "load rows from a csv file"
    }

    fn can_leaf(&self) -> bool {
        true
    }

    fn execute_leaf(&self, ctx: &mut LeafExecuteContext) -> Result<()> {
        let PipelineData::Insert(data) = ctx.data else {
            return Err(invalid_root(ctx));
        };

        let path = str_arg(ctx.args, 0)?;
        let rows = read_csv_rows(Path::new(path), data)?;
        data.rows.extend(rows);
        Ok(())
    }
}

fn read_csv_rows(path: &Path, data: &InsertData) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| Error::new(format!("failed to open csv file: {}: {e}", path.display())))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::new(format!("invalid csv file: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let table = data.table.read();
    let schema = table.schema();

    // Headers must cover every schema field exactly once, in any order.
    let field_indices = schema
        .field_indices(&headers)
        .map_err(|e| e.context("invalid csv file"))?;
    if field_indices.len() != schema.len() {
        return Err(Error::new("invalid csv file, field size mismatch"));
    }

    let mut rows = Vec::new();
    for (row_no, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::new(format!("invalid csv file: {e}")))?;
        if record.len() != headers.len() {
            return Err(Error::new(format!(
                "invalid csv file, row {} has {} fields, expected {}",
                row_no,
                record.len(),
                headers.len()
            )));
        }

        let mut row: Row = vec![Value::Null; field_indices.len()];
        for (col_no, cell) in record.iter().enumerate() {
            let field_index = field_indices[col_no];
            let field_type = schema.fields()[field_index].data_type;
            let value = Value::parse_typed(field_type, cell).map_err(|e| {
                e.context(format!(
                    "failed to parse value from csv file, row_no={}, col_no={}, header={}, value={}",
                    row_no, col_no, headers[col_no], cell
                ))
            })?;
            row[field_index] = value;
        }
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use crate::catalog::new_table_ref;
    use crate::table::{Field, Schema, Table};

    use super::*;

    fn insert_data() -> InsertData {
        let schema = Schema::new(vec![
            Field::new("a", DataType::Float),
            Field::new("b", DataType::Str),
        ])
        .unwrap();
        InsertData {
            table: new_table_ref(Table::new("t", schema)),
            rows: Vec::new(),
        }
    }

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn test_read_csv_in_schema_order() {
        let data = insert_data();
        let file = write_csv("a,b\n1,hello\n2,world\n");
        let rows = read_csv_rows(file.path(), &data).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Float(1.0), Value::string("hello")],
                vec![Value::Float(2.0), Value::string("world")],
            ]
        );
    }

    #[test]
    fn test_read_csv_with_reordered_headers() {
        let data = insert_data();
        let file = write_csv("b,a\nhello,1\nworld,2\n");
        let rows = read_csv_rows(file.path(), &data).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Float(1.0), Value::string("hello")],
                vec![Value::Float(2.0), Value::string("world")],
            ]
        );
    }

    #[test]
    fn test_read_csv_missing_header() {
        let data = insert_data();
        let file = write_csv("a\n1\n");
        let err = read_csv_rows(file.path(), &data).unwrap_err();
        assert!(err.message.contains("field size mismatch"));
    }

    #[test]
    fn test_read_csv_unknown_header() {
        let data = insert_data();
        let file = write_csv("a,c\n1,2\n");
        let err = read_csv_rows(file.path(), &data).unwrap_err();
        assert!(err.message.contains("invalid csv file"));
    }

    #[test]
    fn test_read_csv_bad_cell_is_annotated() {
        let data = insert_data();
        let file = write_csv("a,b\nnot_a_number,hello\n");
        let err = read_csv_rows(file.path(), &data).unwrap_err();
        assert!(err.message.contains("row_no=0"));
        assert!(err.message.contains("header=a"));
        assert!(err.message.contains("invalid number"));
    }

    #[test]
    fn test_read_csv_nullable_empty_cells() {
        let schema = Schema::new(vec![
            Field::new("x", DataType::NullableFloat),
            Field::new("y", DataType::NullableStr),
        ])
        .unwrap();
        let data = InsertData {
            table: new_table_ref(Table::new("t", schema)),
            rows: Vec::new(),
        };
        let file = write_csv("x,y\n,\n1.5,hi\n");
        let rows = read_csv_rows(file.path(), &data).unwrap();
        assert_eq!(rows[0], vec![Value::Null, Value::Null]);
        assert_eq!(rows[1], vec![Value::Float(1.5), Value::string("hi")]);
    }

    #[test]
    fn test_missing_file() {
        let data = insert_data();
        let err = read_csv_rows(Path::new("/nonexistent/x.csv"), &data).unwrap_err();
        assert!(err.message.contains("failed to open csv file"));
    }
}
