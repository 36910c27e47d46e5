//! Table rendering for the REPL.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement,
    Table as UiTable, Width,
};

use lumi_engine::{Table, Value};

/// Renders a result table as a Unicode box table: bold yellow header,
/// left-aligned cells, columns capped at 40 characters. Multi-byte
/// characters are measured by display width.
pub fn render_table(table: &Table) -> String {
    let mut ui = UiTable::new();
    ui.load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    ui.set_header(table.schema().fields().iter().map(|field| {
        Cell::new(&field.name)
            .fg(Color::Yellow)
            .add_attribute(Attribute::Bold)
            .set_alignment(CellAlignment::Center)
    }));

    for row in table.rows() {
        ui.add_row(
            row.iter()
                .map(|value| Cell::new(render_cell(value)).set_alignment(CellAlignment::Left)),
        );
    }

    for column in ui.column_iter_mut() {
        column.set_constraint(ColumnConstraint::UpperBoundary(Width::Fixed(40)));
    }

    ui.to_string()
}

/// Null cells render as `(缺省)`; strings render unquoted, so the literal
/// string `null` shows as the word `null`.
fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => "(缺省)".to_string(),
        Value::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use lumi_engine::types::DataType;
    use lumi_engine::{Schema, Table};

    use super::*;

    #[test]
    fn test_render_cells() {
        assert_eq!(render_cell(&Value::Null), "(缺省)");
        assert_eq!(render_cell(&Value::string("null")), "null");
        assert_eq!(render_cell(&Value::string("Ada")), "Ada");
        assert_eq!(render_cell(&Value::Float(36.0)), "36");
        assert_eq!(render_cell(&Value::Float(1.25)), "1.25");
    }

    #[test]
    fn test_render_table_contains_headers_and_rows() {
        let schema = Schema::new(vec![
            lumi_engine::table::Field::new("name", DataType::Str),
            lumi_engine::table::Field::new("score", DataType::NullableFloat),
        ])
        .unwrap();
        let mut table = Table::new("t", schema);
        table
            .add_row(vec![Value::string("Ada"), Value::Null])
            .unwrap();

        let rendered = render_table(&table);
        assert!(rendered.contains("name"));
        assert!(rendered.contains("score"));
        assert!(rendered.contains("Ada"));
        assert!(rendered.contains("(缺省)"));
    }
}
