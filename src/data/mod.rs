pub mod csv;
pub mod files;
pub mod format;
pub mod json;
pub mod loader;

pub use csv::CsvOptions;
pub use files::FileCollection;
pub use format::{detect_format, DataFormat};
pub use loader::{load_table, load_table_csv};

use serde_json::{Map, Value};

/// One input row keyed by column name. Every column doubles as a placeholder.
pub type Row = Map<String, Value>;

/// The input table: column names in file order plus the rows in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Build a table from row objects, collecting columns in first-seen order.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read a cell as text. Non-string JSON scalars are rendered in their JSON form;
/// `null` reads as an empty string.
pub fn cell_text(row: &Row, column: &str) -> Option<String> {
    row.get(column).map(|v| match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

pub(crate) fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
