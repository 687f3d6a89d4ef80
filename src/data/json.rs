use std::path::Path;

use serde_json::Value;

use crate::data::{value_type_name, Row, Table};

/// Load a JSON table: an array of objects, or a single object as a one-row table.
pub fn load_json(path: &Path) -> crate::Result<Table> {
    let content = std::fs::read_to_string(path).map_err(|source| crate::MailbatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value =
        serde_json::from_str(&content).map_err(|source| crate::MailbatchError::JsonParse {
            path: path.to_path_buf(),
            source,
        })?;
    into_table(path, value)
}

fn into_table(path: &Path, value: Value) -> crate::Result<Table> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => return Ok(Table::from_rows(vec![map])),
        other => {
            return Err(shape_error(
                path,
                format!(
                    "expected array or object at root, got {}",
                    value_type_name(&other)
                ),
            ))
        }
    };

    let rows = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map),
            other => Err(shape_error(
                path,
                format!("row {i} must be an object, got {}", value_type_name(&other)),
            )),
        })
        .collect::<crate::Result<Vec<Row>>>()?;
    Ok(Table::from_rows(rows))
}

fn shape_error(path: &Path, message: String) -> crate::MailbatchError {
    crate::MailbatchError::InvalidDataShape {
        path: path.to_path_buf(),
        message,
    }
}
