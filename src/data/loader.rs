use std::path::Path;

use crate::data::{
    csv::{load_csv, CsvOptions},
    format::{detect_format, DataFormat},
    json::load_json,
    Table,
};

/// Load the input table, dispatching on the file extension.
pub fn load_table(path: &Path) -> crate::Result<Table> {
    match detect_format(path)? {
        DataFormat::Json => load_json(path),
        DataFormat::Csv => load_csv(path, &CsvOptions::default()),
        DataFormat::Yaml => Err(crate::MailbatchError::UnsupportedFormat {
            extension: "yaml".to_string(),
        }),
        DataFormat::Toml => Err(crate::MailbatchError::UnsupportedFormat {
            extension: "toml".to_string(),
        }),
    }
}

pub fn load_table_csv(path: &Path, opts: &CsvOptions) -> crate::Result<Table> {
    load_csv(path, opts)
}
