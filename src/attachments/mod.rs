use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::{AttachmentSource, Configuration};
use crate::data::files::has_allowed_extension;
use crate::data::{cell_text, FileCollection, Row};
use crate::source::template_file_names;
use crate::MailbatchError;

/// One resolved attachment: the name it is sent under and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFile {
    pub filename: String,
    pub path: PathBuf,
}

enum Policy {
    None,
    Shared(Vec<AttachmentFile>),
    PerRow {
        column: String,
        templates: Vec<String>,
    },
}

/// Computes the attachment set for each recipient.
pub struct AttachmentResolver<'a> {
    files: &'a FileCollection,
    policy: Policy,
}

impl<'a> AttachmentResolver<'a> {
    pub fn new(config: &Configuration, files: &'a FileCollection) -> Self {
        let policy = if !config.attachments_enabled() {
            Policy::None
        } else {
            match &config.attachments {
                Some(AttachmentSource::FromTable { column }) => Policy::PerRow {
                    column: column.clone(),
                    templates: template_file_names(config)
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                },
                Some(AttachmentSource::AllSharedFiles) => {
                    Policy::Shared(shared_attachments(config, files))
                }
                None => Policy::None,
            }
        };
        Self { files, policy }
    }

    pub fn resolve(&self, row_index: usize, row: &Row) -> crate::Result<Vec<AttachmentFile>> {
        match &self.policy {
            Policy::None => Ok(Vec::new()),
            Policy::Shared(shared) => Ok(shared.clone()),
            Policy::PerRow { column, templates } => {
                let raw = cell_text(row, column).ok_or_else(|| MailbatchError::MissingColumn {
                    column: column.clone(),
                })?;
                parse_attachment_list(row_index, &raw)?
                    .into_iter()
                    .map(|filename| {
                        let path = attachable(self.files, templates.as_slice(), &filename)
                            .ok_or_else(|| MailbatchError::AttachmentNotFound {
                                row_index,
                                filename: filename.clone(),
                            })?;
                        Ok(AttachmentFile {
                            path: path.to_path_buf(),
                            filename,
                        })
                    })
                    .collect()
            }
        }
    }
}

/// Every input file except active template files and files outside the
/// extension allow-list, in file-name order.
pub fn shared_attachments(config: &Configuration, files: &FileCollection) -> Vec<AttachmentFile> {
    let templates = template_file_names(config);
    files
        .iter()
        .filter(|(name, _)| !templates.contains(name))
        .filter(|(name, _)| has_allowed_extension(name, &config.allowed_extensions))
        .map(|(name, path)| AttachmentFile {
            filename: name.to_string(),
            path: path.to_path_buf(),
        })
        .collect()
}

/// Look up a per-row attachment by name. Active template files are never
/// attachable, even when the row names them.
pub fn attachable<'f, S: AsRef<str>>(
    files: &'f FileCollection,
    templates: &[S],
    filename: &str,
) -> Option<&'f Path> {
    if templates.iter().any(|t| t.as_ref() == filename) {
        return None;
    }
    files.get(filename)
}

/// Parse a per-row attachment cell: a JSON array of file names. A blank cell
/// means no attachments.
pub fn parse_attachment_list(row_index: usize, raw: &str) -> crate::Result<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let format_err = |reason: String| MailbatchError::AttachmentFormat { row_index, reason };
    let value: Value = serde_json::from_str(raw).map_err(|e| format_err(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(format_err(format!("expected a JSON array, got '{raw}'")));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(format_err(format!("expected a file name, got {other}"))),
        })
        .collect()
}
