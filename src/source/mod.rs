use std::collections::HashMap;

use crate::config::{BodySource, Configuration, SubjectSource};
use crate::data::{cell_text, FileCollection, Row};
use crate::MailbatchError;

/// The templated fields of an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Subject,
    PlaintextBody,
    HtmlBody,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::PlaintextBody => "plaintext_body",
            Self::HtmlBody => "html_body",
        }
    }
}

/// Where a field's template comes from, borrowed from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateOrigin<'a> {
    Column(&'a str),
    File(&'a str),
    Text(&'a str),
}

/// The active origin for `field`, or `None` when the field is not produced
/// (the HTML body with HTML disabled).
pub fn template_origin(config: &Configuration, field: Field) -> Option<TemplateOrigin<'_>> {
    match field {
        Field::Subject => Some(match &config.subject {
            SubjectSource::FromTable { column } => TemplateOrigin::Column(column),
            SubjectSource::FromTemplateText { template } => TemplateOrigin::Text(template),
        }),
        Field::PlaintextBody => Some(match &config.body {
            BodySource::FromTable {
                plaintext_column, ..
            } => TemplateOrigin::Column(plaintext_column),
            BodySource::FromTemplateFile {
                plaintext_filename,
                ..
            } => TemplateOrigin::File(plaintext_filename),
            BodySource::FromTemplateText { plaintext, .. } => TemplateOrigin::Text(plaintext),
        }),
        Field::HtmlBody => {
            if !config.use_html_template {
                return None;
            }
            match &config.body {
                BodySource::FromTable { html_column, .. } => {
                    html_column.as_deref().map(TemplateOrigin::Column)
                }
                BodySource::FromTemplateFile { html_filename, .. } => {
                    html_filename.as_deref().map(TemplateOrigin::File)
                }
                BodySource::FromTemplateText { html, .. } => {
                    html.as_deref().map(TemplateOrigin::Text)
                }
            }
        }
    }
}

/// Names of the template files consumed by the active body source. These are
/// never sent as attachments.
pub fn template_file_names(config: &Configuration) -> Vec<&str> {
    [Field::PlaintextBody, Field::HtmlBody]
        .into_iter()
        .filter_map(|f| match template_origin(config, f) {
            Some(TemplateOrigin::File(name)) => Some(name),
            _ => None,
        })
        .collect()
}

/// Read a template file from the input file collection.
pub fn load_template_file(files: &FileCollection, filename: &str) -> crate::Result<String> {
    let path = files
        .get(filename)
        .ok_or_else(|| MailbatchError::TemplateFileNotFound {
            filename: filename.to_string(),
        })?;
    std::fs::read_to_string(path).map_err(|source| MailbatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Produces the per-row template string for each field.
///
/// Template files are read once, when the resolver is built, and reused for
/// every row.
pub struct SourceResolver<'a> {
    config: &'a Configuration,
    file_templates: HashMap<Field, String>,
}

impl<'a> SourceResolver<'a> {
    pub fn new(config: &'a Configuration, files: &FileCollection) -> crate::Result<Self> {
        let mut file_templates = HashMap::new();
        for field in [Field::Subject, Field::PlaintextBody, Field::HtmlBody] {
            if let Some(TemplateOrigin::File(name)) = template_origin(config, field) {
                file_templates.insert(field, load_template_file(files, name)?);
                tracing::debug!(field = field.as_str(), file = name, "loaded template file");
            }
        }
        Ok(Self {
            config,
            file_templates,
        })
    }

    /// The template for `field` in `row`; `Ok(None)` when the field is disabled.
    pub fn template_for(&self, field: Field, row: &Row) -> crate::Result<Option<String>> {
        let Some(origin) = template_origin(self.config, field) else {
            return Ok(None);
        };
        let template = match origin {
            TemplateOrigin::Column(column) => {
                cell_text(row, column).ok_or_else(|| MailbatchError::MissingColumn {
                    column: column.to_string(),
                })?
            }
            TemplateOrigin::File(name) => self
                .file_templates
                .get(&field)
                .cloned()
                .ok_or_else(|| MailbatchError::TemplateFileNotFound {
                    filename: name.to_string(),
                })?,
            TemplateOrigin::Text(text) => text.to_string(),
        };
        Ok(Some(template))
    }
}
