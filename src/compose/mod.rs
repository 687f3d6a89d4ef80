use crate::attachments::{AttachmentFile, AttachmentResolver};
use crate::config::{AddressWhitelist, Configuration};
use crate::data::{cell_text, FileCollection, Row};
use crate::source::{Field, SourceResolver};
use crate::template::TemplateRenderer;
use crate::MailbatchError;

/// The fully resolved output for one input row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEmail {
    pub sender_address: String,
    pub recipient_address: String,
    pub subject: String,
    /// Always present.
    pub plaintext_body: String,
    /// `None` when the HTML alternative is disabled.
    pub html_body: Option<String>,
    pub attachments: Vec<AttachmentFile>,
    pub source_row_index: usize,
}

impl ResolvedEmail {
    pub fn attachment_filenames(&self) -> Vec<String> {
        self.attachments.iter().map(|a| a.filename.clone()).collect()
    }
}

/// Turns input rows into [`ResolvedEmail`]s. Built once per run.
pub struct EmailComposer<'a> {
    config: &'a Configuration,
    sources: SourceResolver<'a>,
    attachments: AttachmentResolver<'a>,
    renderer: TemplateRenderer,
    whitelist: AddressWhitelist,
}

impl<'a> EmailComposer<'a> {
    /// Fails on run-level problems only: unreadable template files or a bad
    /// address mask.
    pub fn new(config: &'a Configuration, files: &'a FileCollection) -> crate::Result<Self> {
        Ok(Self {
            config,
            sources: SourceResolver::new(config, files)?,
            attachments: AttachmentResolver::new(config, files),
            renderer: TemplateRenderer::new(),
            whitelist: AddressWhitelist::new(&config.overrides.address_whitelist)?,
        })
    }

    pub fn sender_address(&self) -> &str {
        self.config.connection.sender_address()
    }

    /// The recipient cell of `row` as-is, for reporting rows that fail to compose.
    pub fn raw_recipient(&self, row: &Row) -> String {
        cell_text(row, &self.config.recipient_email_address_column).unwrap_or_default()
    }

    /// Compose one row. Any failure is wrapped in [`MailbatchError::Recipient`]
    /// carrying the row index; nothing is partially produced.
    pub fn compose(&self, row_index: usize, row: &Row) -> crate::Result<ResolvedEmail> {
        self.compose_inner(row_index, row)
            .map_err(|source| MailbatchError::Recipient {
                row_index,
                source: Box::new(source),
            })
    }

    fn compose_inner(&self, row_index: usize, row: &Row) -> crate::Result<ResolvedEmail> {
        let recipient_address = self.recipient(row)?;

        let subject = self.render_field(Field::Subject, row)?.unwrap_or_default();
        let plaintext_body = self
            .render_field(Field::PlaintextBody, row)?
            .unwrap_or_default();
        let html_body = self.render_field(Field::HtmlBody, row)?;
        let attachments = self.attachments.resolve(row_index, row)?;

        Ok(ResolvedEmail {
            sender_address: self.sender_address().to_string(),
            recipient_address,
            subject,
            plaintext_body,
            html_body,
            attachments,
            source_row_index: row_index,
        })
    }

    fn render_field(&self, field: Field, row: &Row) -> crate::Result<Option<String>> {
        self.sources
            .template_for(field, row)?
            .map(|template| self.renderer.render(field.as_str(), &template, row))
            .transpose()
    }

    fn recipient(&self, row: &Row) -> crate::Result<String> {
        let column = &self.config.recipient_email_address_column;
        let value = cell_text(row, column).ok_or_else(|| MailbatchError::MissingColumn {
            column: column.clone(),
        })?;
        let value = value.trim();
        let well_formed = value.split(',').map(str::trim).all(|address| {
            address.contains('@') && !address.chars().any(char::is_whitespace)
        });
        if value.is_empty() || !well_formed {
            return Err(MailbatchError::InvalidRecipient {
                value: value.to_string(),
            });
        }
        self.whitelist.check(value)?;
        Ok(value.to_string())
    }
}
