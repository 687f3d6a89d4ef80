use std::path::Path;

use serde::{Serialize, Serializer};

use crate::compose::ResolvedEmail;
use crate::MailbatchError;

/// Marker written in place of line breaks so every result stays on one CSV line.
pub const NEWLINE_MARKER: &str = "<newline>";

/// Per-row outcome as written to the results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Ok,
    Error,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
        }
    }
}

impl Serialize for ResultStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One ledger entry. Produced exactly once per processed input row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub source_row_index: usize,
    pub status: ResultStatus,
    pub recipient_email_address: String,
    pub sender_email_address: String,
    pub subject: String,
    pub plaintext_message_body: String,
    pub html_message_body: Option<String>,
    pub attachment_filenames: Vec<String>,
    pub error_message: Option<String>,
}

impl ResultRow {
    /// A composed email, sent (or dry-run) successfully when `error` is `None`.
    pub fn from_email(email: &ResolvedEmail, error: Option<&MailbatchError>) -> Self {
        Self {
            source_row_index: email.source_row_index,
            status: if error.is_some() {
                ResultStatus::Error
            } else {
                ResultStatus::Ok
            },
            recipient_email_address: email.recipient_address.clone(),
            sender_email_address: email.sender_address.clone(),
            subject: email.subject.clone(),
            plaintext_message_body: email.plaintext_body.clone(),
            html_message_body: email.html_body.clone(),
            attachment_filenames: email.attachment_filenames(),
            error_message: error.map(|e| e.to_string()),
        }
    }

    /// A row that failed before an email could be composed.
    pub fn compose_failed(
        source_row_index: usize,
        recipient: String,
        sender: String,
        error: &MailbatchError,
    ) -> Self {
        Self {
            source_row_index,
            status: ResultStatus::Error,
            recipient_email_address: recipient,
            sender_email_address: sender,
            subject: String::new(),
            plaintext_message_body: String::new(),
            html_message_body: None,
            attachment_filenames: Vec::new(),
            error_message: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResultStatus::Ok
    }
}

#[derive(Serialize)]
struct CsvRecord<'a> {
    status: ResultStatus,
    recipient_email_address: &'a str,
    sender_email_address: &'a str,
    subject: String,
    plaintext_message_body: String,
    html_message_body: String,
    attachment_filenames: String,
    error_message: String,
}

impl<'a> CsvRecord<'a> {
    fn new(row: &'a ResultRow) -> Self {
        Self {
            status: row.status,
            recipient_email_address: &row.recipient_email_address,
            sender_email_address: &row.sender_email_address,
            subject: escape_newlines(&row.subject),
            plaintext_message_body: escape_newlines(&row.plaintext_message_body),
            html_message_body: row
                .html_message_body
                .as_deref()
                .map(escape_newlines)
                .unwrap_or_default(),
            attachment_filenames: serde_json::Value::from(row.attachment_filenames.clone())
                .to_string(),
            error_message: row
                .error_message
                .as_deref()
                .map(escape_newlines)
                .unwrap_or_default(),
        }
    }
}

fn escape_newlines(text: &str) -> String {
    text.replace("\r\n", NEWLINE_MARKER)
        .replace('\n', NEWLINE_MARKER)
}

/// Ordered record of a run, one entry per processed row.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub rows: Vec<ResultRow>,
}

impl Ledger {
    pub fn push(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ResultRow> {
        self.rows.iter().filter(|r| !r.is_ok())
    }

    /// Write the `results` table. Line breaks inside bodies are replaced with
    /// [`NEWLINE_MARKER`]; attachment names are a JSON array.
    pub fn write_csv(&self, path: &Path) -> crate::Result<()> {
        let csv_err = |source: csv::Error| MailbatchError::CsvWrite {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
        for row in &self.rows {
            writer.serialize(CsvRecord::new(row)).map_err(csv_err)?;
        }
        if self.rows.is_empty() {
            writer.write_record(RESULT_COLUMNS).map_err(csv_err)?;
        }
        writer.flush().map_err(|source| MailbatchError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Header of the results table.
pub const RESULT_COLUMNS: [&str; 8] = [
    "status",
    "recipient_email_address",
    "sender_email_address",
    "subject",
    "plaintext_message_body",
    "html_message_body",
    "attachment_filenames",
    "error_message",
];
