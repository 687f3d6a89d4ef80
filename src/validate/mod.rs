//! Pre-flight checks. Nothing here sends mail or mutates input, and no check
//! returns `Err`: every problem becomes a [`ValidationIssue`] in the report.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::attachments::{attachable, parse_attachment_list, shared_attachments};
use crate::config::{validate_configuration, AttachmentSource, Configuration};
use crate::data::{cell_text, FileCollection, Table};
use crate::source::{
    load_template_file, template_file_names, template_origin, Field, TemplateOrigin,
};
use crate::template::{check_syntax, extract_placeholder_names};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Ok,
    Error,
}

/// One problem found by a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// A template refers to a name that is not a column of the input table.
    UndeclaredPlaceholder { field: String, name: String },
    /// A column named by the configuration is absent from the input table.
    MissingColumn { column: String },
    /// A template does not parse.
    TemplateSyntax { field: String, reason: String },
    /// A template file could not be found or read.
    TemplateUnavailable { field: String, reason: String },
    /// A per-row attachment cell is not a JSON array of file names.
    AttachmentFormat { row_index: usize, reason: String },
    /// A file named by some row is absent from the input files.
    MissingAttachment { filename: String },
    Connection { reason: String },
    Config { reason: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndeclaredPlaceholder { name, .. } => write!(f, "missing placeholder '{name}'"),
            Self::MissingColumn { column } => write!(f, "missing column '{column}'"),
            Self::TemplateSyntax { field, reason } => {
                write!(f, "invalid {field} template: {reason}")
            }
            Self::TemplateUnavailable { reason, .. } => f.write_str(reason),
            Self::AttachmentFormat { row_index, reason } => {
                write!(f, "row {row_index}: bad attachment list: {reason}")
            }
            Self::MissingAttachment { filename } => write!(f, "missing attachment '{filename}'"),
            Self::Connection { reason } => f.write_str(reason),
            Self::Config { reason } => f.write_str(reason),
        }
    }
}

/// Outcome of a single named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub check: String,
    pub status: CheckStatus,
    /// One-line human summary, prefixed `OK - ` or `ERROR - `.
    pub detail: String,
    pub issues: Vec<ValidationIssue>,
}

impl CheckResult {
    fn ok(check: &str, detail: impl Into<String>) -> Self {
        Self {
            check: check.to_string(),
            status: CheckStatus::Ok,
            detail: detail.into(),
            issues: Vec::new(),
        }
    }

    /// `ok_detail` when `issues` is empty, an `ERROR` listing them otherwise.
    fn from_issues(check: &str, ok_detail: &str, issues: Vec<ValidationIssue>) -> Self {
        if issues.is_empty() {
            return Self::ok(check, ok_detail);
        }
        let listed: Vec<String> = issues.iter().map(ToString::to_string).collect();
        Self {
            check: check.to_string(),
            status: CheckStatus::Error,
            detail: format!("ERROR - {}", listed.join("; ")),
            issues,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == CheckStatus::Ok
    }
}

/// Results of the aggregate check, in the order they ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<CheckResult>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.checks.iter().all(CheckResult::is_ok)
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.is_ok())
    }

    /// Verdict line followed by each check's detail.
    pub fn summary(&self) -> String {
        let verdict = if self.is_valid() {
            "OK - Config Valid!"
        } else {
            "ERROR - Config Invalid!"
        };
        std::iter::once(verdict.to_string())
            .chain(self.checks.iter().map(|c| c.detail.clone()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Open and immediately close a transport session.
pub async fn check_connection(transport: &dyn Transport) -> CheckResult {
    match transport.connect().await {
        Ok(mut session) => {
            session.close().await;
            CheckResult::ok("connection", "OK - Connection established!")
        }
        Err(e) => {
            let reason = e.to_string();
            CheckResult {
                check: "connection".to_string(),
                status: CheckStatus::Error,
                detail: format!("ERROR - Could not establish connection! - {reason}"),
                issues: vec![ValidationIssue::Connection { reason }],
            }
        }
    }
}

/// Check that every placeholder of `field`'s template(s) is a column of `table`.
///
/// Table-sourced templates are checked row by row; the undeclared names are
/// reported sorted and deduplicated, so the result does not depend on row order.
pub fn check_placeholders(
    config: &Configuration,
    table: &Table,
    files: &FileCollection,
    field: Field,
) -> CheckResult {
    let check = field.as_str();
    let ok_detail = match field {
        Field::Subject => "OK - All subject placeholders are present in the input table",
        _ => "OK - All template placeholders are present in the input table",
    };
    let Some(origin) = template_origin(config, field) else {
        return CheckResult::ok(check, format!("OK - {check} is not used"));
    };

    let templates: Vec<String> = match origin {
        TemplateOrigin::Column(column) => {
            if !table.has_column(column) {
                return CheckResult::from_issues(
                    check,
                    ok_detail,
                    vec![ValidationIssue::MissingColumn {
                        column: column.to_string(),
                    }],
                );
            }
            table
                .rows
                .iter()
                .filter_map(|row| cell_text(row, column))
                .collect()
        }
        TemplateOrigin::File(name) => match load_template_file(files, name) {
            Ok(text) => vec![text],
            Err(e) => {
                return CheckResult::from_issues(
                    check,
                    ok_detail,
                    vec![ValidationIssue::TemplateUnavailable {
                        field: check.to_string(),
                        reason: e.to_string(),
                    }],
                );
            }
        },
        TemplateOrigin::Text(text) => vec![text.to_string()],
    };

    let mut syntax_errors = BTreeSet::new();
    let mut placeholders = BTreeSet::new();
    for template in &templates {
        match check_syntax(check, template) {
            Ok(()) => placeholders.extend(extract_placeholder_names(template)),
            Err(e) => {
                syntax_errors.insert(e.to_string());
            }
        }
    }

    let mut issues: Vec<ValidationIssue> = syntax_errors
        .into_iter()
        .map(|reason| ValidationIssue::TemplateSyntax {
            field: check.to_string(),
            reason,
        })
        .collect();
    issues.extend(
        placeholders
            .into_iter()
            .filter(|name| !table.has_column(name))
            .map(|name| ValidationIssue::UndeclaredPlaceholder {
                field: check.to_string(),
                name,
            }),
    );
    CheckResult::from_issues(check, ok_detail, issues)
}

pub fn check_subject(config: &Configuration, table: &Table, files: &FileCollection) -> CheckResult {
    check_placeholders(config, table, files, Field::Subject)
}

pub fn check_plaintext_template(
    config: &Configuration,
    table: &Table,
    files: &FileCollection,
) -> CheckResult {
    check_placeholders(config, table, files, Field::PlaintextBody)
}

pub fn check_html_template(
    config: &Configuration,
    table: &Table,
    files: &FileCollection,
) -> CheckResult {
    check_placeholders(config, table, files, Field::HtmlBody)
}

/// Check every row's attachment list, or that the shared set is non-empty.
/// Missing files are reported once each, across all rows.
pub fn check_attachments(
    config: &Configuration,
    table: &Table,
    files: &FileCollection,
) -> CheckResult {
    const CHECK: &str = "attachments";
    const OK_DETAIL: &str = "OK - All attachments are present";

    if !config.attachments_enabled() {
        return CheckResult::ok(CHECK, "OK - Attachments are disabled");
    }
    let column = match &config.attachments {
        Some(AttachmentSource::FromTable { column }) => column,
        _ => {
            let detail = if shared_attachments(config, files).is_empty() {
                "OK - No input files to attach"
            } else {
                OK_DETAIL
            };
            return CheckResult::ok(CHECK, detail);
        }
    };
    if !table.has_column(column) {
        return CheckResult::from_issues(
            CHECK,
            OK_DETAIL,
            vec![ValidationIssue::MissingColumn {
                column: column.clone(),
            }],
        );
    }

    let templates = template_file_names(config);
    let mut issues = Vec::new();
    let mut missing = BTreeSet::new();
    for (row_index, row) in table.rows.iter().enumerate() {
        let raw = cell_text(row, column).unwrap_or_default();
        match parse_attachment_list(row_index, &raw) {
            Ok(names) => missing.extend(
                names
                    .into_iter()
                    .filter(|n| attachable(files, templates.as_slice(), n).is_none()),
            ),
            Err(e) => issues.push(ValidationIssue::AttachmentFormat {
                row_index,
                reason: e.to_string(),
            }),
        }
    }
    issues.extend(
        missing
            .into_iter()
            .map(|filename| ValidationIssue::MissingAttachment { filename }),
    );
    CheckResult::from_issues(CHECK, OK_DETAIL, issues)
}

/// Run every check and collect the results. The connection check is skipped
/// when the configuration itself is invalid.
pub async fn validate_config(
    config: &Configuration,
    table: &Table,
    files: &FileCollection,
    transport: Option<&dyn Transport>,
) -> ValidationReport {
    let mut checks = Vec::with_capacity(6);
    match validate_configuration(config) {
        Ok(()) => checks.push(CheckResult::ok(
            "configuration",
            "OK - Connection configuration is valid",
        )),
        Err(e) => checks.push(CheckResult::from_issues(
            "configuration",
            "",
            vec![ValidationIssue::Config {
                reason: e.to_string(),
            }],
        )),
    }
    if let (true, Some(transport)) = (checks[0].is_ok(), transport) {
        checks.push(check_connection(transport).await);
    }
    checks.push(check_subject(config, table, files));
    checks.push(check_plaintext_template(config, table, files));
    checks.push(check_html_template(config, table, files));
    checks.push(check_attachments(config, table, files));

    let report = ValidationReport { checks };
    for failed in report.failed_checks() {
        tracing::warn!(check = %failed.check, "{}", failed.detail);
    }
    report
}
