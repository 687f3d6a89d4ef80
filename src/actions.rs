//! Synchronous actions: single pre-flight checks invocable on their own.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::config::Configuration;
use crate::data::{FileCollection, Table};
use crate::transport::Transport;
use crate::validate::{self, CheckResult, CheckStatus};
use crate::MailbatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    TestConnection,
    ValidateSubject,
    ValidatePlaintextTemplate,
    ValidateHtmlTemplate,
    ValidateAttachments,
    ValidateConfig,
}

impl SyncAction {
    pub const ALL: [SyncAction; 6] = [
        Self::TestConnection,
        Self::ValidateSubject,
        Self::ValidatePlaintextTemplate,
        Self::ValidateHtmlTemplate,
        Self::ValidateAttachments,
        Self::ValidateConfig,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TestConnection => "test_connection",
            Self::ValidateSubject => "validate_subject",
            Self::ValidatePlaintextTemplate => "validate_plaintext_template",
            Self::ValidateHtmlTemplate => "validate_html_template",
            Self::ValidateAttachments => "validate_attachments",
            Self::ValidateConfig => "validate_config",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = MailbatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // `test_smtp_server_connection` is accepted for older configurations.
        let name = match s {
            "test_smtp_server_connection" => "test_connection",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == name)
            .ok_or_else(|| MailbatchError::Config {
                reason: format!(
                    "unknown action '{s}', expected one of: {}",
                    Self::ALL.map(|a| a.as_str()).join(", ")
                ),
            })
    }
}

/// Structured action result, printed as JSON by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    pub action: String,
    pub status: CheckStatus,
    pub message: String,
    pub checks: Vec<CheckResult>,
}

impl ActionReport {
    fn single(action: SyncAction, check: CheckResult) -> Self {
        Self {
            action: action.to_string(),
            status: check.status,
            message: check.detail.clone(),
            checks: vec![check],
        }
    }
}

/// Run `action`. Never sends mail and never fails: problems are reported.
pub async fn run_action(
    action: SyncAction,
    config: &Configuration,
    table: &Table,
    files: &FileCollection,
    transport: &dyn Transport,
) -> ActionReport {
    tracing::debug!(%action, "running action");
    match action {
        SyncAction::TestConnection => {
            ActionReport::single(action, validate::check_connection(transport).await)
        }
        SyncAction::ValidateSubject => {
            ActionReport::single(action, validate::check_subject(config, table, files))
        }
        SyncAction::ValidatePlaintextTemplate => ActionReport::single(
            action,
            validate::check_plaintext_template(config, table, files),
        ),
        SyncAction::ValidateHtmlTemplate => {
            ActionReport::single(action, validate::check_html_template(config, table, files))
        }
        SyncAction::ValidateAttachments => {
            ActionReport::single(action, validate::check_attachments(config, table, files))
        }
        SyncAction::ValidateConfig => {
            let report = validate::validate_config(config, table, files, Some(transport)).await;
            ActionReport {
                action: action.to_string(),
                status: if report.is_valid() {
                    CheckStatus::Ok
                } else {
                    CheckStatus::Error
                },
                message: report.summary(),
                checks: report.checks,
            }
        }
    }
}
