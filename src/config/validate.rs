use crate::config::types::{
    AttachmentSource, BodySource, ConfigMode, Configuration, ConnectionConfig, SubjectSource,
};
use crate::MailbatchError;

/// Structural checks that must pass before any row is processed.
pub fn validate_configuration(config: &Configuration) -> crate::Result<()> {
    validate_connection(config)?;

    require("recipient_email_address_column", &config.recipient_email_address_column)?;

    match &config.subject {
        SubjectSource::FromTable { column } => require("subject.column", column)?,
        SubjectSource::FromTemplateText { template } => require("subject.template", template)?,
    }

    let html = match &config.body {
        BodySource::FromTable {
            plaintext_column,
            html_column,
        } => {
            require("body.plaintext_column", plaintext_column)?;
            ("body.html_column", html_column)
        }
        BodySource::FromTemplateFile {
            plaintext_filename,
            html_filename,
        } => {
            require("body.plaintext_filename", plaintext_filename)?;
            ("body.html_filename", html_filename)
        }
        BodySource::FromTemplateText { plaintext, html } => {
            require("body.plaintext", plaintext)?;
            ("body.html", html)
        }
    };
    if config.use_html_template {
        let (key, value) = html;
        require(key, value.as_deref().unwrap_or(""))?;
    }

    if let Some(AttachmentSource::FromTable { column }) = &config.attachments {
        require("attachments.column", column)?;
    }

    if config.mode == ConfigMode::Basic {
        validate_basic_mode(config)?;
    }

    if config.overrides.address_whitelist.iter().any(|m| m.trim().is_empty()) {
        return Err(config_error("address_whitelist contains an empty mask"));
    }

    Ok(())
}

fn validate_connection(config: &Configuration) -> crate::Result<()> {
    let sender = config.connection.sender_address();
    require("connection.sender_email_address", sender)?;
    if sender.parse::<lettre::message::Mailbox>().is_err() {
        return Err(config_error(format!("invalid sender address '{sender}'")));
    }

    match &config.connection {
        ConnectionConfig::Smtp(smtp) => {
            require("connection.host", &smtp.host)?;
            if smtp.port == 0 {
                return Err(config_error("connection.port must be non-zero"));
            }
            let allowed = &config.overrides.allowed_hosts;
            if !allowed.is_empty()
                && !allowed
                    .iter()
                    .any(|h| h.host.eq_ignore_ascii_case(&smtp.host) && h.port == smtp.port)
            {
                return Err(config_error(format!(
                    "SMTP server {}:{} is not in the list of allowed hosts",
                    smtp.host, smtp.port
                )));
            }
        }
        ConnectionConfig::Oauth(oauth) => {
            require("connection.tenant_id", &oauth.tenant_id)?;
            require("connection.client_id", &oauth.client_id)?;
            require("connection.client_secret", &oauth.client_secret)?;
        }
    }
    Ok(())
}

fn validate_basic_mode(config: &Configuration) -> crate::Result<()> {
    if !matches!(config.subject, SubjectSource::FromTemplateText { .. }) {
        return Err(config_error("basic mode requires subject source from_template_text"));
    }
    if !matches!(config.body, BodySource::FromTemplateText { .. }) {
        return Err(config_error("basic mode requires body source from_template_text"));
    }
    if matches!(config.attachments, Some(AttachmentSource::FromTable { .. })) {
        return Err(config_error("basic mode only supports all_shared_files attachments"));
    }
    Ok(())
}

fn require(key: &str, value: &str) -> crate::Result<()> {
    if value.trim().is_empty() {
        return Err(config_error(format!("'{key}' must not be empty")));
    }
    Ok(())
}

fn config_error(reason: impl Into<String>) -> MailbatchError {
    MailbatchError::Config {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse::parse_configuration_str;

    fn make_config(extra: &str) -> Configuration {
        parse_configuration_str(&format!(
            "connection:\n  type: smtp\n  sender_email_address: me@example.com\n  host: mail.example.com\n  port: 465\n{extra}"
        ))
        .expect("fixture must parse")
    }

    const TEXT_SOURCES: &str = "subject:\n  source: from_template_text\n  template: Hi\n\
                                body:\n  source: from_template_text\n  plaintext: Hello\n";

    fn assert_config_error(config: &Configuration, needle: &str) {
        match validate_configuration(config) {
            Err(MailbatchError::Config { reason }) => {
                assert!(reason.contains(needle), "expected '{needle}' in: {reason}")
            }
            other => panic!("expected Config error containing '{needle}', got: {other:?}"),
        }
    }

    #[test]
    fn test_validate_valid_basic() {
        assert!(validate_configuration(&make_config(TEXT_SOURCES)).is_ok());
    }

    #[test]
    fn test_validate_empty_subject_template() {
        let c = make_config(
            "subject:\n  source: from_template_text\n  template: ''\n\
             body:\n  source: from_template_text\n  plaintext: Hello\n",
        );
        assert_config_error(&c, "subject.template");
    }

    #[test]
    fn test_validate_html_enabled_without_html_text() {
        let c = make_config(&format!("{TEXT_SOURCES}use_html_template: true\n"));
        assert_config_error(&c, "body.html");
    }

    #[test]
    fn test_validate_html_disabled_ignores_missing_html() {
        let c = make_config(&format!("{TEXT_SOURCES}use_html_template: false\n"));
        assert!(validate_configuration(&c).is_ok());
    }

    #[test]
    fn test_validate_basic_mode_rejects_table_subject() {
        let c = make_config(
            "subject:\n  source: from_table\n  column: subject\n\
             body:\n  source: from_template_text\n  plaintext: Hello\n",
        );
        assert_config_error(&c, "basic mode");
    }

    #[test]
    fn test_validate_basic_mode_rejects_table_attachments() {
        let c = make_config(&format!(
            "{TEXT_SOURCES}attachments:\n  source: from_table\n  column: files\n"
        ));
        assert_config_error(&c, "basic mode");
    }

    #[test]
    fn test_validate_advanced_mode_allows_table_sources() {
        let c = make_config(
            "mode: advanced\n\
             subject:\n  source: from_table\n  column: subject\n\
             body:\n  source: from_table\n  plaintext_column: body\n\
             attachments:\n  source: from_table\n  column: files\n",
        );
        assert!(validate_configuration(&c).is_ok());
    }

    #[test]
    fn test_validate_empty_attachment_column() {
        let c = make_config(
            "mode: advanced\n\
             subject:\n  source: from_template_text\n  template: Hi\n\
             body:\n  source: from_template_text\n  plaintext: Hello\n\
             attachments:\n  source: from_table\n  column: ' '\n",
        );
        assert_config_error(&c, "attachments.column");
    }

    #[test]
    fn test_validate_host_not_allowed() {
        let c = make_config(&format!(
            "{TEXT_SOURCES}overrides:\n  allowed_hosts:\n    - host: other.example.com\n      port: 465\n"
        ));
        assert_config_error(&c, "allowed hosts");
    }

    #[test]
    fn test_validate_host_allowed() {
        let c = make_config(&format!(
            "{TEXT_SOURCES}overrides:\n  allowed_hosts:\n    - host: MAIL.example.com\n      port: 465\n"
        ));
        assert!(validate_configuration(&c).is_ok());
    }

    #[test]
    fn test_validate_invalid_sender() {
        let c = parse_configuration_str(&format!(
            "connection:\n  type: smtp\n  sender_email_address: not-an-address\n{TEXT_SOURCES}"
        ))
        .unwrap();
        assert_config_error(&c, "invalid sender");
    }

    #[test]
    fn test_validate_oauth_missing_secret() {
        let c = parse_configuration_str(&format!(
            "connection:\n  type: oauth\n  sender_email_address: me@corp.com\n  tenant_id: t\n  client_id: c\n  client_secret: ''\n{TEXT_SOURCES}"
        ))
        .unwrap();
        assert_config_error(&c, "client_secret");
    }
}
