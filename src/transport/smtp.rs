use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::{credentials::retrieve_credential, Session, Transport};
use crate::attachments::AttachmentFile;
use crate::compose::ResolvedEmail;
use crate::config::{Protocol, SmtpSettings};
use crate::MailbatchError;

/// Basic SMTP via lettre.
pub struct SmtpTransport {
    settings: SmtpSettings,
}

impl SmtpTransport {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    /// Login for the relay. The username defaults to the sender address and a
    /// missing password is looked up in the OS keychain; with neither, the
    /// relay is used without authentication.
    fn credentials(&self) -> Option<Credentials> {
        let username = self
            .settings
            .username
            .clone()
            .unwrap_or_else(|| self.settings.sender_email_address.clone());
        let password = match &self.settings.password {
            Some(password) => password.clone(),
            None => match retrieve_credential(&self.settings.sender_email_address) {
                Ok(password) => password,
                Err(e) => {
                    tracing::debug!("connecting without authentication: {e}");
                    return None;
                }
            },
        };
        Some(Credentials::new(username, password))
    }

    fn build_transport(&self) -> crate::Result<AsyncSmtpTransport<Tokio1Executor>> {
        let s = &self.settings;
        let connect_err = |e: SmtpError| MailbatchError::Connection {
            reason: e.to_string(),
        };
        let builder = match s.protocol {
            Protocol::Ssl => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&s.host).map_err(connect_err)?
            }
            Protocol::Tls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&s.host)
                .map_err(connect_err)?,
            Protocol::Unencrypted => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&s.host),
        };
        let builder = builder
            .port(s.port)
            .timeout(Some(Duration::from_secs(s.timeout_secs)));
        let builder = match self.credentials() {
            Some(creds) => builder.credentials(creds),
            None => builder,
        };
        Ok(builder.build())
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn connect(&self) -> crate::Result<Box<dyn Session>> {
        if let Some(proxy) = &self.settings.proxy {
            return Err(MailbatchError::Connection {
                reason: format!(
                    "SMTP through a proxy ({}:{}) is not supported",
                    proxy.host, proxy.port
                ),
            });
        }
        let transport = self.build_transport()?;
        let reachable = transport
            .test_connection()
            .await
            .map_err(|e| MailbatchError::Connection {
                reason: e.to_string(),
            })?;
        if !reachable {
            return Err(MailbatchError::Connection {
                reason: format!(
                    "{}:{} did not accept the connection",
                    self.settings.host, self.settings.port
                ),
            });
        }
        tracing::info!(host = %self.settings.host, port = self.settings.port, "SMTP connection open");
        Ok(Box::new(SmtpSession {
            transport: Some(transport),
        }))
    }
}

struct SmtpSession {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

#[async_trait]
impl Session for SmtpSession {
    async fn send(&mut self, email: &ResolvedEmail) -> crate::Result<()> {
        let row_index = email.source_row_index;
        let transport = self.transport.as_ref().ok_or_else(|| MailbatchError::Send {
            row_index,
            reason: "session already closed".to_string(),
        })?;
        let message = build_message(email).map_err(|e| match e {
            e @ MailbatchError::Send { .. } => e,
            other => MailbatchError::Send {
                row_index,
                reason: other.to_string(),
            },
        })?;
        transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| MailbatchError::Send {
                row_index,
                reason: e.to_string(),
            })
    }

    async fn close(&mut self) {
        // lettre closes pooled connections on drop.
        self.transport = None;
    }
}

/// Build a lettre [`Message`] from a [`ResolvedEmail`].
///
/// Produces `multipart/alternative` when `html_body` is present, plain text otherwise.
/// Attachments are wrapped in an outer `multipart/mixed`.
pub fn build_message(email: &ResolvedEmail) -> crate::Result<Message> {
    let row_index = email.source_row_index;
    let send_err = |reason: String| MailbatchError::Send { row_index, reason };

    let from_mbox = email
        .sender_address
        .parse::<Mailbox>()
        .map_err(|e| send_err(format!("invalid from address '{}': {e}", email.sender_address)))?;

    let mut builder = Message::builder().from(from_mbox).subject(&email.subject);
    for address in email.recipient_address.split(',').map(str::trim) {
        let mbox = address
            .parse::<Mailbox>()
            .map_err(|e| send_err(format!("invalid to address '{address}': {e}")))?;
        builder = builder.to(mbox);
    }

    let text = SinglePart::plain(email.plaintext_body.clone());
    let message = match (&email.html_body, email.attachments.is_empty()) {
        (None, true) => builder.body(email.plaintext_body.clone()),
        (Some(html), true) => builder.multipart(alternative(text, html)),
        (html, false) => {
            let mut mixed = match html {
                Some(html) => MultiPart::mixed().multipart(alternative(text, html)),
                None => MultiPart::mixed().singlepart(text),
            };
            for file in &email.attachments {
                mixed = mixed.singlepart(attachment_part(row_index, file)?);
            }
            builder.multipart(mixed)
        }
    };

    message.map_err(|e| send_err(format!("failed to build message: {e}")))
}

fn alternative(text: SinglePart, html: &str) -> MultiPart {
    MultiPart::alternative()
        .singlepart(text)
        .singlepart(SinglePart::html(html.to_string()))
}

fn attachment_part(row_index: usize, file: &AttachmentFile) -> crate::Result<SinglePart> {
    let bytes = std::fs::read(&file.path).map_err(|source| MailbatchError::Io {
        path: file.path.clone(),
        source,
    })?;
    let mime = mime_guess::from_path(&file.path).first_or_octet_stream();
    let content_type =
        ContentType::parse(mime.essence_str()).map_err(|e| MailbatchError::Send {
            row_index,
            reason: format!("unusable content type '{mime}' for '{}': {e}", file.filename),
        })?;
    Ok(Attachment::new(file.filename.clone()).body(bytes, content_type))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::ProxySettings;

    fn sample_email(to: &str) -> ResolvedEmail {
        ResolvedEmail {
            sender_address: "sender@example.com".to_string(),
            recipient_address: to.to_string(),
            subject: "Test Subject".to_string(),
            plaintext_body: "Hello".to_string(),
            html_body: Some("<p>Hello</p>".to_string()),
            attachments: vec![],
            source_row_index: 0,
        }
    }

    fn sample_settings() -> SmtpSettings {
        SmtpSettings {
            sender_email_address: "sender@example.com".to_string(),
            password: Some("secret".to_string()),
            username: None,
            host: "localhost".to_string(),
            port: 1025,
            protocol: Protocol::Unencrypted,
            proxy: None,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_build_message_headers() {
        let email = sample_email("recipient@example.com");
        let msg = build_message(&email).unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("recipient@example.com"), "missing To address");
        assert!(raw.contains("Subject: Test Subject"), "missing Subject");
        assert!(raw.contains("sender@example.com"), "missing From address");
    }

    #[test]
    fn test_build_message_multipart_html() {
        let msg = build_message(&sample_email("r@example.com")).unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(
            raw.contains("multipart/alternative"),
            "expected multipart/alternative"
        );
        assert!(raw.contains("<p>Hello</p>"), "missing html body");
    }

    #[test]
    fn test_build_message_plain_text_only() {
        let mut email = sample_email("r@example.com");
        email.html_body = None;
        let msg = build_message(&email).unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(
            !raw.contains("multipart/alternative"),
            "should not have html alternative"
        );
        assert!(raw.contains("Hello"), "missing body content");
    }

    #[test]
    fn test_build_message_multiple_recipients() {
        let msg = build_message(&sample_email("a@example.com, b@example.org")).unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("a@example.com"));
        assert!(raw.contains("b@example.org"));
    }

    #[test]
    fn test_build_message_attachment_content_type() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(b"%PDF-1.4").unwrap();
        let mut email = sample_email("r@example.com");
        email.attachments = vec![AttachmentFile {
            filename: "report.pdf".to_string(),
            path: tmp.path().to_path_buf(),
        }];
        let msg = build_message(&email).unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("report.pdf"));
    }

    #[test]
    fn test_build_message_unreadable_attachment() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);
        let mut email = sample_email("r@example.com");
        email.source_row_index = 7;
        email.attachments = vec![AttachmentFile {
            filename: "gone.txt".to_string(),
            path,
        }];
        assert!(matches!(
            build_message(&email),
            Err(MailbatchError::Io { .. })
        ));
    }

    #[test]
    fn test_build_message_invalid_recipient() {
        let err = build_message(&sample_email("not an address")).unwrap_err();
        assert!(matches!(err, MailbatchError::Send { row_index: 0, .. }));
    }

    #[tokio::test]
    async fn test_connect_rejects_proxy() {
        let mut settings = sample_settings();
        settings.proxy = Some(ProxySettings {
            host: "proxy.local".to_string(),
            port: 1080,
            username: None,
            password: None,
        });
        let transport = SmtpTransport::new(settings);
        let err = transport.connect().await.err().unwrap();
        assert!(matches!(err, MailbatchError::Connection { ref reason } if reason.contains("proxy")));
    }

    #[tokio::test]
    async fn test_connect_unreachable_host_is_connection_error() {
        let mut settings = sample_settings();
        settings.host = "127.0.0.1".to_string();
        settings.port = 1;
        settings.timeout_secs = 2;
        let transport = SmtpTransport::new(settings);
        assert!(matches!(
            transport.connect().await,
            Err(MailbatchError::Connection { .. })
        ));
    }
}
