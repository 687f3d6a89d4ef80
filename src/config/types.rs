use serde::{Deserialize, Serialize};

fn default_recipient_column() -> String {
    "recipient_email_address".to_string()
}

fn default_attachments() -> Option<AttachmentSource> {
    Some(AttachmentSource::AllSharedFiles)
}

fn default_true() -> bool {
    true
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigMode {
    #[default]
    Basic,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SubjectSource {
    FromTable { column: String },
    FromTemplateText { template: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum BodySource {
    FromTable {
        plaintext_column: String,
        #[serde(default)]
        html_column: Option<String>,
    },
    FromTemplateFile {
        plaintext_filename: String,
        #[serde(default)]
        html_filename: Option<String>,
    },
    FromTemplateText {
        plaintext: String,
        #[serde(default)]
        html: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AttachmentSource {
    FromTable { column: String },
    AllSharedFiles,
}

/// Encryption mode for an SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Implicit TLS from the first byte (usually port 465).
    #[default]
    #[serde(alias = "SSL")]
    Ssl,
    /// Plain connection upgraded with STARTTLS (usually port 587).
    #[serde(alias = "TLS")]
    Tls,
    #[serde(alias = "UNENCRYPTED")]
    Unencrypted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub sender_email_address: String,
    /// Looked up in the OS keychain under the sender address when absent.
    #[serde(default)]
    pub password: Option<String>,
    /// Login name; defaults to the sender address.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub proxy: Option<ProxySettings>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthSettings {
    pub sender_email_address: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub authority_url: Option<String>,
    #[serde(default)]
    pub graph_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionConfig {
    Smtp(SmtpSettings),
    Oauth(OAuthSettings),
}

impl ConnectionConfig {
    pub fn sender_address(&self) -> &str {
        match self {
            Self::Smtp(s) => &s.sender_email_address,
            Self::Oauth(o) => &o.sender_email_address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedHost {
    pub host: String,
    pub port: u16,
}

/// Operator-level restrictions layered over the user configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(default)]
    pub allowed_hosts: Vec<AllowedHost>,
    /// Recipient masks; `*` matches any run of characters.
    #[serde(default)]
    pub address_whitelist: Vec<String>,
    #[serde(default)]
    pub disable_attachments: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub mode: ConfigMode,
    #[serde(default = "default_recipient_column")]
    pub recipient_email_address_column: String,
    pub subject: SubjectSource,
    pub body: BodySource,
    #[serde(default)]
    pub use_html_template: bool,
    /// `None` (an explicit `null`) sends no attachments at all.
    #[serde(default = "default_attachments")]
    pub attachments: Option<AttachmentSource>,
    /// Extensions eligible for shared attachments; empty allows every file.
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_true")]
    pub continue_on_error: bool,
    #[serde(default)]
    pub overrides: Overrides,
}

impl Configuration {
    pub fn attachments_enabled(&self) -> bool {
        self.attachments.is_some() && !self.overrides.disable_attachments
    }
}
