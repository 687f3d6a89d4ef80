use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Session, Transport};
use crate::compose::ResolvedEmail;
use crate::config::OAuthSettings;
use crate::MailbatchError;

const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMailRequest {
    message: GraphMessage,
    save_to_sent_items: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage {
    subject: String,
    body: GraphBody,
    to_recipients: Vec<GraphRecipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<GraphAttachment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphBody {
    content_type: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphRecipient {
    email_address: GraphAddress,
}

#[derive(Debug, Serialize)]
struct GraphAddress {
    address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphAttachment {
    #[serde(rename = "@odata.type")]
    odata_type: &'static str,
    name: String,
    content_type: String,
    content_bytes: String,
}

/// Microsoft 365 mail through the Graph `sendMail` endpoint, authenticated
/// with the OAuth client-credentials flow.
pub struct GraphTransport {
    settings: OAuthSettings,
    client: Client,
}

impl GraphTransport {
    pub fn new(settings: OAuthSettings) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MailbatchError::Connection {
                reason: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { settings, client })
    }

    fn token_url(&self) -> String {
        let authority = self
            .settings
            .authority_url
            .as_deref()
            .unwrap_or(DEFAULT_AUTHORITY_URL)
            .trim_end_matches('/');
        format!("{authority}/{}/oauth2/v2.0/token", self.settings.tenant_id)
    }

    fn send_mail_url(&self) -> String {
        let graph = self
            .settings
            .graph_url
            .as_deref()
            .unwrap_or(DEFAULT_GRAPH_URL)
            .trim_end_matches('/');
        format!(
            "{graph}/v1.0/users/{}/sendMail",
            self.settings.sender_email_address
        )
    }

    async fn acquire_token(&self) -> crate::Result<String> {
        let connect_err = |reason: String| MailbatchError::Connection { reason };
        let response = self
            .client
            .post(self.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| connect_err(format!("token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| connect_err(format!("token response unreadable: {e}")))?;
        if !status.is_success() {
            let reason = match serde_json::from_str::<TokenError>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {description}", err.error),
                    None => err.error,
                },
                Err(_) => body,
            };
            return Err(connect_err(format!(
                "failed to acquire token ({status}): {reason}"
            )));
        }
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| connect_err(format!("unexpected token response: {e}")))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl Transport for GraphTransport {
    async fn connect(&self) -> crate::Result<Box<dyn Session>> {
        let token = self.acquire_token().await?;
        tracing::info!(sender = %self.settings.sender_email_address, "Graph access token acquired");
        Ok(Box::new(GraphSession {
            client: self.client.clone(),
            url: self.send_mail_url(),
            token: Some(token),
        }))
    }
}

struct GraphSession {
    client: Client,
    url: String,
    token: Option<String>,
}

#[async_trait]
impl Session for GraphSession {
    async fn send(&mut self, email: &ResolvedEmail) -> crate::Result<()> {
        let row_index = email.source_row_index;
        let send_err = |reason: String| MailbatchError::Send { row_index, reason };
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| send_err("session already closed".to_string()))?;
        let request = build_send_mail_request(email).map_err(|e| send_err(e.to_string()))?;

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| send_err(format!("sendMail request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::ACCEPTED || status.is_success() {
            return Ok(());
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(send_err(format!("Graph API error ({status}): {body}")))
    }

    async fn close(&mut self) {
        self.token = None;
    }
}

/// Graph accepts a single body, so the HTML alternative wins when present.
fn build_send_mail_request(email: &ResolvedEmail) -> crate::Result<SendMailRequest> {
    let body = match &email.html_body {
        Some(html) => GraphBody {
            content_type: "HTML",
            content: html.clone(),
        },
        None => GraphBody {
            content_type: "Text",
            content: email.plaintext_body.clone(),
        },
    };
    let to_recipients = email
        .recipient_address
        .split(',')
        .map(str::trim)
        .map(|address| GraphRecipient {
            email_address: GraphAddress {
                address: address.to_string(),
            },
        })
        .collect();
    let attachments = email
        .attachments
        .iter()
        .map(|file| {
            let bytes = std::fs::read(&file.path).map_err(|source| MailbatchError::Io {
                path: file.path.clone(),
                source,
            })?;
            Ok(GraphAttachment {
                odata_type: "#microsoft.graph.fileAttachment",
                name: file.filename.clone(),
                content_type: mime_guess::from_path(&file.path)
                    .first_or_octet_stream()
                    .to_string(),
                content_bytes: general_purpose::STANDARD.encode(bytes),
            })
        })
        .collect::<crate::Result<Vec<_>>>()?;

    Ok(SendMailRequest {
        message: GraphMessage {
            subject: email.subject.clone(),
            body,
            to_recipients,
            attachments,
        },
        save_to_sent_items: true,
    })
}
