//! Outbound mail transports.
//!
//! A [`Transport`] is built from the connection settings and opens one
//! [`Session`] per run. The dispatch loop only ever sees these two traits.

mod credentials;
mod graph;
mod memory;
mod smtp;

use async_trait::async_trait;

use crate::compose::ResolvedEmail;
use crate::config::ConnectionConfig;

pub use credentials::{delete_credential, retrieve_credential, store_credential, KEYRING_SERVICE};
pub use graph::GraphTransport;
pub use memory::{MemoryTransport, SentEmail};
pub use smtp::{build_message, SmtpTransport};

/// Opens sessions against a mail service.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session, failing with [`crate::MailbatchError::Connection`]
    /// when the service is unreachable or rejects the credentials.
    async fn connect(&self) -> crate::Result<Box<dyn Session>>;
}

/// An open connection, held for the duration of a run.
#[async_trait]
pub trait Session: Send {
    /// Send one email. Failures are [`crate::MailbatchError::Send`].
    async fn send(&mut self, email: &ResolvedEmail) -> crate::Result<()>;

    /// Release the connection. Never fails.
    async fn close(&mut self);
}

/// Build the transport named by the configuration.
pub fn from_config(connection: &ConnectionConfig) -> crate::Result<Box<dyn Transport>> {
    match connection {
        ConnectionConfig::Smtp(settings) => Ok(Box::new(SmtpTransport::new(settings.clone()))),
        ConnectionConfig::Oauth(settings) => Ok(Box::new(GraphTransport::new(settings.clone())?)),
    }
}
