//! In-memory transport that records instead of sending.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Session, Transport};
use crate::compose::ResolvedEmail;
use crate::MailbatchError;

/// One email accepted by a [`MemoryTransport`] session.
#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub recipient_address: String,
    pub subject: String,
    pub source_row_index: usize,
    pub attachment_filenames: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    sent: Vec<SentEmail>,
    connects: usize,
    closes: usize,
}

/// Records every send. Clones share the same record.
///
/// Sends for rows listed with [`MemoryTransport::failing_rows`] fail with a
/// send error, and [`MemoryTransport::unreachable`] fails every connect.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<State>>,
    failing_rows: BTreeSet<usize>,
    unreachable: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_rows(mut self, rows: impl IntoIterator<Item = usize>) -> Self {
        self.failing_rows.extend(rows);
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.lock().sent.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> crate::Result<Box<dyn Session>> {
        if self.unreachable {
            return Err(MailbatchError::Connection {
                reason: "memory transport is unreachable".to_string(),
            });
        }
        self.lock().connects += 1;
        Ok(Box::new(MemorySession {
            transport: self.clone(),
        }))
    }
}

struct MemorySession {
    transport: MemoryTransport,
}

#[async_trait]
impl Session for MemorySession {
    async fn send(&mut self, email: &ResolvedEmail) -> crate::Result<()> {
        if self.transport.failing_rows.contains(&email.source_row_index) {
            return Err(MailbatchError::Send {
                row_index: email.source_row_index,
                reason: "rejected by memory transport".to_string(),
            });
        }
        self.transport.lock().sent.push(SentEmail {
            recipient_address: email.recipient_address.clone(),
            subject: email.subject.clone(),
            source_row_index: email.source_row_index,
            attachment_filenames: email.attachment_filenames(),
        });
        Ok(())
    }

    async fn close(&mut self) {
        self.transport.lock().closes += 1;
    }
}
