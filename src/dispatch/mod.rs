//! The sequential send loop and its ledger.

pub mod ledger;

pub use ledger::{Ledger, ResultRow, ResultStatus, NEWLINE_MARKER, RESULT_COLUMNS};

use crate::compose::EmailComposer;
use crate::config::Configuration;
use crate::data::Row;
use crate::transport::{Session, Transport};
use crate::MailbatchError;

/// Why a run stopped before the last row.
#[derive(Debug)]
pub struct Abort {
    pub row_index: usize,
    pub error: MailbatchError,
}

/// The ledger of every processed row plus the abort, if the run stopped early.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub ledger: Ledger,
    pub abort: Option<Abort>,
}

impl DispatchOutcome {
    pub fn is_aborted(&self) -> bool {
        self.abort.is_some()
    }

    /// The ledger, or the error that aborted the run.
    pub fn into_result(self) -> crate::Result<Ledger> {
        match self.abort {
            Some(abort) => Err(abort.error),
            None => Ok(self.ledger),
        }
    }
}

/// Compose and send every row in input order.
///
/// The session is opened once before the first row (never in dry-run) and
/// closed after the last processed row. A failed connect is recorded as an
/// `ERROR` on every row that composes, so the ledger still has one entry per
/// processed row. With `continue_on_error` off the first `ERROR` ends the run.
pub async fn dispatch(
    config: &Configuration,
    composer: &EmailComposer<'_>,
    transport: &dyn Transport,
    rows: &[Row],
) -> DispatchOutcome {
    let mut session: Result<Option<Box<dyn Session>>, String> = if config.dry_run {
        tracing::info!(rows = rows.len(), "dry run, nothing will be sent");
        Ok(None)
    } else {
        match transport.connect().await {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::error!("could not open transport session: {e}");
                Err(e.to_string())
            }
        }
    };

    let mut ledger = Ledger::default();
    let mut abort = None;

    for (row_index, row) in rows.iter().enumerate() {
        let (result, error) = match composer.compose(row_index, row) {
            Err(e) => (
                ResultRow::compose_failed(
                    row_index,
                    composer.raw_recipient(row),
                    composer.sender_address().to_string(),
                    &e,
                ),
                Some(e),
            ),
            Ok(email) => {
                let sent = match &mut session {
                    Ok(Some(s)) => s.send(&email).await,
                    Ok(None) => Ok(()),
                    Err(reason) => Err(MailbatchError::Connection {
                        reason: reason.clone(),
                    }),
                };
                let error = sent.err();
                (ResultRow::from_email(&email, error.as_ref()), error)
            }
        };

        match &error {
            None => tracing::info!(
                row = row_index,
                recipient = %result.recipient_email_address,
                dry_run = config.dry_run,
                "OK"
            ),
            Some(e) => tracing::warn!(
                row = row_index,
                recipient = %result.recipient_email_address,
                "ERROR: {e}"
            ),
        }
        ledger.push(result);

        if let Some(error) = error {
            if !config.continue_on_error {
                tracing::warn!(row = row_index, "stopping at first failure");
                abort = Some(Abort { row_index, error });
                break;
            }
        }
    }

    if let Ok(Some(s)) = &mut session {
        s.close().await;
    }

    tracing::info!(
        succeeded = ledger.success_count(),
        failed = ledger.failure_count(),
        "dispatch finished"
    );
    DispatchOutcome { ledger, abort }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::parse_configuration_str;
    use crate::data::FileCollection;
    use crate::transport::MemoryTransport;

    fn make_config(flags: &str) -> Configuration {
        parse_configuration_str(&format!(
            "connection:\n  type: smtp\n  sender_email_address: sender@example.com\n\
             subject:\n  source: from_template_text\n  template: 'Hi {{{{name}}}}'\n\
             body:\n  source: from_template_text\n  plaintext: 'Dear {{{{name}}}}'\n\
             attachments: null\n{flags}"
        ))
        .expect("fixture must parse")
    }

    fn rows() -> Vec<Row> {
        [
            json!({"recipient_email_address": "a@x.com", "name": "Ann"}),
            json!({"recipient_email_address": "not-an-address", "name": "Bob"}),
            json!({"recipient_email_address": "c@x.com", "name": "Cid"}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
    }

    #[tokio::test]
    async fn test_continue_on_error_processes_every_row() {
        let c = make_config("continue_on_error: true\n");
        let files = FileCollection::default();
        let composer = EmailComposer::new(&c, &files).unwrap();
        let transport = MemoryTransport::new();

        let outcome = dispatch(&c, &composer, &transport, &rows()).await;
        assert!(!outcome.is_aborted());
        let ledger = outcome.into_result().unwrap();
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.failure_count(), 1);
        assert_eq!(ledger.rows[1].status, ResultStatus::Error);
        assert_eq!(ledger.rows[1].recipient_email_address, "not-an-address");
        assert_eq!(transport.sent().len(), 2);
        assert_eq!(transport.connect_count(), 1);
        assert_eq!(transport.close_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_on_error_keeps_partial_ledger() {
        let c = make_config("continue_on_error: false\n");
        let files = FileCollection::default();
        let composer = EmailComposer::new(&c, &files).unwrap();
        let transport = MemoryTransport::new();

        let outcome = dispatch(&c, &composer, &transport, &rows()).await;
        assert_eq!(outcome.ledger.len(), 2);
        assert_eq!(outcome.abort.as_ref().map(|a| a.row_index), Some(1));
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(transport.close_count(), 1);
        assert!(matches!(
            outcome.into_result(),
            Err(MailbatchError::Recipient { row_index: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_dry_run_never_connects() {
        let c = make_config("dry_run: true\n");
        let files = FileCollection::default();
        let composer = EmailComposer::new(&c, &files).unwrap();
        let transport = MemoryTransport::new().unreachable();

        let ledger = dispatch(&c, &composer, &transport, &rows())
            .await
            .into_result()
            .unwrap();
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.success_count(), 2);
        assert_eq!(ledger.rows[0].subject, "Hi Ann");
        assert_eq!(transport.connect_count(), 0);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_connect_marks_rows() {
        let c = make_config("");
        let files = FileCollection::default();
        let composer = EmailComposer::new(&c, &files).unwrap();
        let transport = MemoryTransport::new().unreachable();

        let ledger = dispatch(&c, &composer, &transport, &rows())
            .await
            .into_result()
            .unwrap();
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.success_count(), 0);
        assert!(ledger.rows[0]
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("unreachable")));
    }

    #[tokio::test]
    async fn test_send_failure_recorded() {
        let c = make_config("");
        let files = FileCollection::default();
        let composer = EmailComposer::new(&c, &files).unwrap();
        let transport = MemoryTransport::new().failing_rows([2]);

        let ledger = dispatch(&c, &composer, &transport, &rows())
            .await
            .into_result()
            .unwrap();
        assert_eq!(ledger.rows[2].status, ResultStatus::Error);
        assert_eq!(ledger.rows[2].subject, "Hi Cid");
        assert_eq!(ledger.failure_count(), 2);
    }
}
