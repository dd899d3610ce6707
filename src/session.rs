//! Upload context lifecycle.
//!
//! A context is opened once per upload and closed exactly once after all
//! workers have settled. Closing may be deferred by the server while reads
//! are still being filtered; the manager then waits as instructed and asks
//! again, without giving up.

use crate::client::FilterService;
use crate::error::UploadError;
use crate::progress::EventSender;
use crate::protocol::{CloseOutcome, ContextId, ServerVerdict};
use crate::retry::wait_instructed;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// An open upload context.
#[derive(Debug, Clone)]
pub struct Session {
    pub context: Arc<ContextId>,
    pub file_names: Vec<String>,
}

/// Opens and closes upload contexts.
pub struct SessionManager {
    service: Arc<dyn FilterService>,
    events: EventSender,
    cancel: CancellationToken,
}

impl SessionManager {
    pub fn new(
        service: Arc<dyn FilterService>,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            events,
            cancel,
        }
    }

    /// Open a context for the given files.
    pub async fn open(&self, file_names: Vec<String>) -> Result<Session, UploadError> {
        let context = self.service.create_context(&file_names).await?;
        info!(%context, files = ?file_names, "Opened upload context");
        Ok(Session {
            context: Arc::new(context),
            file_names,
        })
    }

    /// Close the context and fetch the server's verdict.
    ///
    /// The first close request is always sent, even after cancellation;
    /// cancellation only ends the wait after a busy answer.
    pub async fn close(&self, session: &Session) -> Result<ServerVerdict, UploadError> {
        let mut busy_waits = 0u32;
        loop {
            match self.service.close_context(&session.context).await? {
                CloseOutcome::Closed(verdict) => {
                    info!(
                        context = %session.context,
                        kept = verdict.kept(),
                        total = verdict.total,
                        busy_waits,
                        "Closed upload context"
                    );
                    return Ok(verdict);
                }
                CloseOutcome::Busy { status, retry_after } => {
                    self.events.buffer_status(&status);
                    if self.cancel.is_cancelled() {
                        return Err(UploadError::Cancelled);
                    }
                    busy_waits += 1;
                    debug!(
                        context = %session.context,
                        retry_after = retry_after.as_secs_f64(),
                        "Reads are still being processed, waiting before closing"
                    );
                    wait_instructed(retry_after, &self.cancel).await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::channel;
    use crate::testing::{CloseReply, ScriptedService};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::Instant;

    fn manager(service: Arc<ScriptedService>) -> SessionManager {
        let (events, _rx) = channel();
        SessionManager::new(service, events, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_open_creates_one_context() {
        let service = Arc::new(ScriptedService::new());
        let session = manager(service.clone())
            .open(vec!["r1.fq".to_string(), "r2.fq".to_string()])
            .await
            .unwrap();

        assert_eq!(session.file_names.len(), 2);
        assert_eq!(service.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_retries_while_busy() {
        let service = Arc::new(
            ScriptedService::new()
                .with_close_script([CloseReply::Busy(1.5), CloseReply::Busy(1.5)]),
        );
        let manager = manager(service.clone());
        let session = manager.open(vec!["r1.fq".to_string()]).await.unwrap();

        let started = Instant::now();
        let verdict = manager.close(&session).await.unwrap();

        assert_eq!(verdict.total, 0);
        assert_eq!(service.close_calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_close_failure_propagates() {
        let service = Arc::new(ScriptedService::new().with_close_script([CloseReply::Fail]));
        let manager = manager(service.clone());
        let session = manager.open(vec!["r1.fq".to_string()]).await.unwrap();

        let result = manager.close(&session).await;

        assert!(matches!(
            result,
            Err(UploadError::UnexpectedStatus { status: 500, .. })
        ));
        assert_eq!(service.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_can_be_cancelled_while_busy() {
        let service =
            Arc::new(ScriptedService::new().with_close_script([CloseReply::Busy(600.0)]));
        let (events, _rx) = channel();
        let cancel = CancellationToken::new();
        let manager = SessionManager::new(service.clone(), events, cancel.clone());
        let session = manager.open(vec!["r1.fq".to_string()]).await.unwrap();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        assert!(matches!(
            manager.close(&session).await,
            Err(UploadError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_close_is_sent_after_cancellation() {
        let service = Arc::new(ScriptedService::new());
        let (events, _rx) = channel();
        let cancel = CancellationToken::new();
        let manager = SessionManager::new(service.clone(), events, cancel.clone());
        let session = manager.open(vec!["r1.fq".to_string()]).await.unwrap();

        cancel.cancel();
        manager.close(&session).await.unwrap();

        assert_eq!(service.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_busy_close_stops_without_waiting() {
        let service =
            Arc::new(ScriptedService::new().with_close_script([CloseReply::Busy(600.0)]));
        let (events, _rx) = channel();
        let cancel = CancellationToken::new();
        let manager = SessionManager::new(service.clone(), events, cancel.clone());
        let session = manager.open(vec!["r1.fq".to_string()]).await.unwrap();

        cancel.cancel();

        assert!(matches!(
            manager.close(&session).await,
            Err(UploadError::Cancelled)
        ));
        assert_eq!(service.close_calls.load(Ordering::SeqCst), 1);
    }
}
