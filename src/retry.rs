//! Bounded retry with server-directed backpressure.
//!
//! Two kinds of trouble are told apart. A `422` means the server is healthy
//! but its buffer is full: the controller waits as long as instructed and
//! retries, as often as it takes. Anything else counts against a fixed
//! attempt budget and is retried immediately.

use crate::client::FilterService;
use crate::error::UploadError;
use crate::progress::EventSender;
use crate::protocol::{Batch, ContextId, SubmitOutcome};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a delivered batch got through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReceipt {
    /// Backpressure waits before the batch was accepted.
    pub backpressure_waits: u32,
    /// Failed attempts before the batch was accepted.
    pub failed_attempts: u32,
}

/// Sleep for a server-instructed duration unless the upload is cancelled.
pub async fn wait_instructed(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), UploadError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(UploadError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Drives single batch submissions for one worker.
pub struct RetryController<'a> {
    service: &'a dyn FilterService,
    context: &'a ContextId,
    events: &'a EventSender,
    cancel: &'a CancellationToken,
    max_attempts: u32,
    worker_id: usize,
}

impl<'a> RetryController<'a> {
    pub fn new(
        service: &'a dyn FilterService,
        context: &'a ContextId,
        events: &'a EventSender,
        cancel: &'a CancellationToken,
        max_attempts: u32,
        worker_id: usize,
    ) -> Self {
        Self {
            service,
            context,
            events,
            cancel,
            max_attempts: max_attempts.max(1),
            worker_id,
        }
    }

    /// Deliver `batch`, retrying until it is accepted or the budget is spent.
    pub async fn send(&self, batch: &Batch<'_>) -> Result<BatchReceipt, UploadError> {
        let mut receipt = BatchReceipt::default();

        loop {
            if self.cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            match self.service.submit_reads(self.context, batch).await {
                Ok(SubmitOutcome::Accepted(status)) => {
                    self.events.buffer_status(&status);
                    return Ok(receipt);
                }
                Ok(SubmitOutcome::Backpressure { status, retry_after }) => {
                    self.events.buffer_status(&status);
                    receipt.backpressure_waits += 1;
                    debug!(
                        worker_id = self.worker_id,
                        retry_after = retry_after.as_secs_f64(),
                        pending_bytes = ?status.pending_bytes,
                        "Server buffer full, waiting before resending batch"
                    );
                    wait_instructed(retry_after, self.cancel).await?;
                }
                Err(UploadError::Cancelled) => return Err(UploadError::Cancelled),
                Err(e) => {
                    receipt.failed_attempts += 1;
                    warn!(
                        worker_id = self.worker_id,
                        attempt = receipt.failed_attempts,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Batch submission failed"
                    );
                    if receipt.failed_attempts >= self.max_attempts {
                        return Err(UploadError::TransferExhausted {
                            worker_id: self.worker_id,
                            attempts: receipt.failed_attempts,
                            last_error: e.to_string(),
                        });
                    }
                }
            }
        }
    }
}
