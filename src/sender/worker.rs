//! Transfer worker implementation.
//!
//! Each worker walks its assigned range of reads, packs aligned reads into
//! batches of bounded size and pushes every batch through the retry
//! controller before building the next one.

use crate::base::{WorkerRange, WorkerSummary};
use crate::client::FilterService;
use crate::error::UploadError;
use crate::fastq::ReadFile;
use crate::progress::EventSender;
use crate::protocol::{Batch, ContextId};
use crate::retry::RetryController;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Where a worker is in its send loop.
#[derive(Debug)]
pub enum WorkerState {
    /// Appending reads to the current batch.
    Accumulating,
    /// The current batch is full or the range is exhausted.
    Sending,
    Done,
    Failed(UploadError),
}

/// One independent unit of upload work.
pub struct TransferWorker {
    pub worker_id: usize,
    pub range: WorkerRange,
    pub files: Arc<Vec<ReadFile>>,
    pub context: Arc<ContextId>,
    pub service: Arc<dyn FilterService>,
    pub events: EventSender,
    pub cancel: CancellationToken,
    pub package_size: usize,
    pub max_attempts: u32,
}

impl TransferWorker {
    /// Upload every read in the assigned range.
    ///
    /// Batches are sent strictly one after another; the next batch is only
    /// built once the previous one has been accepted.
    pub async fn run(self) -> Result<WorkerSummary, UploadError> {
        debug!(
            worker_id = self.worker_id,
            start = self.range.start,
            end = self.range.end,
            "Starting transfer worker"
        );

        let files = Arc::clone(&self.files);
        let package_size = self.package_size.max(1);
        let controller = RetryController::new(
            self.service.as_ref(),
            self.context.as_ref(),
            &self.events,
            &self.cancel,
            self.max_attempts,
            self.worker_id,
        );

        let mut summary = WorkerSummary::default();
        let mut batch = Batch::with_capacity(package_size);
        let mut cursor = self.range.start;
        let mut state = WorkerState::Accumulating;

        loop {
            state = match state {
                WorkerState::Accumulating => {
                    while cursor < self.range.end && batch.len() < package_size {
                        if !batch.push_aligned(&files, cursor) {
                            return Err(UploadError::ProtocolError(format!(
                                "Read {} is missing from at least one file",
                                cursor
                            )));
                        }
                        cursor += 1;
                    }
                    if batch.is_empty() {
                        WorkerState::Done
                    } else {
                        WorkerState::Sending
                    }
                }
                WorkerState::Sending => match controller.send(&batch).await {
                    Ok(receipt) => {
                        let delivered = batch.len();
                        self.events.progress(delivered as u64);
                        summary.reads_sent += delivered;
                        summary.batches_sent += 1;
                        summary.backpressure_waits += receipt.backpressure_waits;
                        summary.failed_attempts += receipt.failed_attempts;
                        batch.clear();
                        if cursor >= self.range.end {
                            WorkerState::Done
                        } else {
                            WorkerState::Accumulating
                        }
                    }
                    Err(e) => WorkerState::Failed(e),
                },
                WorkerState::Done => {
                    info!(
                        worker_id = self.worker_id,
                        reads = summary.reads_sent,
                        batches = summary.batches_sent,
                        "Transfer worker finished"
                    );
                    return Ok(summary);
                }
                WorkerState::Failed(e) => return Err(e),
            };
        }
    }
}
