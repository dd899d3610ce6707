//! Sender for the read upload.
//!
//! The sender partitions the reads across workers, runs all workers
//! concurrently on the tokio runtime and waits until every one of them has
//! settled. A failing worker does not stop its siblings.

mod worker;

use crate::base::{partition_reads, TransferStats, WorkerRange};
use crate::client::FilterService;
use crate::error::UploadError;
use crate::fastq::ReadFile;
use crate::progress::EventSender;
use crate::protocol::ContextId;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub use worker::{TransferWorker, WorkerState};

/// Outcome of running all workers for one context.
#[derive(Debug)]
pub struct SendReport {
    pub stats: TransferStats,
    /// Workers that gave up, by worker id.
    pub failures: Vec<(usize, UploadError)>,
}

impl SendReport {
    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs transfer workers for one upload context.
pub struct Sender {
    service: Arc<dyn FilterService>,
    events: EventSender,
    cancel: CancellationToken,
    workers: usize,
    package_size: usize,
    max_attempts: u32,
}

impl Sender {
    pub fn new(
        service: Arc<dyn FilterService>,
        events: EventSender,
        cancel: CancellationToken,
        workers: usize,
        package_size: usize,
        max_attempts: u32,
    ) -> Self {
        Self {
            service,
            events,
            cancel,
            workers,
            package_size,
            max_attempts,
        }
    }

    /// Send all `read_count` reads of `files` to `context`.
    ///
    /// Returns once every worker has either finished its range or given up.
    pub async fn send_all(
        &self,
        files: Arc<Vec<ReadFile>>,
        read_count: usize,
        context: Arc<ContextId>,
    ) -> SendReport {
        let ranges = partition_reads(read_count, self.workers);
        info!(
            reads = read_count,
            workers = ranges.len(),
            reads_per_worker = ranges.first().map(WorkerRange::len).unwrap_or(0),
            "Starting transfer workers"
        );

        let mut tasks = JoinSet::new();
        for (worker_id, range) in ranges.into_iter().enumerate() {
            let worker = TransferWorker {
                worker_id,
                range,
                files: Arc::clone(&files),
                context: Arc::clone(&context),
                service: Arc::clone(&self.service),
                events: self.events.clone(),
                cancel: self.cancel.clone(),
                package_size: self.package_size,
                max_attempts: self.max_attempts,
            };
            tasks.spawn(async move { (worker_id, worker.run().await) });
        }

        // Join barrier: drain every task, successful or not.
        let mut stats = TransferStats::new();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(summary))) => stats.record_worker(&summary),
                Ok((worker_id, Err(e))) => {
                    error!(worker_id, error = %e, "Transfer worker failed");
                    stats.record_failure();
                    failures.push((worker_id, e));
                }
                Err(e) => {
                    error!(error = ?e, "Transfer worker panicked");
                    stats.record_failure();
                    failures.push((
                        usize::MAX,
                        UploadError::ProtocolError(format!("Transfer worker panicked: {:?}", e)),
                    ));
                }
            }
        }
        failures.sort_by_key(|(worker_id, _)| *worker_id);
        stats.finish();

        SendReport { stats, failures }
    }
}
