//! Shared functionality for the upload engine.
//!
//! This module provides the work partitioning used to spread reads across
//! concurrent transfer workers, and the statistics collected per upload.

use std::time::{Duration, Instant};

/// Half-open range `[start, end)` of record indices owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerRange {
    /// First record index.
    pub start: usize,
    /// One past the last record index.
    pub end: usize,
}

impl WorkerRange {
    /// Create a new worker range.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of reads in the range.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split `total_reads` into contiguous ranges, one per worker.
///
/// At most `min(workers, total_reads)` ranges are produced, each holding
/// `ceil(total_reads / workers)` reads except possibly the last. Ranges that
/// would start at or past `total_reads` are omitted rather than returned empty.
pub fn partition_reads(total_reads: usize, workers: usize) -> Vec<WorkerRange> {
    if workers == 0 || total_reads == 0 {
        return Vec::new();
    }

    let workers = workers.min(total_reads);
    let per_worker = total_reads.div_ceil(workers);
    let mut ranges = Vec::with_capacity(workers);

    for worker in 0..workers {
        let start = worker * per_worker;
        if start >= total_reads {
            continue;
        }
        let end = ((worker + 1) * per_worker).min(total_reads);
        ranges.push(WorkerRange::new(start, end));
    }

    ranges
}

/// What a single worker delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub reads_sent: usize,
    pub batches_sent: usize,
    /// Times the server asked this worker to wait.
    pub backpressure_waits: u32,
    /// Failed attempts that were retried successfully.
    pub failed_attempts: u32,
}

/// Upload statistics aggregated over all workers.
#[derive(Debug, Clone)]
pub struct TransferStats {
    pub reads_sent: usize,
    pub batches_sent: usize,
    pub backpressure_waits: u32,
    pub failed_attempts: u32,
    pub workers_failed: usize,
    /// Start time of the upload.
    pub start_time: Instant,
    /// End time of the upload.
    pub end_time: Option<Instant>,
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferStats {
    /// Create a new statistics tracker starting now.
    pub fn new() -> Self {
        Self {
            reads_sent: 0,
            batches_sent: 0,
            backpressure_waits: 0,
            failed_attempts: 0,
            workers_failed: 0,
            start_time: Instant::now(),
            end_time: None,
        }
    }

    /// Fold in the summary of a worker that finished its range.
    pub fn record_worker(&mut self, summary: &WorkerSummary) {
        self.reads_sent += summary.reads_sent;
        self.batches_sent += summary.batches_sent;
        self.backpressure_waits += summary.backpressure_waits;
        self.failed_attempts += summary.failed_attempts;
    }

    /// Record a worker that gave up.
    pub fn record_failure(&mut self) {
        self.workers_failed += 1;
    }

    /// Mark the upload as complete.
    pub fn finish(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Get the duration of the upload.
    pub fn duration(&self) -> Option<Duration> {
        Some(self.end_time?.duration_since(self.start_time))
    }

    /// Get the throughput in reads per second.
    pub fn reads_per_second(&self) -> Option<f64> {
        let duration = self.duration()?.as_secs_f64();
        if duration > 0.0 {
            Some(self.reads_sent as f64 / duration)
        } else {
            None
        }
    }
}
