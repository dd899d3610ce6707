//! Progress tracking and display for uploads.
//!
//! Workers never touch shared progress state. They emit [`UploadEvent`]s into
//! a channel, and a single [`ProgressAggregator`] owns the totals and the
//! progress bars. Progress is additive; buffer fill and filtered count are
//! snapshots of server state, so the latest value wins.

use crate::protocol::BufferStatus;
use crate::utils::format_bytes;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::info;

/// Something the upload engine wants the user to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// Total number of reads (read pairs) in the upload.
    Total(u64),
    /// Reads delivered since the last progress event.
    Progress(u64),
    /// Bytes currently pending in the server buffer.
    BufferFill(u64),
    /// Reads the server has processed so far.
    Filtered(u64),
    /// A message for the user.
    Notice(String),
}

/// Cheap, clonable handle for emitting events.
///
/// Sending never blocks and never fails the upload; events emitted after the
/// aggregator has gone away are dropped.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<UploadEvent>,
}

pub type EventReceiver = mpsc::UnboundedReceiver<UploadEvent>;

/// Create a connected event sender and receiver.
pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}

impl EventSender {
    pub fn emit(&self, event: UploadEvent) {
        let _ = self.tx.send(event);
    }

    pub fn total(&self, reads: u64) {
        self.emit(UploadEvent::Total(reads));
    }

    pub fn progress(&self, reads: u64) {
        self.emit(UploadEvent::Progress(reads));
    }

    /// Report whatever parts of the server's buffer state are known.
    pub fn buffer_status(&self, status: &BufferStatus) {
        if let Some(pending) = status.pending_bytes {
            self.emit(UploadEvent::BufferFill(pending));
        }
        if let Some(processed) = status.processed_reads {
            self.emit(UploadEvent::Filtered(processed));
        }
    }

    pub fn notice(&self, message: impl Into<String>) {
        self.emit(UploadEvent::Notice(message.into()));
    }
}

/// Totals as seen by the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadTotals {
    pub total_reads: u64,
    pub sent_reads: u64,
    pub buffer_fill: u64,
    pub filtered_reads: u64,
    pub notices: Vec<String>,
}

impl UploadTotals {
    /// Get current progress percentage.
    pub fn percentage(&self) -> f64 {
        if self.total_reads == 0 {
            return 0.0;
        }
        (self.sent_reads as f64 / self.total_reads as f64) * 100.0
    }
}

const READS_TEMPLATE: &str =
    "{msg:25.25} [{bar:40.cyan/blue}] {pos:>10}/{len:>10} reads {percent:>3}% {per_sec:>14} {eta:>6}";

/// Single consumer of upload events.
pub struct ProgressAggregator {
    totals: UploadTotals,
    reads_bar: Option<ProgressBar>,
    buffer_bar: Option<ProgressBar>,
}

impl ProgressAggregator {
    /// Aggregator without any display.
    pub fn headless() -> Self {
        Self {
            totals: UploadTotals::default(),
            reads_bar: None,
            buffer_bar: None,
        }
    }

    /// Aggregator drawing into `multi`.
    ///
    /// `buffer_capacity` is the server's maximum pending bytes; when known a
    /// second bar shows how full the server buffer is.
    pub fn with_bars(multi: &MultiProgress, label: &str, buffer_capacity: Option<u64>) -> Self {
        let reads_bar = multi.add(ProgressBar::new(0));
        reads_bar.set_style(
            ProgressStyle::default_bar()
                .template(READS_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );
        reads_bar.set_message(label.to_string());

        let buffer_bar = buffer_capacity.map(|capacity| {
            let bar = multi.add(ProgressBar::new(capacity));
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{msg:25.25} [{bar:40.yellow/red}] {wide_msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            bar.set_message("server buffer");
            bar
        });

        Self {
            totals: UploadTotals::default(),
            reads_bar: Some(reads_bar),
            buffer_bar,
        }
    }

    pub fn totals(&self) -> &UploadTotals {
        &self.totals
    }

    /// Apply one event to the totals and the display.
    pub fn apply(&mut self, event: UploadEvent) {
        match event {
            UploadEvent::Total(total) => {
                self.totals.total_reads = total;
                if let Some(ref pb) = self.reads_bar {
                    pb.set_length(total);
                }
            }
            UploadEvent::Progress(delta) => {
                self.totals.sent_reads += delta;
                if let Some(ref pb) = self.reads_bar {
                    pb.set_position(self.totals.sent_reads);
                }
            }
            UploadEvent::BufferFill(bytes) => {
                self.totals.buffer_fill = bytes;
                if let Some(ref pb) = self.buffer_bar {
                    pb.set_position(bytes.min(pb.length().unwrap_or(bytes)));
                    pb.set_message(format!("server buffer {}", format_bytes(bytes)));
                }
            }
            UploadEvent::Filtered(reads) => {
                self.totals.filtered_reads = reads;
                if let Some(ref pb) = self.reads_bar {
                    pb.set_message(format!("filtered {}", reads));
                }
            }
            UploadEvent::Notice(message) => {
                info!(notice = %message);
                if let Some(ref pb) = self.reads_bar {
                    pb.println(&message);
                }
                self.totals.notices.push(message);
            }
        }
    }

    /// Consume events until every sender is dropped, then return the totals.
    pub async fn run(mut self, mut rx: EventReceiver) -> UploadTotals {
        while let Some(event) = rx.recv().await {
            self.apply(event);
        }
        self.finish();
        self.totals
    }

    /// Finish the progress bars.
    pub fn finish(&self) {
        if let Some(ref pb) = self.reads_bar {
            let msg = pb.message();
            pb.finish_with_message(msg);
        }
        if let Some(ref pb) = self.buffer_bar {
            pb.finish_and_clear();
        }
    }
}
