//! Scripted filtering server used by unit tests.

use crate::client::FilterService;
use crate::compression::FileFormat;
use crate::error::UploadError;
use crate::fastq::ReadFile;
use crate::protocol::{
    Batch, BufferStatus, CloseOutcome, ContextId, ServerStatus, ServerVerdict, SubmitOutcome,
};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// Scripted answer to a read submission.
#[derive(Debug, Clone)]
pub enum SubmitReply {
    Accept,
    /// 422 with `retry-after` in seconds.
    Backpressure(f64),
    Fail,
}

/// Scripted answer to a close request.
#[derive(Debug, Clone)]
pub enum CloseReply {
    Close,
    /// 503 with `retry-after` in seconds.
    Busy(f64),
    Fail,
}

/// In-memory [`FilterService`].
///
/// Replies are taken from the scripts in order; once a script is exhausted
/// submissions are accepted and closes succeed. Batches containing a read
/// whose first-file header is in `failing_headers` always fail.
#[derive(Default)]
pub struct ScriptedService {
    submit_script: Mutex<VecDeque<SubmitReply>>,
    close_script: Mutex<VecDeque<CloseReply>>,
    failing_headers: HashSet<String>,
    keep: HashSet<String>,
    fail_create: bool,
    pub create_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    /// First-file headers of every accepted batch, in acceptance order.
    pub accepted: Mutex<Vec<Vec<String>>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submit_script(self, replies: impl IntoIterator<Item = SubmitReply>) -> Self {
        *self.submit_script.lock().unwrap() = replies.into_iter().collect();
        self
    }

    pub fn with_close_script(self, replies: impl IntoIterator<Item = CloseReply>) -> Self {
        *self.close_script.lock().unwrap() = replies.into_iter().collect();
        self
    }

    pub fn failing_on(mut self, header: &str) -> Self {
        self.failing_headers.insert(header.to_string());
        self
    }

    /// Headers the verdict reports as kept (if they were accepted).
    pub fn keeping(mut self, headers: &[&str]) -> Self {
        self.keep = headers.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn accepted_batch_sizes(&self) -> Vec<usize> {
        self.accepted.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn accepted_reads(&self) -> usize {
        self.accepted_batch_sizes().iter().sum()
    }

    fn accepted_status(&self) -> BufferStatus {
        BufferStatus {
            pending_bytes: Some(100 * self.submit_calls.load(Ordering::SeqCst) as u64),
            processed_reads: Some(self.accepted_reads() as u64),
        }
    }
}

fn secs(seconds: f64) -> Duration {
    Duration::from_secs_f64(seconds)
}

#[async_trait]
impl FilterService for ScriptedService {
    async fn server_status(&self) -> Result<ServerStatus, UploadError> {
        Ok(ServerStatus {
            maximum_pending_bytes: 300_000,
            commit: Some("test".to_string()),
            date: None,
            uptime: Some(1.0),
        })
    }

    async fn create_context(&self, _filenames: &[String]) -> Result<ContextId, UploadError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create {
            return Err(UploadError::UnexpectedStatus {
                status: 500,
                message: "Could not create context.".to_string(),
            });
        }
        Ok(ContextId::new(Uuid::new_v4()))
    }

    async fn submit_reads(
        &self,
        _context: &ContextId,
        batch: &Batch<'_>,
    ) -> Result<SubmitOutcome, UploadError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let headers: Vec<String> = (0..batch.len())
            .filter_map(|i| batch.first_header(i))
            .map(str::to_string)
            .collect();

        if headers.iter().any(|h| self.failing_headers.contains(h)) {
            return Err(UploadError::UnexpectedStatus {
                status: 500,
                message: "scripted failure".to_string(),
            });
        }

        let reply = self
            .submit_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SubmitReply::Accept);
        match reply {
            SubmitReply::Accept => {
                self.accepted.lock().unwrap().push(headers);
                Ok(SubmitOutcome::Accepted(self.accepted_status()))
            }
            SubmitReply::Backpressure(seconds) => Ok(SubmitOutcome::Backpressure {
                status: BufferStatus {
                    pending_bytes: Some(300_000),
                    processed_reads: Some(self.accepted_reads() as u64),
                },
                retry_after: secs(seconds),
            }),
            SubmitReply::Fail => Err(UploadError::UnexpectedStatus {
                status: 500,
                message: "scripted failure".to_string(),
            }),
        }
    }

    async fn close_context(&self, _context: &ContextId) -> Result<CloseOutcome, UploadError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .close_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(CloseReply::Close);
        match reply {
            CloseReply::Close => {
                let accepted = self.accepted.lock().unwrap();
                let saved = accepted
                    .iter()
                    .flatten()
                    .filter(|h| self.keep.contains(*h))
                    .cloned()
                    .collect();
                let total = accepted.iter().map(Vec::len).sum::<usize>() as u64;
                Ok(CloseOutcome::Closed(ServerVerdict { saved, total }))
            }
            CloseReply::Busy(seconds) => Ok(CloseOutcome::Busy {
                status: BufferStatus::default(),
                retry_after: secs(seconds),
            }),
            CloseReply::Fail => Err(UploadError::UnexpectedStatus {
                status: 500,
                message: "Could not close context.".to_string(),
            }),
        }
    }
}

/// Plain read file whose reads have the given headers.
pub fn read_file(name: &str, headers: &[String]) -> ReadFile {
    let lines = headers
        .iter()
        .flat_map(|h| [h.clone(), "ACGT".to_string(), "+".to_string(), "IIII".to_string()])
        .collect();
    ReadFile {
        name: name.to_string(),
        format: FileFormat::from_name(name),
        lines,
    }
}

/// Headers `@{prefix}{i}` for `0..count`.
pub fn headers(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("@{}{}", prefix, i)).collect()
}
