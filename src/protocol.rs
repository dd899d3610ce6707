//! Wire types of the filtering server's HTTP API.
//!
//! Field names follow the server exactly, including the spaces in
//! `"pending bytes"` and `"processed reads"`.

use crate::error::UploadError;
use crate::fastq::{ReadFile, ReadRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Server-issued identifier of an upload context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Parse the id from the server's response.
    pub fn parse(raw: &str) -> Result<Self, UploadError> {
        Uuid::parse_str(raw).map(Self).map_err(|e| {
            UploadError::ProtocolError(format!(
                "The server sent a malformed context id {:?}: {}",
                raw, e
            ))
        })
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The unit sent per request: reads aligned across all files of the upload.
///
/// Serialized as `[[[h, s, +, q], ...per file], ...per read]`.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Batch<'a> {
    reads: Vec<Vec<ReadRecord<'a>>>,
}

impl<'a> Batch<'a> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            reads: Vec::with_capacity(capacity),
        }
    }

    /// Append record `index` of every file, returning `false` if any file
    /// has no such record.
    pub fn push_aligned(&mut self, files: &'a [ReadFile], index: usize) -> bool {
        let tuple: Option<Vec<_>> = files.iter().map(|f| f.record(index)).collect();
        match tuple {
            Some(tuple) => {
                self.reads.push(tuple);
                true
            }
            None => false,
        }
    }

    /// Number of reads (or read pairs) in the batch.
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    pub fn clear(&mut self) {
        self.reads.clear();
    }

    /// Header of the first file's read at `position` within the batch.
    pub fn first_header(&self, position: usize) -> Option<&'a str> {
        self.reads.get(position)?.first().map(|r| r.header)
    }
}

/// Body of `POST /context/create`.
#[derive(Debug, Serialize)]
pub struct CreateContextRequest<'a> {
    pub filenames: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct CreateContextResponse {
    pub context: String,
}

/// Body of `POST /context/{id}/close`.
#[derive(Debug, Serialize)]
pub struct CloseContextRequest {
    pub context: ContextId,
}

/// Buffer state the server reports with read submissions and declined closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct BufferStatus {
    #[serde(rename = "pending bytes", default)]
    pub pending_bytes: Option<u64>,
    #[serde(rename = "processed reads", default)]
    pub processed_reads: Option<u64>,
}

/// Body of a `503` answer to a close request.
///
/// Depending on the server version the wait may be carried in the body
/// instead of a `Retry-After` header.
#[derive(Debug, Default, Deserialize)]
pub struct BusyResponse {
    #[serde(flatten)]
    pub status: BufferStatus,
    #[serde(rename = "Retry-After", default)]
    pub retry_after: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of a successful close.
#[derive(Debug, Deserialize)]
pub struct CloseContextResponse {
    pub saved: Vec<String>,
    pub total: u64,
}

/// Error bodies carry a human readable `message`.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Body of `GET /server-status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerStatus {
    #[serde(rename = "maximum pending bytes")]
    pub maximum_pending_bytes: u64,
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub uptime: Option<f64>,
}

/// The server's final decision on an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerVerdict {
    /// First-file headers of the reads the server kept.
    pub saved: HashSet<String>,
    /// Reads the server processed in total.
    pub total: u64,
}

impl ServerVerdict {
    pub fn kept(&self) -> usize {
        self.saved.len()
    }

    pub fn contains(&self, header: &str) -> bool {
        self.saved.contains(header)
    }
}

impl From<CloseContextResponse> for ServerVerdict {
    fn from(response: CloseContextResponse) -> Self {
        Self {
            saved: response.saved.into_iter().collect(),
            total: response.total,
        }
    }
}

/// Result of submitting one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// `200`: the batch was queued for filtering.
    Accepted(BufferStatus),
    /// `422`: the server buffer is full; resend the same batch after the wait.
    Backpressure {
        status: BufferStatus,
        retry_after: Duration,
    },
}

/// Result of a close request.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    /// `200`: the context is closed.
    Closed(ServerVerdict),
    /// `503`: reads are still pending; ask again after the wait.
    Busy {
        status: BufferStatus,
        retry_after: Duration,
    },
}

/// Convert a server-provided wait in (possibly fractional) seconds.
pub fn retry_after_from_secs(seconds: f64) -> Result<Duration, UploadError> {
    Duration::try_from_secs_f64(seconds).map_err(|_| {
        UploadError::ProtocolError(format!("Invalid Retry-After value: {}", seconds))
    })
}

/// Parse a `Retry-After` header value given in seconds.
pub fn parse_retry_after(value: &str) -> Result<Duration, UploadError> {
    let seconds: f64 = value.trim().parse().map_err(|_| {
        UploadError::ProtocolError(format!("Invalid Retry-After value: {:?}", value))
    })?;
    retry_after_from_secs(seconds)
}
