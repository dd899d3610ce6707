//! Error types for the SWGTS upload client.
//!
//! This module defines the error types used throughout the upload engine.
//! Pre-flight errors (`MalformedFile`, `PairMismatch`) are raised before any
//! network call is made; transfer errors carry enough context to tell which
//! worker gave up and why.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while uploading reads to a filtering server.
///
/// Backpressure from the server is not an error and never surfaces here;
/// it is resolved inside the retry controller by waiting.
#[derive(Debug, Error)]
pub enum UploadError {
    /// An I/O error occurred while reading inputs or writing outputs.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to serialize or deserialize JSON data.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to serialize data to TOML format.
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// Failed to deserialize data from TOML format.
    #[error("TOML deserialization error: {0}")]
    TomlDeserialization(#[from] toml::de::Error),

    /// The HTTP exchange itself failed (connection refused, timeout, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A read file has a line count that is not a multiple of four.
    #[error("Found a number of lines not divisible by 4 ({line_count}) in {file}, likely a corrupted file")]
    MalformedFile { file: String, line_count: usize },

    /// The selected files cannot form a sequencing unit.
    #[error("The files can not be paired: {0}")]
    PairMismatch(String),

    /// A worker failed to deliver one batch within its attempt budget.
    #[error("Worker {worker_id} gave up on a batch after {attempts} failed attempts: {last_error}")]
    TransferExhausted {
        worker_id: usize,
        attempts: u32,
        last_error: String,
    },

    /// The server answered with a status code the protocol does not expect.
    #[error("Unexpected response from server (HTTP {status}): {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// The server sent a payload that violates the upload protocol.
    #[error("Transfer protocol error: {0}")]
    ProtocolError(String),

    /// A configuration error (invalid settings, missing required fields, etc.).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The requested input file was not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// A gzip compression or decompression operation failed.
    #[error("Compression error: {0}")]
    CompressionError(String),

    /// The upload was cancelled by the user.
    #[error("Upload cancelled")]
    Cancelled,
}

impl UploadError {
    /// Returns `true` for errors detected before any network activity.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            UploadError::MalformedFile { .. } | UploadError::PairMismatch(_)
        )
    }
}
