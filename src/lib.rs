//! SWGTS - Chunked parallel upload client for read filtering servers.
//!
//! Uploads single-end or paired-end FASTQ files (plain or gzip) to an SWGTS
//! server, which filters the reads as they arrive and reports the headers of
//! the reads it kept. Optionally writes filtered copies of the inputs.
//!
//! # Features
//!
//! - **Parallel**: Reads are partitioned across concurrent workers
//! - **Backpressure aware**: Waits as long as the server asks when its buffer is full
//! - **Bounded retries**: Transient failures are retried within a fixed budget per batch
//! - **Paired-end**: Both files of a pair are sent and filtered in lockstep
//!
//! # Example
//!
//! ```no_run
//! use swgts::{progress, Config, HttpFilterService, Uploader};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), swgts::UploadError> {
//! let config = Config::load_or_create(&"swgts.toml".into())?;
//! let service = Arc::new(HttpFilterService::new(&config.client)?);
//! let (events, _rx) = progress::channel();
//! let uploader = Uploader::new(service, config.client, events, CancellationToken::new());
//! let report = uploader
//!     .upload_paths(&[PathBuf::from("reads.fastq.gz")], None, 6)
//!     .await?;
//! println!("{}/{} reads kept", report.verdict.kept(), report.verdict.total);
//! # Ok(())
//! # }
//! ```

pub mod base;
pub mod client;
pub mod compression;
pub mod config;
pub mod error;
pub mod fastq;
pub mod progress;
pub mod protocol;
pub mod reconstruct;
pub mod retry;
pub mod sender;
pub mod session;
pub mod upload;
pub mod utils;
pub mod validation;

#[cfg(test)]
mod testing;

pub use base::{partition_reads, TransferStats, WorkerRange};
pub use client::{FilterService, HttpFilterService};
pub use config::Config;
pub use error::UploadError;
pub use fastq::ReadFile;
pub use progress::{ProgressAggregator, UploadEvent};
pub use protocol::{ContextId, ServerVerdict};
pub use upload::{UploadReport, Uploader};

// Re-export commonly used types for convenience
pub use tokio;
pub use tokio_util;
