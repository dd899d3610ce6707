//! Upload orchestration.
//!
//! [`Uploader`] ties the pieces together for one sequencing unit:
//! validate, open a context, send all reads in parallel, close the context
//! and optionally write filtered copies of the input files.

use crate::base::TransferStats;
use crate::client::FilterService;
use crate::config::ClientConfig;
use crate::error::UploadError;
use crate::fastq::ReadFile;
use crate::progress::EventSender;
use crate::protocol::ServerVerdict;
use crate::reconstruct::{reconstruct, write_artifacts};
use crate::sender::Sender;
use crate::session::SessionManager;
use crate::validation::validate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Result of a completed upload.
#[derive(Debug)]
pub struct UploadReport {
    /// Reads (read pairs) in the upload.
    pub read_count: usize,
    pub verdict: ServerVerdict,
    pub stats: TransferStats,
    /// Workers that gave up, with the error that stopped them.
    pub failed_workers: Vec<(usize, UploadError)>,
    /// Filtered files written to disk, if an output directory was given.
    pub artifacts: Vec<PathBuf>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed_workers.is_empty()
    }
}

pub struct Uploader {
    service: Arc<dyn FilterService>,
    config: ClientConfig,
    events: EventSender,
    cancel: CancellationToken,
}

impl Uploader {
    pub fn new(
        service: Arc<dyn FilterService>,
        config: ClientConfig,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            config,
            events,
            cancel,
        }
    }

    /// Load `paths` from disk and upload them.
    pub async fn upload_paths(
        &self,
        paths: &[PathBuf],
        output_dir: Option<&Path>,
        compression_level: u32,
    ) -> Result<UploadReport, UploadError> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            match ReadFile::open(path).await {
                Ok(file) => files.push(file),
                Err(e) => {
                    self.events.notice(e.to_string());
                    return Err(e);
                }
            }
        }
        self.upload(files, output_dir, compression_level).await
    }

    /// Upload one sequencing unit of one or two files.
    ///
    /// Worker failures do not abort the upload: the context is still closed
    /// and the failures are listed in the report.
    pub async fn upload(
        &self,
        files: Vec<ReadFile>,
        output_dir: Option<&Path>,
        compression_level: u32,
    ) -> Result<UploadReport, UploadError> {
        let read_count = match validate(&files) {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Read files rejected");
                self.events.notice(e.to_string());
                return Err(e);
            }
        };

        let sessions = SessionManager::new(
            Arc::clone(&self.service),
            self.events.clone(),
            self.cancel.clone(),
        );
        let file_names = files.iter().map(|f| f.name.clone()).collect();
        let session = sessions.open(file_names).await.inspect_err(|e| {
            self.events.notice(e.to_string());
        })?;
        self.events.total(read_count as u64);

        let files = Arc::new(files);
        let sender = Sender::new(
            Arc::clone(&self.service),
            self.events.clone(),
            self.cancel.clone(),
            self.config.worker_threads,
            self.config.package_size,
            self.config.max_attempts,
        );
        let report = sender
            .send_all(Arc::clone(&files), read_count, Arc::clone(&session.context))
            .await;

        for (worker_id, e) in &report.failures {
            error!(worker_id, error = %e, "Reads of this worker were not delivered");
            self.events
                .notice(format!("Worker {} failed to transmit its reads: {}", worker_id, e));
        }

        let verdict = sessions.close(&session).await.inspect_err(|e| {
            self.events.notice(e.to_string());
        })?;
        self.events
            .notice(format!("{}/{} reads kept.", verdict.kept(), verdict.total));

        let artifacts = match output_dir {
            Some(dir) => {
                let filtered = reconstruct(&files, &verdict, compression_level)?;
                write_artifacts(dir, &filtered).await?
            }
            None => Vec::new(),
        };

        info!(
            context = %session.context,
            reads = read_count,
            kept = verdict.kept(),
            failed_workers = report.failures.len(),
            "Upload finished"
        );

        Ok(UploadReport {
            read_count,
            verdict,
            stats: report.stats,
            failed_workers: report.failures,
            artifacts,
        })
    }
}
