//! Rebuilding filtered copies of the uploaded files.
//!
//! The server reports the headers of the reads it kept, always taken from the
//! first file. Record `i` of every file survives iff the first file's header
//! at `i` is in that set, which keeps paired files aligned.

use crate::compression::FileFormat;
use crate::error::UploadError;
use crate::fastq::{encode_lines, ReadFile};
use crate::protocol::ServerVerdict;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A filtered file ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredArtifact {
    pub name: String,
    pub format: FileFormat,
    pub data: Vec<u8>,
}

/// Output name for a filtered copy of `original`.
pub fn filtered_name(original: &str) -> String {
    format!("filtered.{}", original)
}

/// Build one artifact per input file, in input order.
pub fn reconstruct(
    files: &[ReadFile],
    verdict: &ServerVerdict,
    level: u32,
) -> Result<Vec<FilteredArtifact>, UploadError> {
    let Some(first) = files.first() else {
        return Ok(Vec::new());
    };

    let kept: Vec<usize> = (0..first.read_count())
        .filter(|&i| first.header(i).is_some_and(|h| verdict.contains(h)))
        .collect();
    debug!(kept = kept.len(), total = first.read_count(), "Selected kept reads");

    files
        .iter()
        .map(|file| {
            let lines = kept
                .iter()
                .filter_map(|&i| file.record(i))
                .flat_map(|r| [r.header, r.sequence, r.separator, r.quality]);
            Ok(FilteredArtifact {
                name: filtered_name(&file.name),
                format: file.format,
                data: encode_lines(lines, file.format, level)?,
            })
        })
        .collect()
}

/// Write artifacts into `dir`, creating it if needed.
pub async fn write_artifacts(
    dir: &Path,
    artifacts: &[FilteredArtifact],
) -> Result<Vec<PathBuf>, UploadError> {
    tokio::fs::create_dir_all(dir).await?;
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = dir.join(&artifact.name);
        tokio::fs::write(&path, &artifact.data).await?;
        info!(path = %path.display(), bytes = artifact.data.len(), "Wrote filtered file");
        written.push(path);
    }
    Ok(written)
}
