//! Pre-flight validation of read files.
//!
//! Validation runs once, before a context is opened on the server, so a
//! structurally broken upload never causes any network traffic.

use crate::error::UploadError;
use crate::fastq::{ReadFile, LINES_PER_RECORD};

/// Most files one sequencing unit may consist of (paired-end).
pub const MAX_FILES: usize = 2;

/// Check that `files` form a valid single-end or paired-end unit.
///
/// Returns the number of reads (read pairs for paired-end data).
pub fn validate(files: &[ReadFile]) -> Result<usize, UploadError> {
    if files.is_empty() {
        return Err(UploadError::PairMismatch(
            "No read files selected, please select one read file or two read files for paired-end sequencing".to_string(),
        ));
    }
    if files.len() > MAX_FILES {
        return Err(UploadError::PairMismatch(format!(
            "{} files selected, strobe reads are currently not supported, please use one read file or two read files for paired-end sequencing",
            files.len()
        )));
    }

    for file in files {
        if file.line_count() % LINES_PER_RECORD != 0 {
            return Err(UploadError::MalformedFile {
                file: file.name.clone(),
                line_count: file.line_count(),
            });
        }
    }

    let read_count = files[0].read_count();
    if let Some(mismatch) = files.iter().find(|f| f.read_count() != read_count) {
        return Err(UploadError::PairMismatch(format!(
            "{} has {} reads but {} has {}",
            files[0].name,
            read_count,
            mismatch.name,
            mismatch.read_count()
        )));
    }

    Ok(read_count)
}
