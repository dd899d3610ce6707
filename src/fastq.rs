//! FASTQ read files and records.
//!
//! A read file is held in memory as its decoded lines. Record `i` is the four
//! lines `[4i, 4i + 4)`: header, sequence, separator and quality. Records are
//! borrowed views into the file, so batching never copies read data until the
//! batch is serialized onto the wire.

use crate::compression::FileFormat;
use crate::error::UploadError;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::path::Path;

/// Number of lines making up one FASTQ record.
pub const LINES_PER_RECORD: usize = 4;

/// One decoded input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFile {
    /// Base name of the file, as sent to the server and used for output naming.
    pub name: String,
    pub format: FileFormat,
    pub lines: Vec<String>,
}

/// A borrowed FASTQ record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRecord<'a> {
    pub header: &'a str,
    pub sequence: &'a str,
    pub separator: &'a str,
    pub quality: &'a str,
}

impl ReadFile {
    /// Decode raw file content. The container format is detected from `name`.
    pub fn decode(name: impl Into<String>, raw: &[u8]) -> Result<Self, UploadError> {
        let name = name.into();
        let format = FileFormat::from_name(&name);
        Self::decode_as(name, format, raw)
    }

    fn decode_as(name: String, format: FileFormat, raw: &[u8]) -> Result<Self, UploadError> {
        let text = format.decode(raw)?;
        Ok(Self {
            name,
            format,
            lines: split_lines(&text),
        })
    }

    /// Read and decode a file from disk.
    ///
    /// The format is detected from the path itself, so a file name that is
    /// not valid UTF-8 still decodes in the right container format.
    pub async fn open(path: &Path) -> Result<Self, UploadError> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => {}
            _ => return Err(UploadError::FileNotFound(path.to_path_buf())),
        }
        let raw = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self::decode_as(name, FileFormat::from_path(path), &raw)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Number of complete records in the file.
    pub fn read_count(&self) -> usize {
        self.lines.len() / LINES_PER_RECORD
    }

    /// The record at `index`, or `None` past the last complete record.
    pub fn record(&self, index: usize) -> Option<ReadRecord<'_>> {
        let start = index.checked_mul(LINES_PER_RECORD)?;
        let end = start.checked_add(LINES_PER_RECORD)?;
        let lines = self.lines.get(start..end)?;
        Some(ReadRecord {
            header: &lines[0],
            sequence: &lines[1],
            separator: &lines[2],
            quality: &lines[3],
        })
    }

    /// The header line of record `index`.
    pub fn header(&self, index: usize) -> Option<&str> {
        self.record(index).map(|r| r.header)
    }
}

// On the wire a record is a plain list of its four lines.
impl Serialize for ReadRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(LINES_PER_RECORD))?;
        seq.serialize_element(self.header)?;
        seq.serialize_element(self.sequence)?;
        seq.serialize_element(self.separator)?;
        seq.serialize_element(self.quality)?;
        seq.end()
    }
}

/// Split decoded text into lines after trimming trailing whitespace.
///
/// A `\r` left over from CRLF line endings is stripped from every line.
pub fn split_lines(text: &str) -> Vec<String> {
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// Encode selected lines into the given container format.
pub fn encode_lines<'a, I>(lines: I, format: FileFormat, level: u32) -> Result<Vec<u8>, UploadError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    format.encode(text.as_bytes(), level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TWO_READS: &str = "@r1\nACGT\n+\nIIII\n@r2\nGGCC\n+\nJJJJ\n";

    #[test]
    fn test_decode_plain() {
        let file = ReadFile::decode("reads.fastq", TWO_READS.as_bytes()).unwrap();
        assert_eq!(file.format, FileFormat::Plain);
        assert_eq!(file.line_count(), 8);
        assert_eq!(file.read_count(), 2);
        assert_eq!(file.header(1), Some("@r2"));
    }

    #[test]
    fn test_decode_gzip_by_suffix() {
        let compressed = FileFormat::Gzip.encode(TWO_READS.as_bytes(), 6).unwrap();
        let file = ReadFile::decode("reads.fastq.gz", &compressed).unwrap();
        assert_eq!(file.format, FileFormat::Gzip);
        assert_eq!(file.read_count(), 2);
        assert_eq!(file.record(0).unwrap().sequence, "ACGT");
    }

    #[test]
    fn test_trailing_whitespace_is_trimmed() {
        let file = ReadFile::decode("reads.fastq", b"@r1\nACGT\n+\nIIII\n\n\n  \n").unwrap();
        assert_eq!(file.line_count(), 4);
    }

    #[test]
    fn test_crlf_line_endings() {
        let file = ReadFile::decode("reads.fastq", b"@r1\r\nACGT\r\n+\r\nIIII\r\n").unwrap();
        let record = file.record(0).unwrap();
        assert_eq!(record.header, "@r1");
        assert_eq!(record.quality, "IIII");
    }

    #[test]
    fn test_empty_file_has_no_lines() {
        let file = ReadFile::decode("empty.fastq", b"\n").unwrap();
        assert_eq!(file.line_count(), 0);
        assert_eq!(file.read_count(), 0);
    }

    #[test]
    fn test_record_out_of_range() {
        let file = ReadFile::decode("reads.fastq", TWO_READS.as_bytes()).unwrap();
        assert!(file.record(2).is_none());
        assert!(file.record(usize::MAX).is_none());
    }

    #[test]
    fn test_incomplete_trailing_record_is_not_a_record() {
        let file = ReadFile::decode("reads.fastq", b"@r1\nACGT\n+\nIIII\n@r2\nGG").unwrap();
        assert_eq!(file.line_count(), 6);
        assert_eq!(file.read_count(), 1);
        assert!(file.record(1).is_none());
    }

    #[test]
    fn test_record_serializes_as_line_list() {
        let file = ReadFile::decode("reads.fastq", TWO_READS.as_bytes()).unwrap();
        let json = serde_json::to_string(&file.record(0).unwrap()).unwrap();
        assert_eq!(json, r#"["@r1","ACGT","+","IIII"]"#);
    }

    #[test]
    fn test_encode_lines_gzip() {
        let bytes = encode_lines(["@r1", "ACGT", "+", "IIII"], FileFormat::Gzip, 6).unwrap();
        let text = FileFormat::Gzip.decode(&bytes).unwrap();
        assert_eq!(text, "@r1\nACGT\n+\nIIII\n");
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample_R1.fastq");
        std::fs::write(&path, TWO_READS).unwrap();

        let file = ReadFile::open(&path).await.unwrap();
        assert_eq!(file.name, "sample_R1.fastq");
        assert_eq!(file.read_count(), 2);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = ReadFile::open(&dir.path().join("missing.fastq")).await;
        assert!(matches!(result, Err(UploadError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_open_directory_is_not_a_read_file() {
        let dir = tempdir().unwrap();
        let result = ReadFile::open(dir.path()).await;
        assert!(matches!(result, Err(UploadError::FileNotFound(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_open_gzip_with_non_utf8_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"reads\xff.fq.gz"));
        let compressed = FileFormat::Gzip.encode(TWO_READS.as_bytes(), 6).unwrap();
        std::fs::write(&path, compressed).unwrap();

        let file = ReadFile::open(&path).await.unwrap();

        assert_eq!(file.format, FileFormat::Gzip);
        assert_eq!(file.read_count(), 2);
        assert!(file.name.ends_with(".fq.gz"));
    }
}
