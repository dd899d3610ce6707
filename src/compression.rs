//! Container format support for read files.
//!
//! Read files arrive either as plain text or gzip-compressed. The format is
//! detected from the file name suffix only; declared MIME types are absent or
//! wrong often enough that they are never consulted.

use crate::error::UploadError;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::path::Path;

/// The container a read file is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Plain,
    Gzip,
}

impl FileFormat {
    /// Detect the format from a file name (`*.gz`, case-insensitive).
    pub fn from_name(name: &str) -> Self {
        match name.rsplit_once('.') {
            Some((_, ext)) if ext.eq_ignore_ascii_case("gz") => FileFormat::Gzip,
            _ => FileFormat::Plain,
        }
    }

    /// Detect the format from a path. Non-UTF-8 file names are converted
    /// lossily, which leaves the suffix intact.
    pub fn from_path(path: &Path) -> Self {
        path.file_name()
            .map(|n| Self::from_name(&n.to_string_lossy()))
            .unwrap_or(FileFormat::Plain)
    }

    /// Wrap raw file content in a reader that yields the decoded text bytes.
    pub fn reader<'a>(self, raw: &'a [u8]) -> Box<dyn Read + 'a> {
        match self {
            FileFormat::Plain => Box::new(raw),
            FileFormat::Gzip => Box::new(MultiGzDecoder::new(raw)),
        }
    }

    /// Decode raw file content into UTF-8 text.
    pub fn decode(self, raw: &[u8]) -> Result<String, UploadError> {
        let mut text = String::with_capacity(raw.len());
        self.reader(raw).read_to_string(&mut text).map_err(|e| match self {
            FileFormat::Gzip => {
                UploadError::CompressionError(format!("Failed to decompress gzip data: {}", e))
            }
            FileFormat::Plain => UploadError::Io(e),
        })?;
        Ok(text)
    }

    /// Encode text into this container format.
    ///
    /// `level` is the gzip compression level (0-9) and is ignored for plain text.
    pub fn encode(self, text: &[u8], level: u32) -> Result<Vec<u8>, UploadError> {
        match self {
            FileFormat::Plain => Ok(text.to_vec()),
            FileFormat::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
                encoder.write_all(text).map_err(|e| {
                    UploadError::CompressionError(format!("Failed to compress data: {}", e))
                })?;
                encoder.finish().map_err(|e| {
                    UploadError::CompressionError(format!("Failed to finish gzip stream: {}", e))
                })
            }
        }
    }
}
