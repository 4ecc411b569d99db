// src/compression.rs
//! Compression detection and streaming decoders for source archives
//!
//! Source tarballs come plain or compressed with gzip, xz or zstd. The format
//! is sniffed from magic bytes first and falls back to the file extension.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;

/// Offset of the `ustar` magic inside a tar header block
const TAR_MAGIC_OFFSET: usize = 257;

/// Compression-related errors
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to create {format} decoder: {source}")]
    DecoderCreation {
        format: &'static str,
        source: io::Error,
    },

    #[error("Failed to read archive header: {0}")]
    Header(#[from] io::Error),

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),
}

/// Supported compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// No compression (raw tar)
    None,
    /// Gzip compression (.gz, .tgz)
    Gzip,
    /// XZ/LZMA compression (.xz, .txz)
    Xz,
    /// Zstandard compression (.zst)
    Zstd,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    ///
    /// # Examples
    /// ```
    /// use formulary::compression::CompressionFormat;
    ///
    /// assert_eq!(CompressionFormat::from_extension("v0.8.tar.gz"), Some(CompressionFormat::Gzip));
    /// assert_eq!(CompressionFormat::from_extension("src.txz"), Some(CompressionFormat::Xz));
    /// assert_eq!(CompressionFormat::from_extension("src.tar"), Some(CompressionFormat::None));
    /// assert_eq!(CompressionFormat::from_extension("src.zip"), None);
    /// ```
    pub fn from_extension(path: &str) -> Option<Self> {
        if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Some(Self::Gzip)
        } else if path.ends_with(".tar.xz") || path.ends_with(".txz") {
            Some(Self::Xz)
        } else if path.ends_with(".tar.zst") || path.ends_with(".tzst") {
            Some(Self::Zstd)
        } else if path.ends_with(".tar") {
            Some(Self::None)
        } else {
            None
        }
    }

    /// Detect compression format from magic bytes
    ///
    /// Magic bytes:
    /// - Gzip: `1f 8b`
    /// - XZ: `fd 37 7a 58 5a 00`
    /// - Zstd: `28 b5 2f fd`
    /// - Plain tar: `ustar` at offset 257
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x1f, 0x8b]) {
            Some(Self::Gzip)
        } else if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Some(Self::Xz)
        } else if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Some(Self::Zstd)
        } else if data.len() >= TAR_MAGIC_OFFSET + 5
            && &data[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5] == b"ustar"
        {
            Some(Self::None)
        } else {
            None
        }
    }

    /// Detect the format of an archive on disk
    ///
    /// Magic bytes win over the extension, since download URLs often lie.
    pub fn detect(path: &Path) -> Result<Self, CompressionError> {
        let mut header = Vec::with_capacity(512);
        File::open(path)?.take(512).read_to_end(&mut header)?;

        if let Some(format) = Self::from_magic_bytes(&header) {
            return Ok(format);
        }

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        Self::from_extension(name)
            .ok_or_else(|| CompressionError::UnsupportedFormat(name.to_string()))
    }

    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Create a decompressing reader for the given format
///
/// For `CompressionFormat::None`, returns the reader unchanged.
pub fn create_decoder<'a, R: Read + 'a>(
    reader: R,
    format: CompressionFormat,
) -> Result<Box<dyn Read + 'a>, CompressionError> {
    match format {
        CompressionFormat::None => Ok(Box::new(reader)),
        CompressionFormat::Gzip => Ok(Box::new(flate2::read::GzDecoder::new(reader))),
        CompressionFormat::Xz => Ok(Box::new(xz2::read::XzDecoder::new(reader))),
        CompressionFormat::Zstd => {
            let decoder =
                zstd::Decoder::new(reader).map_err(|e| CompressionError::DecoderCreation {
                    format: "zstd",
                    source: e,
                })?;
            Ok(Box::new(decoder))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0x1f, 0x8b, 0x08, 0x00]),
            Some(CompressionFormat::Gzip)
        );
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]),
            Some(CompressionFormat::Xz)
        );
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0x28, 0xb5, 0x2f, 0xfd]),
            Some(CompressionFormat::Zstd)
        );
        assert_eq!(CompressionFormat::from_magic_bytes(&[0x1f]), None);
        assert_eq!(CompressionFormat::from_magic_bytes(b"PK\x03\x04"), None);
    }

    #[test]
    fn test_plain_tar_magic() {
        let mut header = vec![0u8; 512];
        header[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5].copy_from_slice(b"ustar");
        assert_eq!(
            CompressionFormat::from_magic_bytes(&header),
            Some(CompressionFormat::None)
        );
    }

    #[test]
    fn test_detect_prefers_magic_over_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("misnamed.tar.xz");
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"payload").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        assert_eq!(CompressionFormat::detect(&path).unwrap(), CompressionFormat::Gzip);
    }

    #[test]
    fn test_detect_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.zip");
        std::fs::write(&path, b"PK\x03\x04 not a tarball").unwrap();

        assert!(matches!(
            CompressionFormat::detect(&path),
            Err(CompressionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_gzip_decoder_roundtrip() {
        // Minimal gzip of "hello"
        let gzip_data: &[u8] = &[
            0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xcb, 0x48, 0xcd, 0xc9,
            0xc9, 0x07, 0x00, 0x86, 0xa6, 0x10, 0x36, 0x05, 0x00, 0x00, 0x00,
        ];
        let mut decoder = create_decoder(gzip_data, CompressionFormat::Gzip).unwrap();
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
    }
}
