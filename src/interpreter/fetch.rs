// src/interpreter/fetch.rs

//! Source archive download
//!
//! `http(s)://` URLs go through a blocking reqwest client and are streamed
//! to disk. `file://` URLs and bare paths are copied, which is how local
//! mirrors and tests feed archives in.

use crate::error::{Error, Result};
use indicatif::ProgressBar;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Where a source URL points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Remote(String),
    Local(PathBuf),
}

impl SourceLocation {
    /// Classify a URL; anything without an http(s) scheme is a local path
    pub fn parse(url: &str) -> Self {
        if url.starts_with("http://") || url.starts_with("https://") {
            Self::Remote(url.to_string())
        } else if let Some(path) = url.strip_prefix("file://") {
            Self::Local(PathBuf::from(path))
        } else {
            Self::Local(PathBuf::from(url))
        }
    }
}

/// Stream an HTTP response to a file, updating the progress bar if given
fn stream_response_to_file(
    mut response: reqwest::blocking::Response,
    file: &mut File,
    progress_bar: Option<&ProgressBar>,
    url: &str,
) -> Result<u64> {
    if let Some(pb) = progress_bar {
        match response.content_length() {
            Some(total) => pb.set_length(total),
            None => pb.set_message(format!("{} (unknown size)", url)),
        }
        pb.set_position(0);
    }

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| Error::fetch(url, format!("failed to read response: {}", e)))?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| Error::fetch(url, format!("failed to write data: {}", e)))?;

        downloaded += bytes_read as u64;

        if let Some(pb) = progress_bar {
            pb.set_position(downloaded);
        }
    }

    Ok(downloaded)
}

/// Downloads source archives
pub struct Fetcher {
    client: Client,
    progress: Option<ProgressBar>,
}

impl Fetcher {
    /// Create a fetcher whose HTTP requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("formulary/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Init(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            progress: None,
        })
    }

    /// Report download progress on `pb`
    pub fn set_progress(&mut self, pb: ProgressBar) {
        self.progress = Some(pb);
    }

    /// Fetch `url` into `dest`, returning the number of bytes written
    ///
    /// Data lands in a `.part` file first and is renamed into place, so
    /// `dest` never holds a truncated archive.
    pub fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::fetch(url, e))?;
        }
        let partial = dest.with_extension("part");

        let written = match SourceLocation::parse(url) {
            SourceLocation::Remote(url) => self.fetch_remote(&url, &partial),
            SourceLocation::Local(path) => fetch_local(url, &path, &partial),
        };

        match written {
            Ok(bytes) => {
                fs::rename(&partial, dest).map_err(|e| Error::fetch(url, e))?;
                debug!("Fetched {} bytes to {}", bytes, dest.display());
                Ok(bytes)
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }

    fn fetch_remote(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("Downloading: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url, format!("HTTP {}", status)));
        }

        let mut file = File::create(dest).map_err(|e| Error::fetch(url, e))?;
        let written = stream_response_to_file(response, &mut file, self.progress.as_ref(), url)?;
        file.sync_all().map_err(|e| Error::fetch(url, e))?;

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }

        Ok(written)
    }
}

fn fetch_local(url: &str, source: &Path, dest: &Path) -> Result<u64> {
    info!("Copying local source: {}", source.display());

    if !source.is_file() {
        return Err(Error::fetch(url, "no such file"));
    }
    fs::copy(source, dest).map_err(|e| Error::fetch(url, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_location_parse() {
        assert_eq!(
            SourceLocation::parse("https://example.com/a.tar.gz"),
            SourceLocation::Remote("https://example.com/a.tar.gz".to_string())
        );
        assert_eq!(
            SourceLocation::parse("file:///srv/mirror/a.tar.gz"),
            SourceLocation::Local(PathBuf::from("/srv/mirror/a.tar.gz"))
        );
        assert_eq!(
            SourceLocation::parse("/srv/mirror/a.tar.gz"),
            SourceLocation::Local(PathBuf::from("/srv/mirror/a.tar.gz"))
        );
    }

    #[test]
    fn test_fetch_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.tar.gz");
        fs::write(&source, b"archive bytes").unwrap();

        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();
        let dest = dir.path().join("downloads").join("src.tar.gz");
        let url = format!("file://{}", source.display());

        assert_eq!(fetcher.fetch(&url, &dest).unwrap(), 13);
        assert_eq!(fs::read(&dest).unwrap(), b"archive bytes");
        assert!(!dest.with_extension("part").exists());
    }

    #[test]
    fn test_fetch_missing_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch("/nonexistent/src.tar.gz", &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
        assert!(!dir.path().join("out").exists());
    }
}
