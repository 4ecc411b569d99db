// src/error.rs

//! Error types for formula loading and the install pipeline

use crate::hash::HashAlgorithm;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetch,
    Verify,
    Extract,
    Build,
    Install,
    SelfTest,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 6] = [
        Stage::Fetch,
        Stage::Verify,
        Stage::Extract,
        Stage::Build,
        Stage::Install,
        Stage::SelfTest,
    ];

    /// Get the stage name as a string
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Verify => "verify",
            Self::Extract => "extract",
            Self::Build => "build",
            Self::Install => "install",
            Self::SelfTest => "self-test",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while loading a formula or running its pipeline
///
/// Every stage error is terminal for the run that produced it.
#[derive(Error, Debug)]
pub enum Error {
    /// Source archive could not be downloaded
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Downloaded archive does not match the formula checksum
    #[error("verify failed: {algorithm} mismatch: expected {expected}, got {actual}")]
    Integrity {
        algorithm: HashAlgorithm,
        expected: String,
        actual: String,
    },

    /// Archive could not be read for verification
    #[error("verify failed for {}: {reason}", .archive.display())]
    Verify { archive: PathBuf, reason: String },

    /// Archive is corrupt, unsupported, or escapes the build root
    #[error("extract failed for {}: {reason}", .archive.display())]
    Extraction { archive: PathBuf, reason: String },

    /// A required build tool is not on the execution path
    #[error("build failed: required tool not found: {tool}")]
    DependencyMissing { tool: String },

    /// A build command exited non-zero or timed out
    #[error("build failed: `{command}` {}\nstderr: {stderr}", exit_description(.exit_code))]
    Build {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// An artifact could not be installed
    #[error("install failed for {}: {reason}", .artifact.display())]
    Install { artifact: PathBuf, reason: String },

    /// Formula file is not valid TOML or has the wrong shape
    #[error("parse error: {0}")]
    Parse(String),

    /// Formula parsed but violates an invariant
    #[error("invalid formula: {0}")]
    InvalidFormula(String),

    /// Interpreter could not be set up (e.g. HTTP client construction)
    #[error("initialization error: {0}")]
    Init(String),

    /// I/O error outside a specific stage
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated (timeout or signal)".to_string(),
    }
}

impl Error {
    /// Pipeline stage this error belongs to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Fetch { .. } => Some(Stage::Fetch),
            Self::Integrity { .. } | Self::Verify { .. } => Some(Stage::Verify),
            Self::Extraction { .. } => Some(Stage::Extract),
            Self::DependencyMissing { .. } | Self::Build { .. } => Some(Stage::Build),
            Self::Install { .. } => Some(Stage::Install),
            Self::Parse(_) | Self::InvalidFormula(_) | Self::Init(_) | Self::Io(_) => None,
        }
    }

    pub(crate) fn fetch(url: &str, reason: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn verify(archive: &std::path::Path, reason: impl fmt::Display) -> Self {
        Self::Verify {
            archive: archive.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn extraction(archive: &std::path::Path, reason: impl fmt::Display) -> Self {
        Self::Extraction {
            archive: archive.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn install(artifact: &std::path::Path, reason: impl fmt::Display) -> Self {
        Self::Install {
            artifact: artifact.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}
