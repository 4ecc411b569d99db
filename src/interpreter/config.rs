// src/interpreter/config.rs

//! Configuration and result types for the formula interpreter

use crate::hash::Hash;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for a single build command (1 hour)
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default timeout for the post-install self-test
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for source downloads
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for the Interpreter
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Parent directory for run workspaces (system temp dir when unset)
    pub work_dir: Option<PathBuf>,
    /// Checksum-keyed cache for downloaded archives (disabled when unset)
    pub source_cache: Option<PathBuf>,
    /// Execution path used to find build dependencies and to run build
    /// commands; inherits `PATH` when unset
    pub search_path: Option<String>,
    /// Extra environment for every build command
    pub extra_env: BTreeMap<String, String>,
    /// Timeout for each build command
    pub build_timeout: Duration,
    /// Timeout for the self-test command
    pub test_timeout: Duration,
    /// Timeout for HTTP downloads
    pub http_timeout: Duration,
    /// Keep the run workspace after completion (for debugging)
    pub keep_build_root: bool,
    /// Run the formula's test command after install
    pub run_self_test: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            source_cache: None,
            search_path: None,
            extra_env: BTreeMap::new(),
            build_timeout: DEFAULT_BUILD_TIMEOUT,
            test_timeout: DEFAULT_TEST_TIMEOUT,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            keep_build_root: false,
            run_self_test: true,
        }
    }
}

impl InterpreterConfig {
    /// Use a checksum-keyed source cache
    pub fn with_source_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_cache = Some(dir.into());
        self
    }

    /// Pin the execution path instead of inheriting `PATH`
    pub fn with_search_path(mut self, path: impl Into<String>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    /// Create run workspaces under `dir`
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Execution path for build commands: the pinned one or the inherited `PATH`
    pub fn effective_path(&self) -> Option<String> {
        self.search_path
            .clone()
            .or_else(|| std::env::var("PATH").ok())
    }

    /// Execution path with `dir` searched first
    pub fn path_with_prefix(&self, dir: &Path) -> String {
        match self.effective_path() {
            Some(rest) if !rest.is_empty() => format!("{}:{}", dir.display(), rest),
            _ => dir.display().to_string(),
        }
    }
}

/// Result of a completed pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Package name
    pub name: String,
    /// Package version
    pub version: String,
    /// Filename of the fetched archive
    pub archive_name: String,
    /// SHA-256 of the fetched archive, whether or not the formula pins one
    pub archive_sha256: Hash,
    /// Installed files, absolute, in install order
    pub installed: Vec<PathBuf>,
    /// Self-test outcome; `None` when the self-test was skipped by config
    pub self_test: Option<bool>,
    /// Build root, when it outlives the run (kept or caller-owned)
    pub build_root: Option<PathBuf>,
    /// Build log: stage markers plus captured command output
    pub log: String,
    /// Warnings generated during the run
    pub warnings: Vec<String>,
}

impl PipelineReport {
    /// Whether every stage succeeded, including a self-test that ran
    pub fn succeeded(&self) -> bool {
        self.self_test != Some(false)
    }
}
