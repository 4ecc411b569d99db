// src/interpreter/mod.rs

//! Interpreter: runs formulas through the build pipeline
//!
//! A formula goes through six stages, strictly in order:
//! - Fetch the source archive (or reuse a cached copy)
//! - Verify it against the pinned checksum
//! - Extract it into a fresh build root
//! - Check build tools, then run the build commands
//! - Install the built artifacts into the install root
//! - Self-test the installed result
//!
//! The first failing stage ends the run with its error. Files already
//! installed are left in place; re-running is safe because installs
//! overwrite atomically.

pub mod archive;
pub mod build;
pub mod cache;
mod config;
pub mod exec;
pub mod fetch;
pub mod install;
mod run;
pub mod selftest;

pub use cache::SourceCache;
pub use config::{
    InterpreterConfig, PipelineReport, DEFAULT_BUILD_TIMEOUT, DEFAULT_HTTP_TIMEOUT,
    DEFAULT_TEST_TIMEOUT,
};
pub use fetch::Fetcher;

use crate::error::{Error, Result};
use crate::formula::{is_relative_subpath, validate_formula, Formula};
use crate::hash::Hash;
use archive::verify_archive;
use indicatif::ProgressBar;
use run::Run;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// An archive placed in a download directory
#[derive(Debug, Clone)]
pub(crate) struct FetchedSource {
    pub path: PathBuf,
    pub from_cache: bool,
}

/// The Interpreter: executes formulas
pub struct Interpreter {
    pub(crate) config: InterpreterConfig,
    fetcher: Fetcher,
    cache: Option<SourceCache>,
}

impl Interpreter {
    /// Create a new Interpreter with the given configuration
    pub fn new(config: InterpreterConfig) -> Result<Self> {
        let fetcher = Fetcher::new(config.http_timeout)?;
        let cache = config.source_cache.as_ref().map(SourceCache::new);
        Ok(Self {
            config,
            fetcher,
            cache,
        })
    }

    /// Create an Interpreter with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(InterpreterConfig::default())
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Show download progress on `pb`
    pub fn set_progress(&mut self, pb: ProgressBar) {
        self.fetcher.set_progress(pb);
    }

    /// Run a formula through the full pipeline into `install_root`
    ///
    /// Builds in a private workspace that is removed afterwards (unless
    /// `keep_build_root` is set). A failed self-test does not make this an
    /// error; check [`PipelineReport::succeeded`].
    pub fn run(&self, formula: &Formula, install_root: &Path) -> Result<PipelineReport> {
        info!(
            "Running {} version {}",
            formula.package.name, formula.package.version
        );
        Run::new(self, formula, None, install_root)?.execute()
    }

    /// Like [`run`](Self::run), but extract and build in `build_root`
    ///
    /// The directory must be empty or absent. It is left in place.
    pub fn run_in(
        &self,
        formula: &Formula,
        build_root: &Path,
        install_root: &Path,
    ) -> Result<PipelineReport> {
        info!(
            "Running {} version {} in {}",
            formula.package.name,
            formula.package.version,
            build_root.display()
        );
        Run::new(self, formula, Some(build_root), install_root)?.execute()
    }

    /// Fetch and verify a formula's source into `dest_dir` without building
    ///
    /// Useful for pre-warming a source cache or checking that a pinned
    /// checksum is still right.
    pub fn fetch_only(&self, formula: &Formula, dest_dir: &Path) -> Result<PathBuf> {
        info!(
            "Fetching source for {} version {}",
            formula.package.name, formula.package.version
        );
        validate_formula(formula)?;

        let checksum = formula
            .checksum()
            .map_err(|e| Error::InvalidFormula(format!("source checksum: {}", e)))?;

        let fetched = self.fetch_source(formula, checksum.as_ref(), dest_dir)?;
        if let Err(e) = verify_archive(&fetched.path, checksum.as_ref()) {
            let _ = fs::remove_file(&fetched.path);
            return Err(e);
        }

        if let Some(checksum) = &checksum
            && !fetched.from_cache
        {
            self.cache_source(checksum, &fetched.path);
        }

        Ok(fetched.path)
    }

    /// Run only the self-test against an existing install
    pub fn self_test(&self, formula: &Formula, install_root: &Path) -> bool {
        let command = formula
            .test
            .as_ref()
            .map(|t| formula.substitute(&t.command, None, Some(install_root)));
        let path = self.config.path_with_prefix(&install_root.join("bin"));
        selftest::self_test(install_root, command.as_deref(), path, self.config.test_timeout)
    }

    /// Place the formula's archive in `dest_dir`, from the cache if possible
    pub(crate) fn fetch_source(
        &self,
        formula: &Formula,
        checksum: Option<&Hash>,
        dest_dir: &Path,
    ) -> Result<FetchedSource> {
        let url = formula.source_url();
        fs::create_dir_all(dest_dir).map_err(|e| Error::fetch(&url, e))?;
        let dest = dest_dir.join(archive_name(formula));

        if let (Some(cache), Some(checksum)) = (&self.cache, checksum)
            && let Some(cached) = cache
                .lookup(checksum)
                .map_err(|e| Error::fetch(&url, format!("source cache: {}", e)))?
        {
            info!("Using cached source for {}", formula.display_name());
            fs::copy(&cached, &dest)
                .map_err(|e| Error::fetch(&url, format!("copy from source cache: {}", e)))?;
            return Ok(FetchedSource {
                path: dest,
                from_cache: true,
            });
        }

        let bytes = self.fetcher.fetch(&url, &dest)?;
        debug!("Fetched {} ({} bytes)", url, bytes);
        Ok(FetchedSource {
            path: dest,
            from_cache: false,
        })
    }

    /// Store a verified archive in the source cache, if one is configured
    ///
    /// A cache write failure only costs a future download, so it is logged
    /// and otherwise ignored.
    pub(crate) fn cache_source(&self, checksum: &Hash, archive: &Path) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.store(checksum, archive)
        {
            warn!("Failed to cache source: {}", e);
        }
    }
}

/// Local filename for the formula's archive
fn archive_name(formula: &Formula) -> String {
    let name = formula.archive_filename();
    if is_relative_subpath(&name) && !name.contains('/') {
        name
    } else {
        format!("{}.tar.gz", formula.display_name())
    }
}
