// src/interpreter/run.rs

//! Run: one pass of a formula through the pipeline

use super::archive::{extract_archive, verify_archive};
use super::build::{check_dependencies, prepare_build, run_build_commands, stage_sources, BuildLog};
use super::install::install_artifacts;
use super::selftest::self_test;
use super::{Interpreter, PipelineReport};
use crate::error::{Error, Result, Stage};
use crate::formula::{is_relative_subpath, validate_formula, Formula};
use crate::hash::{hash_file, Hash, HashAlgorithm};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// A single pipeline run
///
/// Owns a private workspace holding `downloads/` and, unless the caller
/// supplied one, `build/`.
pub(super) struct Run<'a> {
    interpreter: &'a Interpreter,
    formula: &'a Formula,
    checksum: Option<Hash>,
    workspace: TempDir,
    downloads: PathBuf,
    build_root: PathBuf,
    caller_build_root: bool,
    install_root: PathBuf,
    archive: Option<PathBuf>,
    archive_sha256: Option<Hash>,
    from_cache: bool,
    log: BuildLog,
    warnings: Vec<String>,
}

impl<'a> Run<'a> {
    pub(super) fn new(
        interpreter: &'a Interpreter,
        formula: &'a Formula,
        build_root: Option<&Path>,
        install_root: &Path,
    ) -> Result<Self> {
        // Hard errors only; the warnings are for whoever authored the formula
        validate_formula(formula)?;
        let checksum = formula
            .checksum()
            .map_err(|e| Error::InvalidFormula(format!("source checksum: {}", e)))?;

        let workspace = match &interpreter.config.work_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                TempDir::with_prefix_in("formulary-", dir)?
            }
            None => TempDir::with_prefix("formulary-")?,
        };

        let downloads = workspace.path().join("downloads");
        fs::create_dir_all(&downloads)?;

        let (build_root, caller_build_root) = match build_root {
            Some(dir) => (prepare_caller_build_root(dir)?, true),
            None => {
                let dir = workspace.path().join("build");
                fs::create_dir_all(&dir)?;
                (fs::canonicalize(&dir)?, false)
            }
        };

        fs::create_dir_all(install_root)?;
        let install_root = fs::canonicalize(install_root)?;

        Ok(Self {
            interpreter,
            formula,
            checksum,
            workspace,
            downloads,
            build_root,
            caller_build_root,
            install_root,
            archive: None,
            archive_sha256: None,
            from_cache: false,
            log: BuildLog::new(),
            warnings: Vec::new(),
        })
    }

    /// Run every stage in order and release the workspace
    ///
    /// The workspace is removed whether or not the stages succeed, unless
    /// the config asks to keep it.
    pub(super) fn execute(mut self) -> Result<PipelineReport> {
        let outcome = self.stages();

        let Run {
            formula,
            interpreter,
            workspace,
            build_root,
            caller_build_root,
            archive,
            archive_sha256,
            log,
            warnings,
            ..
        } = self;

        let kept = if interpreter.config.keep_build_root {
            let dir = workspace.keep();
            info!("Keeping run workspace at {}", dir.display());
            Some(dir)
        } else {
            drop(workspace);
            None
        };

        let (installed, self_test) = outcome?;

        let archive_name = archive
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let archive_sha256 = archive_sha256
            .ok_or_else(|| Error::Io(io::Error::other("archive digest missing after verify")))?;
        let build_root = if caller_build_root {
            Some(build_root)
        } else {
            kept.map(|dir| dir.join("build"))
        };

        Ok(PipelineReport {
            name: formula.package.name.clone(),
            version: formula.package.version.clone(),
            archive_name,
            archive_sha256,
            installed,
            self_test,
            build_root,
            log: log.into_string(),
            warnings,
        })
    }

    fn stages(&mut self) -> Result<(Vec<PathBuf>, Option<bool>)> {
        self.fetch()?;
        self.verify()?;
        self.extract()?;
        self.build()?;
        let installed = self.install()?;
        let self_test = self.self_test();
        Ok((installed, self_test))
    }

    fn marker(&mut self, stage: Stage, detail: &str) {
        self.log.line(&format!("[{}] {}", stage, detail));
    }

    fn fetch(&mut self) -> Result<()> {
        info!("Fetching source for {}", self.formula.display_name());
        let fetched =
            self.interpreter
                .fetch_source(self.formula, self.checksum.as_ref(), &self.downloads)?;

        self.from_cache = fetched.from_cache;
        let detail = if fetched.from_cache {
            format!("{} (cached)", fetched.path.display())
        } else {
            self.formula.source_url()
        };
        self.marker(Stage::Fetch, &detail);
        self.archive = Some(fetched.path);
        Ok(())
    }

    fn verify(&mut self) -> Result<()> {
        let archive = self.archive()?;
        let checksum = self.checksum.clone();
        info!("Verifying {}", archive.display());

        verify_archive(&archive, checksum.as_ref())?;

        match &checksum {
            Some(checksum) => {
                self.marker(Stage::Verify, &checksum.to_prefixed_string());
                if !self.from_cache {
                    self.interpreter.cache_source(checksum, &archive);
                }
            }
            None => {
                let warning = format!(
                    "{} has no checksum; source was not verified",
                    self.formula.display_name()
                );
                self.marker(Stage::Verify, "skipped (no checksum)");
                self.warnings.push(warning);
            }
        }

        let sha256 = match checksum {
            Some(checksum) if checksum.algorithm == HashAlgorithm::Sha256 => checksum,
            _ => hash_file(HashAlgorithm::Sha256, &archive)
                .map_err(|e| Error::verify(&archive, e))?,
        };
        self.archive_sha256 = Some(sha256);
        Ok(())
    }

    fn extract(&mut self) -> Result<()> {
        let archive = self.archive()?;
        info!("Extracting into {}", self.build_root.display());

        extract_archive(&archive, &self.build_root, self.formula.source.strip_components)?;
        let detail = format!("{} -> {}", archive.display(), self.build_root.display());
        self.marker(Stage::Extract, &detail);
        Ok(())
    }

    fn build(&mut self) -> Result<()> {
        let (formula, interpreter) = (self.formula, self.interpreter);
        let config = &interpreter.config;
        let build = &formula.build;

        if !build.dependencies.is_empty() {
            info!(
                "Checking build dependencies: {}",
                build.dependencies.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }
        check_dependencies(&build.dependencies, config.search_path.as_deref(), &self.build_root)?;

        for (what, dir) in [("stage_dir", &build.stage_dir), ("workdir", &build.workdir)] {
            if let Some(dir) = dir
                && !is_relative_subpath(&formula.substitute(dir, None, None))
            {
                return Err(Error::InvalidFormula(format!(
                    "{} must be a relative path inside the build root: {}",
                    what, dir
                )));
            }
        }

        if let Some(stage_dir) = &build.stage_dir {
            let stage_dir = formula.substitute(stage_dir, None, None);
            let staged = stage_sources(&self.build_root, &stage_dir)?;
            let detail = format!("staged sources into {}", staged.display());
            self.marker(Stage::Build, &detail);
        }

        let extra_env: Vec<(String, String)> = config
            .extra_env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let (env, commands) = prepare_build(
            formula,
            &self.build_root,
            &self.install_root,
            config.search_path.clone(),
            &extra_env,
            config.build_timeout,
        );

        if !commands.is_empty() && !env.workdir.is_dir() {
            return Err(Error::Build {
                command: commands.first().cloned().unwrap_or_default(),
                exit_code: None,
                stdout: String::new(),
                stderr: format!("working directory {} does not exist", env.workdir.display()),
            });
        }

        info!("Building {} ({} commands)", formula.display_name(), commands.len());
        run_build_commands(&commands, &env, &mut self.log)?;
        Ok(())
    }

    fn install(&mut self) -> Result<Vec<PathBuf>> {
        info!("Installing into {}", self.install_root.display());

        let artifacts: BTreeMap<String, String> = self
            .formula
            .install
            .iter()
            .map(|(from, to)| {
                (
                    self.formula.substitute(from, None, None),
                    self.formula.substitute(to, None, None),
                )
            })
            .collect();

        if artifacts.is_empty() {
            self.warnings
                .push(format!("{} installs no artifacts", self.formula.display_name()));
        }

        let installed = install_artifacts(&self.build_root, &artifacts, &self.install_root)?;
        for path in &installed {
            let detail = path.display().to_string();
            self.marker(Stage::Install, &detail);
        }
        Ok(installed)
    }

    fn self_test(&mut self) -> Option<bool> {
        let (formula, interpreter) = (self.formula, self.interpreter);
        let config = &interpreter.config;
        if !config.run_self_test {
            debug!("Self-test disabled");
            return None;
        }

        let command = formula.test.as_ref().map(|t| {
            formula.substitute(&t.command, Some(&self.build_root), Some(&self.install_root))
        });
        let path = config.path_with_prefix(&self.install_root.join("bin"));
        let passed = self_test(&self.install_root, command.as_deref(), path, config.test_timeout);

        let detail = if passed { "passed" } else { "FAILED" };
        self.marker(Stage::SelfTest, detail);
        if !passed {
            self.warnings
                .push(format!("self-test failed for {}", formula.display_name()));
        }
        Some(passed)
    }

    fn archive(&self) -> Result<PathBuf> {
        self.archive
            .clone()
            .ok_or_else(|| Error::Io(io::Error::other("no archive fetched")))
    }
}

/// Create (or accept an empty) caller-supplied build root
fn prepare_caller_build_root(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    if fs::read_dir(dir)?.next().is_some() {
        warn!("Build root {} is not empty", dir.display());
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("build root {} is not empty", dir.display()),
        )));
    }
    Ok(fs::canonicalize(dir)?)
}
