// src/interpreter/build.rs

//! Build stage: dependency checks, source staging, and build commands

use super::exec::run_shell;
use crate::error::{Error, Result};
use crate::formula::Formula;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const STAGING_SCRATCH: &str = ".formulary-staging";

/// Accumulated build output, one section per command
#[derive(Debug, Default, Clone)]
pub struct BuildLog {
    text: String,
}

impl BuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single line
    pub fn line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    /// Append a command's output under a header
    pub fn command_output(&mut self, command: &str, stdout: &str, stderr: &str) {
        self.line(&format!("=== {} ===", command));
        for chunk in [stdout, stderr] {
            if !chunk.is_empty() {
                self.text.push_str(chunk);
                if !chunk.ends_with('\n') {
                    self.text.push('\n');
                }
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Everything a build command needs besides the command text
#[derive(Debug, Clone)]
pub struct BuildEnv {
    /// Working directory for every command
    pub workdir: PathBuf,
    /// Environment added on top of the inherited one
    pub vars: Vec<(String, String)>,
    /// Per-command timeout
    pub timeout: Duration,
}

/// Check that every build dependency resolves on the execution path
///
/// `search_path` pins the path; `None` searches the inherited `PATH`.
pub fn check_dependencies<'a>(
    dependencies: impl IntoIterator<Item = &'a String>,
    search_path: Option<&str>,
    cwd: &Path,
) -> Result<()> {
    for tool in dependencies {
        let found = match search_path {
            Some(path) => which::which_in(tool, Some(path), cwd),
            None => which::which(tool),
        };
        match found {
            Ok(location) => debug!("Build dependency {} -> {}", tool, location.display()),
            Err(_) => return Err(Error::DependencyMissing { tool: tool.clone() }),
        }
    }
    Ok(())
}

/// Move everything in `build_root` into `build_root/stage_dir`
///
/// Gives builds that expect a particular source layout (a GOPATH-style
/// `src/<host>/<org>/<repo>` tree, say) the layout they want. Entries are
/// parked in a scratch directory first, so a source tree that already has
/// a top-level directory named like the first `stage_dir` component still
/// moves cleanly.
pub fn stage_sources(build_root: &Path, stage_dir: &str) -> Result<PathBuf> {
    let target = build_root.join(stage_dir);
    move_into(build_root, &target).map_err(|e| Error::Build {
        command: format!("stage sources into {}", stage_dir),
        exit_code: None,
        stdout: String::new(),
        stderr: e.to_string(),
    })?;

    debug!("Staged sources into {}", target.display());
    Ok(target)
}

fn move_into(build_root: &Path, target: &Path) -> std::io::Result<()> {
    let scratch = build_root.join(STAGING_SCRATCH);

    let entries = fs::read_dir(build_root)?
        .map(|e| e.map(|e| e.file_name()))
        .collect::<std::io::Result<Vec<_>>>()?;

    fs::create_dir(&scratch)?;
    for name in entries {
        fs::rename(build_root.join(&name), scratch.join(&name))?;
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(&scratch, target)
}

/// Run build commands in order, stopping at the first failure
///
/// Output of every command (including the failing one) lands in `log`.
pub fn run_build_commands(commands: &[String], env: &BuildEnv, log: &mut BuildLog) -> Result<()> {
    for command in commands {
        info!("Running: {}", command);

        let output = run_shell(command, &env.workdir, &env.vars, env.timeout).map_err(|e| {
            Error::Build {
                command: command.clone(),
                exit_code: None,
                stdout: String::new(),
                stderr: format!("failed to spawn shell: {}", e),
            }
        })?;

        log.command_output(command, &output.stdout, &output.stderr);
        for line in output.stdout.lines().chain(output.stderr.lines()) {
            debug!("[build] {}", line);
        }

        if !output.success() {
            return Err(Error::Build {
                command: command.clone(),
                exit_code: output.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
    }

    Ok(())
}

/// Substituted environment and commands for one formula build
pub fn prepare_build(
    formula: &Formula,
    build_root: &Path,
    install_root: &Path,
    path: Option<String>,
    extra_env: &[(String, String)],
    timeout: Duration,
) -> (BuildEnv, Vec<String>) {
    let sub = |s: &str| formula.substitute(s, Some(build_root), Some(install_root));

    let workdir = match &formula.build.workdir {
        Some(dir) => build_root.join(sub(dir)),
        None => build_root.to_path_buf(),
    };

    let mut vars = Vec::new();
    if let Some(path) = path {
        vars.push(("PATH".to_string(), path));
    }
    for (key, value) in &formula.build.environment {
        vars.push((key.clone(), sub(value)));
    }
    vars.extend(extra_env.iter().cloned());

    let commands = formula.build.commands.iter().map(|c| sub(c)).collect();

    (
        BuildEnv {
            workdir,
            vars,
            timeout,
        },
        commands,
    )
}
