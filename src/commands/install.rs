// src/commands/install.rs

//! Install command - run a formula through the full pipeline

use anyhow::{bail, Context, Result};
use formulary::{validate_formula, Interpreter, InterpreterConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Options for `formulary install`
pub struct InstallOptions {
    pub formula_path: String,
    pub prefix: String,
    pub build_root: Option<String>,
    pub keep_build_root: bool,
    pub source_cache: Option<String>,
    pub path: Option<String>,
    pub timeout: Option<u64>,
    pub skip_test: bool,
}

/// Build a formula and install it under `prefix`
///
/// Fails on any stage error, and on a self-test that ran and failed.
pub fn cmd_install(opts: InstallOptions) -> Result<()> {
    let formula = super::load_formula(&opts.formula_path)?;
    println!("Formula: {} version {}", formula.package.name, formula.package.version);

    let warnings = validate_formula(&formula).with_context(|| "Formula validation failed")?;
    for warning in &warnings {
        println!("Warning: {}", warning);
    }

    let mut config = InterpreterConfig {
        keep_build_root: opts.keep_build_root,
        run_self_test: !opts.skip_test,
        ..Default::default()
    };
    if let Some(cache) = &opts.source_cache {
        config = config.with_source_cache(cache);
    }
    if let Some(path) = &opts.path {
        config = config.with_search_path(path);
    }
    if let Some(secs) = opts.timeout {
        config.build_timeout = Duration::from_secs(secs);
    }

    let mut interpreter =
        Interpreter::new(config).with_context(|| "Failed to set up interpreter")?;
    interpreter.set_progress(download_bar());

    let prefix = Path::new(&opts.prefix);
    let report = match &opts.build_root {
        Some(build_root) => interpreter.run_in(&formula, Path::new(build_root), prefix),
        None => interpreter.run(&formula, prefix),
    }
    .with_context(|| format!("Failed to install {}", formula.display_name()))?;

    println!("\n[COMPLETE] Installed {} file(s):", report.installed.len());
    for path in &report.installed {
        println!("  - {}", path.display());
    }
    println!("Source sha256: {}", report.archive_sha256);

    if let Some(dir) = &report.build_root {
        println!("Build root: {}", dir.display());
    }

    if !report.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
    }

    match report.self_test {
        Some(true) => println!("[OK] Self-test passed"),
        Some(false) => bail!("Self-test failed for {}", formula.display_name()),
        None => println!("Self-test skipped"),
    }

    info!("Successfully installed {} to {}", formula.display_name(), prefix.display());
    Ok(())
}

fn download_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
