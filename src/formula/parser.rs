// src/formula/parser.rs

//! Formula file parsing and validation

use crate::error::{Error, Result};
use crate::formula::format::{is_relative_subpath, Formula, BUILTIN_VARIABLES};
use std::path::Path;

/// Parse a formula from a TOML string
pub fn parse_formula(content: &str) -> Result<Formula> {
    toml::from_str(content).map_err(|e| Error::Parse(format!("Invalid formula: {}", e)))
}

/// Parse a formula from a file
pub fn parse_formula_file(path: &Path) -> Result<Formula> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Parse(format!(
            "Failed to read formula file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_formula(&content)
}

/// Validate a formula for completeness and correctness
///
/// Hard errors are returned as `Error::InvalidFormula`; soft issues come
/// back as warnings.
pub fn validate_formula(formula: &Formula) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if formula.package.name.trim().is_empty() {
        return Err(Error::InvalidFormula(
            "package name cannot be empty".to_string(),
        ));
    }
    if formula.package.version.trim().is_empty() {
        return Err(Error::InvalidFormula(
            "package version cannot be empty".to_string(),
        ));
    }
    if formula.source.url.trim().is_empty() {
        return Err(Error::InvalidFormula("source url cannot be empty".to_string()));
    }

    match formula.checksum() {
        Ok(Some(hash)) if !hash.algorithm.is_cryptographic() => warnings.push(format!(
            "Checksum uses non-cryptographic {}; prefer sha256",
            hash.algorithm
        )),
        Ok(Some(_)) => {}
        Ok(None) => warnings.push("No source checksum; archive will not be verified".to_string()),
        Err(e) => {
            return Err(Error::InvalidFormula(format!("bad source checksum: {}", e)));
        }
    }

    for (what, dir) in [
        ("stage_dir", &formula.build.stage_dir),
        ("workdir", &formula.build.workdir),
    ] {
        if let Some(dir) = dir
            && !is_relative_subpath(dir)
        {
            return Err(Error::InvalidFormula(format!(
                "{} must be a relative path inside the build root: {}",
                what, dir
            )));
        }
    }

    for (built, installed) in &formula.install {
        if !is_relative_subpath(built) {
            return Err(Error::InvalidFormula(format!(
                "install source must be relative to the build root: {}",
                built
            )));
        }
        if !is_relative_subpath(installed) {
            return Err(Error::InvalidFormula(format!(
                "install destination must be relative to the install root: {}",
                installed
            )));
        }
    }

    for dep in &formula.build.dependencies {
        if dep.trim().is_empty() || dep.contains('/') {
            return Err(Error::InvalidFormula(format!(
                "build dependency must be a bare tool name: {:?}",
                dep
            )));
        }
    }

    for key in formula.variables.keys() {
        if BUILTIN_VARIABLES.contains(&key.as_str()) {
            warnings.push(format!("Variable '{}' shadows a built-in and is ignored", key));
        }
    }

    if formula.package.homepage.is_none() {
        warnings.push("Missing package homepage".to_string());
    }
    if formula.build.commands.is_empty() {
        warnings.push("No build commands specified".to_string());
    }
    if formula.install.is_empty() {
        warnings.push("No install artifacts specified".to_string());
    }
    if formula.test.is_none() {
        warnings.push("No test command specified".to_string());
    }

    Ok(warnings)
}
