// src/commands/fetch.rs

//! Fetch command - download and verify a formula's source

use anyhow::{Context, Result};
use formulary::hash::{hash_file, HashAlgorithm};
use formulary::{Interpreter, InterpreterConfig};
use std::path::Path;

/// Fetch a formula's source archive into `dest`
///
/// Prints the archive path and its checksum, in the algorithm the formula
/// pins (SHA-256 when it pins none).
pub fn cmd_fetch(formula_path: &str, dest: &str, source_cache: Option<&str>) -> Result<()> {
    let formula = super::load_formula(formula_path)?;

    let mut config = InterpreterConfig::default();
    if let Some(cache) = source_cache {
        config = config.with_source_cache(cache);
    }
    let interpreter = Interpreter::new(config).with_context(|| "Failed to set up interpreter")?;

    let archive = interpreter
        .fetch_only(&formula, Path::new(dest))
        .with_context(|| format!("Failed to fetch sources for {}", formula.display_name()))?;

    let algorithm = match formula.checksum() {
        Ok(Some(pinned)) => pinned.algorithm,
        _ => HashAlgorithm::Sha256,
    };
    let digest = hash_file(algorithm, &archive)
        .with_context(|| format!("Failed to hash {}", archive.display()))?;

    println!("{}", archive.display());
    println!("{}", digest.to_prefixed_string());
    Ok(())
}
