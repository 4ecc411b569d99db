// src/commands/checksum.rs

//! Checksum command - hash a local file for pinning in a formula

use anyhow::{Context, Result};
use formulary::hash::{hash_file, HashAlgorithm};
use std::path::Path;

pub fn cmd_checksum(file: &str, algorithm: &str) -> Result<()> {
    let algorithm: HashAlgorithm = algorithm
        .parse()
        .with_context(|| format!("Unknown hash algorithm: {}", algorithm))?;

    let path = Path::new(file);
    let digest =
        hash_file(algorithm, path).with_context(|| format!("Failed to hash {}", path.display()))?;

    println!("{}", digest.to_prefixed_string());
    Ok(())
}
