// src/commands/mod.rs
//! Command implementations for the formulary CLI

mod checksum;
mod fetch;
mod install;
mod show;
mod validate;

pub use checksum::cmd_checksum;
pub use fetch::cmd_fetch;
pub use install::{cmd_install, InstallOptions};
pub use show::cmd_show;
pub use test::cmd_test;
pub use validate::cmd_validate;

use anyhow::{Context, Result};
use formulary::{parse_formula_file, Formula};
use std::path::Path;

/// Read and parse a formula file, with the path in any error
fn load_formula(path: &str) -> Result<Formula> {
    let path = Path::new(path);
    parse_formula_file(path)
        .with_context(|| format!("Failed to parse formula: {}", path.display()))
}
