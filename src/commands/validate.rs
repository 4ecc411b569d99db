// src/commands/validate.rs

//! Validate command - check a formula without running it

use anyhow::{Context, Result};
use formulary::validate_formula;

pub fn cmd_validate(formula_path: &str) -> Result<()> {
    let formula = super::load_formula(formula_path)?;

    let warnings = validate_formula(&formula).with_context(|| "Formula validation failed")?;
    for warning in &warnings {
        println!("Warning: {}", warning);
    }

    if warnings.is_empty() {
        println!("[OK] {}: no issues found", formula.display_name());
    } else {
        println!("[OK] {}: {} warning(s)", formula.display_name(), warnings.len());
    }
    Ok(())
}
