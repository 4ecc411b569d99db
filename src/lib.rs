// src/lib.rs

//! Formulary: declarative package formulas
//!
//! A formula is a TOML record naming a source archive, its checksum, the
//! tools and commands needed to build it, and where the results go. The
//! interpreter takes a formula through fetch, verify, extract, build,
//! install and self-test, stopping at the first failure.
//!
//! ```no_run
//! use formulary::{parse_formula_file, Interpreter};
//! use std::path::Path;
//!
//! # fn main() -> formulary::Result<()> {
//! let formula = parse_formula_file(Path::new("terraform-inventory.toml"))?;
//! let interpreter = Interpreter::with_defaults()?;
//! let report = interpreter.run(&formula, Path::new("/opt/terraform-inventory"))?;
//! assert!(report.succeeded());
//! # Ok(())
//! # }
//! ```

pub mod compression;
mod error;
pub mod formula;
pub mod hash;
pub mod interpreter;

pub use error::{Error, Result, Stage};
pub use formula::{parse_formula, parse_formula_file, validate_formula, Formula};
pub use hash::{Hash, HashAlgorithm, Hasher};
pub use interpreter::{Interpreter, InterpreterConfig, PipelineReport};
