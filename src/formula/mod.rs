// src/formula/mod.rs

//! Formulas: declarative descriptions of how to build and install a package
//!
//! A formula names a versioned source archive, its checksum, the tools the
//! build needs, the build commands, which built files get installed where,
//! and an optional smoke test.
//!
//! # Example Formula
//!
//! ```toml
//! [package]
//! name = "terraform-inventory"
//! version = "0.8"
//! homepage = "https://github.com/adammck/terraform-inventory"
//!
//! [source]
//! url = "https://github.com/adammck/terraform-inventory/archive/v%(version)s.tar.gz"
//! checksum = "sha256:486d8338774fe60e5f950ea8e2464c693f89828708d27d1bf69d745484a1e2a5"
//!
//! [build]
//! dependencies = ["go"]
//! stage_dir = "src/github.com/adammck/terraform-inventory"
//! workdir = "src/github.com/adammck/terraform-inventory"
//! commands = ["go get", "go build -ldflags \"-X main.build_version '%(version)s'\""]
//!
//! [build.environment]
//! GOPATH = "%(buildroot)s"
//!
//! [install]
//! "src/github.com/adammck/terraform-inventory/terraform-inventory" = "bin/terraform-inventory"
//!
//! [test]
//! command = "terraform-inventory version"
//! ```

mod format;
pub mod parser;

pub use format::{
    is_relative_subpath, BuildSection, Formula, PackageSection, SourceSection, TestSection,
    BUILTIN_VARIABLES,
};
pub use parser::{parse_formula, parse_formula_file, validate_formula};
