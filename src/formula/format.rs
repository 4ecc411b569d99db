// src/formula/format.rs

//! Formula file format definitions
//!
//! Formulas are TOML files. Everything the interpreter needs is plain data;
//! nothing here touches the filesystem or the network.

use crate::hash::{Hash, HashError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path};

/// Variables the interpreter always provides
pub const BUILTIN_VARIABLES: [&str; 4] = ["name", "version", "buildroot", "installroot"];

/// A complete formula for building and installing a package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    /// Package metadata
    pub package: PackageSection,

    /// Source archive and its checksum
    pub source: SourceSection,

    /// Build instructions
    #[serde(default)]
    pub build: BuildSection,

    /// Built file (relative to the build root) -> installed file (relative
    /// to the install root)
    #[serde(default)]
    pub install: BTreeMap<String, String>,

    /// Post-install smoke test (optional)
    #[serde(default)]
    pub test: Option<TestSection>,

    /// Variables for substitution (optional)
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl Formula {
    /// Substitute variables in a string
    ///
    /// Replaces `%(name)s` patterns with, in order:
    /// 1. Custom variables from the `[variables]` section, whose values may
    ///    themselves use built-ins
    /// 2. Built-in variables (`name`, `version`, and the roots when known)
    ///
    /// Built-ins cannot be overridden. Unknown patterns are left untouched.
    pub fn substitute(
        &self,
        template: &str,
        build_root: Option<&Path>,
        install_root: Option<&Path>,
    ) -> String {
        let mut result = template.to_string();
        for (key, value) in &self.variables {
            if !BUILTIN_VARIABLES.contains(&key.as_str()) {
                result = result.replace(&format!("%({})s", key), value);
            }
        }

        result = result.replace("%(version)s", &self.package.version);
        result = result.replace("%(name)s", &self.package.name);

        if let Some(root) = build_root {
            result = result.replace("%(buildroot)s", &root.to_string_lossy());
        }
        if let Some(root) = install_root {
            result = result.replace("%(installroot)s", &root.to_string_lossy());
        }

        result
    }

    /// Get the source URL with variables substituted
    pub fn source_url(&self) -> String {
        self.substitute(&self.source.url, None, None)
    }

    /// Get the archive filename from the source URL
    ///
    /// Query strings and fragments are dropped.
    pub fn archive_filename(&self) -> String {
        let url = self.source_url();
        let path = url.split(['?', '#']).next().unwrap_or_default();
        match path.rsplit('/').next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}-{}.tar.gz", self.package.name, self.package.version),
        }
    }

    /// Parse the source checksum, if one is pinned
    pub fn checksum(&self) -> Result<Option<Hash>, HashError> {
        self.source
            .checksum
            .as_deref()
            .map(Hash::parse_prefixed)
            .transpose()
    }

    /// Formula name and version, e.g. `terraform-inventory-0.8`
    pub fn display_name(&self) -> String {
        format!("{}-{}", self.package.name, self.package.version)
    }
}

/// Package metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSection {
    /// Package name
    pub name: String,

    /// Package version; substituted as `%(version)s`
    pub version: String,

    /// Short description
    #[serde(default)]
    pub summary: Option<String>,

    /// Homepage URL
    #[serde(default)]
    pub homepage: Option<String>,

    /// VCS URL of the development head (metadata only)
    #[serde(default)]
    pub head: Option<String>,
}

/// Source archive section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    /// Source archive URL (`https://`, `http://`, `file://`, or a local path)
    ///
    /// Supports `%(version)s` substitution.
    pub url: String,

    /// Checksum for the archive (`sha256:...`, `sha1:...`)
    #[serde(default)]
    pub checksum: Option<String>,

    /// Leading path components to strip on extraction
    ///
    /// When unset, a single top-level directory shared by every entry is
    /// stripped, as produced by tag archives.
    #[serde(default)]
    pub strip_components: Option<usize>,
}

/// Build instructions section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSection {
    /// Tools that must be on the execution path during the build
    ///
    /// These are never installed by the interpreter.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,

    /// Move the extracted sources into this subdirectory of the build root
    /// before building
    #[serde(default)]
    pub stage_dir: Option<String>,

    /// Working directory within the build root (relative path)
    #[serde(default)]
    pub workdir: Option<String>,

    /// Shell commands, run in order
    #[serde(default)]
    pub commands: Vec<String>,

    /// Environment variables to set during build
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// Post-install smoke test section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSection {
    /// Shell command; must exit zero for the install to count as working
    pub command: String,
}

/// Check that a path is relative and stays below its root
///
/// Rejects absolute paths, `..` components, and paths naming no file at all
/// (`""`, `"."`).
pub fn is_relative_subpath(path: &str) -> bool {
    let mut named = false;
    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            _ => return false,
        }
    }
    named
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample() -> Formula {
        toml::from_str(
            r#"
[package]
name = "terraform-inventory"
version = "0.8"

[source]
url = "https://github.com/adammck/terraform-inventory/archive/v%(version)s.tar.gz"

[build]
dependencies = ["go", "go", "git"]
commands = ["go build -ldflags \"-X main.build_version '%(version)s'\""]

[build.environment]
GOPATH = "%(buildroot)s"

[variables]
org = "adammck"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_source_url_substitution() {
        let formula = sample();
        assert_eq!(
            formula.source_url(),
            "https://github.com/adammck/terraform-inventory/archive/v0.8.tar.gz"
        );
        assert_eq!(formula.archive_filename(), "v0.8.tar.gz");
    }

    #[test]
    fn test_substitute_roots_and_variables() {
        let formula = sample();
        let build = PathBuf::from("/tmp/build");
        let install = PathBuf::from("/opt/prefix");
        let out = formula.substitute(
            "%(buildroot)s/src/%(org)s %(installroot)s/bin %(unknown)s",
            Some(&build),
            Some(&install),
        );
        assert_eq!(out, "/tmp/build/src/adammck /opt/prefix/bin %(unknown)s");

        // Roots left alone when not known yet
        assert_eq!(formula.substitute("%(buildroot)s", None, None), "%(buildroot)s");
    }

    #[test]
    fn test_variables_may_use_builtins() {
        let mut formula = sample();
        formula
            .variables
            .insert("importpath".to_string(), "github.com/acme/%(name)s".to_string());
        formula
            .variables
            .insert("name".to_string(), "shadowed".to_string());
        assert_eq!(
            formula.substitute("src/%(importpath)s", None, None),
            "src/github.com/acme/terraform-inventory"
        );
        assert_eq!(formula.substitute("%(name)s", None, None), "terraform-inventory");
    }

    #[test]
    fn test_dependencies_are_a_set() {
        let formula = sample();
        let deps: Vec<_> = formula.build.dependencies.iter().cloned().collect();
        assert_eq!(deps, vec!["git", "go"]);
    }

    #[test]
    fn test_archive_filename_strips_query() {
        let mut formula = sample();
        formula.source.url = "https://example.com/dl/tool-1.0.tar.gz?raw=true".to_string();
        assert_eq!(formula.archive_filename(), "tool-1.0.tar.gz");

        formula.source.url = "https://example.com/download/".to_string();
        assert_eq!(formula.archive_filename(), "terraform-inventory-0.8.tar.gz");
    }

    #[test]
    fn test_checksum_parsing() {
        let mut formula = sample();
        assert!(formula.checksum().unwrap().is_none());

        formula.source.checksum = Some("sha1:fc4d492e328255b422429e221ff7d31533da96f9".into());
        let hash = formula.checksum().unwrap().unwrap();
        assert_eq!(hash.algorithm, crate::hash::HashAlgorithm::Sha1);

        formula.source.checksum = Some("sha256:nothex".into());
        assert!(formula.checksum().is_err());
    }

    #[test]
    fn test_is_relative_subpath() {
        assert!(is_relative_subpath("bin/tool"));
        assert!(is_relative_subpath("./tool"));
        assert!(!is_relative_subpath("/usr/bin/tool"));
        assert!(!is_relative_subpath("../escape"));
        assert!(!is_relative_subpath("bin/../../escape"));
        assert!(!is_relative_subpath(""));
        assert!(!is_relative_subpath("."));
    }
}
