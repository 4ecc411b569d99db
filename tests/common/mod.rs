// tests/common/mod.rs

//! Shared fixtures for pipeline tests: tar.gz archives and formula files.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use formulary::hash::{hash_bytes, HashAlgorithm};
use formulary::{parse_formula, Formula};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A version-printing shell script standing in for a release binary
pub const TOOL_SCRIPT: &str = "#!/bin/sh\necho \"tool 1.0\"\n";

/// Build a gzipped tarball from `(path, contents, mode)` entries
///
/// Headers carry a fixed mtime so the same entries always produce the same
/// bytes.
pub fn tar_gz(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, data, mode) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(*mode);
        header.set_mtime(0);
        header.set_entry_type(tar::EntryType::Regular);
        builder.append_data(&mut header, path, *data).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// `sha256:<hex>` for some bytes
pub fn sha256_of(data: &[u8]) -> String {
    hash_bytes(HashAlgorithm::Sha256, data).to_prefixed_string()
}

/// A scratch area with a source archive on disk and an install prefix
pub struct Fixture {
    pub dir: TempDir,
    pub archive: PathBuf,
    pub archive_bytes: Vec<u8>,
}

impl Fixture {
    /// Write `archive_bytes` as `<dir>/sources/<name>`
    pub fn new(name: &str, archive_bytes: Vec<u8>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let sources = dir.path().join("sources");
        fs::create_dir_all(&sources).unwrap();
        let archive = sources.join(name);
        fs::write(&archive, &archive_bytes).unwrap();

        Self {
            dir,
            archive,
            archive_bytes,
        }
    }

    /// A single-executable release archive, as many Go projects ship
    pub fn single_binary() -> Self {
        Self::new(
            "tool-1.0.tar.gz",
            tar_gz(&[("tool", TOOL_SCRIPT.as_bytes(), 0o644)]),
        )
    }

    /// `file://` URL of the archive
    pub fn url(&self) -> String {
        format!("file://{}", self.archive.display())
    }

    pub fn checksum(&self) -> String {
        sha256_of(&self.archive_bytes)
    }

    /// A fresh path under the scratch dir (not created)
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Parse a formula for package `tool` 1.0 from `source` and `rest`
///
/// `source` is the body of the `[source]` table; `rest` holds any further
/// tables.
pub fn formula(source: &str, rest: &str) -> Formula {
    let text = format!(
        "[package]\nname = \"tool\"\nversion = \"1.0\"\n\n[source]\n{}\n\n{}\n",
        source, rest
    );
    parse_formula(&text).unwrap()
}

/// `[source]` body for a fixture, optionally pinning a checksum
pub fn source_table(url: &str, checksum: Option<&str>) -> String {
    match checksum {
        Some(sum) => format!("url = \"{}\"\nchecksum = \"{}\"", url, sum),
        None => format!("url = \"{}\"", url),
    }
}

/// Relative paths of every file under `root`, sorted
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if root.exists() {
        walk(root, root, &mut out);
    }
    out.sort();
    out
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            walk(root, &path, out);
        } else {
            out.push(path.strip_prefix(root).unwrap().to_path_buf());
        }
    }
}
