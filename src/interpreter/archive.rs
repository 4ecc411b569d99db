// src/interpreter/archive.rs

//! Archive verification and extraction

use crate::compression::{create_decoder, CompressionFormat};
use crate::error::{Error, Result};
use crate::hash::{hash_file, Hash};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use tracing::{debug, warn};

/// Verify an archive against its pinned checksum
///
/// A missing checksum skips verification.
pub fn verify_archive(archive: &Path, checksum: Option<&Hash>) -> Result<()> {
    let Some(expected) = checksum else {
        warn!(
            "No checksum pinned, skipping verification of {}",
            archive.display()
        );
        return Ok(());
    };

    let actual = hash_file(expected.algorithm, archive).map_err(|e| Error::verify(archive, e))?;
    if actual.value != expected.value {
        return Err(Error::Integrity {
            algorithm: expected.algorithm,
            expected: expected.value.clone(),
            actual: actual.value,
        });
    }

    debug!("{} verified ({})", archive.display(), expected.algorithm);
    Ok(())
}

/// Extract a tar archive (plain, gzip, xz or zstd) into `dest`
///
/// With `strip_components` unset, a single top-level directory shared by
/// every entry is stripped. Entries that would land outside `dest` fail the
/// extraction.
pub fn extract_archive(archive: &Path, dest: &Path, strip_components: Option<usize>) -> Result<()> {
    let format = CompressionFormat::detect(archive).map_err(|e| Error::extraction(archive, e))?;
    debug!("Extracting {} ({})", archive.display(), format);

    let strip = match strip_components {
        Some(n) => n,
        None => {
            let listed = list_entries(archive, format)?;
            if listed.is_empty() {
                return Err(Error::extraction(archive, "archive contains no files"));
            }
            shared_top_level_dir(&listed).map_or(0, |_| 1)
        }
    };

    fs::create_dir_all(dest).map_err(|e| Error::extraction(archive, e))?;
    let root = fs::canonicalize(dest).map_err(|e| Error::extraction(archive, e))?;
    let mut tar = open_tar(archive, format)?;
    tar.set_preserve_permissions(true);
    tar.set_overwrite(true);

    let entries = tar.entries().map_err(|e| Error::extraction(archive, e))?;
    let mut extracted = 0usize;

    for entry in entries {
        let mut entry = entry.map_err(|e| Error::extraction(archive, e))?;
        let kind = entry.header().entry_type();
        if is_metadata_entry(kind) {
            continue;
        }

        let path = entry.path().map_err(|e| Error::extraction(archive, e))?.into_owned();
        let Some(relative) = strip_path(&path, strip)
            .map_err(|bad| Error::extraction(archive, format!("entry escapes build root: {}", bad)))?
        else {
            continue;
        };
        let target = dest.join(&relative);

        if let Some(parent) = target.parent() {
            let resolved = fs::create_dir_all(parent)
                .and_then(|()| fs::canonicalize(parent))
                .map_err(|e| Error::extraction(archive, format!("{}: {}", relative.display(), e)))?;
            // An earlier symlink entry must not redirect later entries
            if !resolved.starts_with(&root) {
                return Err(Error::extraction(
                    archive,
                    format!("entry escapes build root via symlink: {}", path.display()),
                ));
            }
        }

        if kind == EntryType::Link {
            // Hard link targets are archive paths; resolve them under dest
            let link = entry
                .link_name()
                .map_err(|e| Error::extraction(archive, e))?
                .ok_or_else(|| Error::extraction(archive, "hard link without target"))?
                .into_owned();
            let link_rel = strip_path(&link, strip)
                .ok()
                .flatten()
                .ok_or_else(|| {
                    Error::extraction(archive, format!("bad hard link target: {}", link.display()))
                })?;
            let _ = fs::remove_file(&target);
            fs::hard_link(dest.join(link_rel), &target)
                .map_err(|e| Error::extraction(archive, e))?;
        } else {
            entry
                .unpack(&target)
                .map_err(|e| Error::extraction(archive, format!("{}: {}", relative.display(), e)))?;
        }
        extracted += 1;
    }

    if extracted == 0 {
        return Err(Error::extraction(archive, "archive contains no files"));
    }

    debug!("Extracted {} entries to {}", extracted, dest.display());
    Ok(())
}

fn open_tar(archive: &Path, format: CompressionFormat) -> Result<Archive<Box<dyn std::io::Read>>> {
    let file = File::open(archive).map_err(|e| Error::extraction(archive, e))?;
    let decoder =
        create_decoder(BufReader::new(file), format).map_err(|e| Error::extraction(archive, e))?;
    Ok(Archive::new(decoder))
}

/// Entry paths, each paired with whether the entry is a directory
fn list_entries(archive: &Path, format: CompressionFormat) -> Result<Vec<(PathBuf, bool)>> {
    let mut tar = open_tar(archive, format)?;
    let mut listed = Vec::new();

    for entry in tar.entries().map_err(|e| Error::extraction(archive, e))? {
        let entry = entry.map_err(|e| Error::extraction(archive, e))?;
        let kind = entry.header().entry_type();
        if is_metadata_entry(kind) {
            continue;
        }
        let path = entry.path().map_err(|e| Error::extraction(archive, e))?;
        listed.push((path.into_owned(), kind.is_dir()));
    }

    Ok(listed)
}

fn is_metadata_entry(kind: EntryType) -> bool {
    matches!(
        kind,
        EntryType::XGlobalHeader | EntryType::XHeader | EntryType::GNULongName | EntryType::GNULongLink
    )
}

/// Name of the directory every entry lives under, if there is exactly one
///
/// A lone top-level *file* does not count; a single-binary archive keeps
/// its file at the build root. Neither does a name that some entry uses
/// for a non-directory.
fn shared_top_level_dir(entries: &[(PathBuf, bool)]) -> Option<OsString> {
    let mut top: Option<OsString> = None;
    let mut nested = false;

    for (path, is_dir) in entries {
        let mut parts = path
            .components()
            .filter(|c| !matches!(c, Component::CurDir));
        let first = match parts.next() {
            Some(Component::Normal(name)) => name.to_os_string(),
            _ => return None,
        };
        let has_more = parts.next().is_some();
        if !has_more && !is_dir {
            return None;
        }
        nested |= has_more;

        match &top {
            Some(existing) if *existing != first => return None,
            Some(_) => {}
            None => top = Some(first),
        }
    }

    if nested { top } else { None }
}

/// Drop `strip` leading components and check the rest stays relative
///
/// `Ok(None)` means the entry disappears entirely (e.g. the stripped
/// top-level directory itself).
fn strip_path(path: &Path, strip: usize) -> std::result::Result<Option<PathBuf>, String> {
    let mut out = PathBuf::new();
    let mut skipped = 0usize;

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => {
                if skipped < strip {
                    skipped += 1;
                } else {
                    out.push(part);
                }
            }
            _ => return Err(path.display().to_string()),
        }
    }

    if out.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{hash_bytes, HashAlgorithm};
    use std::io::Write;
    use tar::{Builder, Header};

    fn listed(items: &[(&str, bool)]) -> Vec<(PathBuf, bool)> {
        items.iter().map(|(p, d)| (PathBuf::from(p), *d)).collect()
    }

    fn tar_bytes(fill: impl FnOnce(&mut Builder<Vec<u8>>)) -> Vec<u8> {
        let mut builder = Builder::new(Vec::new());
        fill(&mut builder);
        builder.into_inner().unwrap()
    }

    fn add_file(builder: &mut Builder<Vec<u8>>, path: &str, data: &[u8]) {
        let mut header = Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        builder.append_data(&mut header, path, data).unwrap();
    }

    fn add_link(builder: &mut Builder<Vec<u8>>, kind: EntryType, path: &str, target: &str) {
        let mut header = Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o777);
        header.set_entry_type(kind);
        builder.append_link(&mut header, path, target).unwrap();
    }

    /// Append a file whose name is copied verbatim, bypassing path checks
    fn add_raw_name(builder: &mut Builder<Vec<u8>>, name: &[u8], data: &[u8]) {
        let mut header = Header::new_gnu();
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        header.set_cksum();
        builder.append(&header, data).unwrap();
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn write_archive(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_shared_top_level_dir() {
        assert_eq!(
            shared_top_level_dir(&listed(&[
                ("tool-0.8/", true),
                ("tool-0.8/main.go", false),
                ("tool-0.8/cli.go", false),
            ])),
            Some(OsString::from("tool-0.8"))
        );
        // Directory entries may be omitted
        assert_eq!(
            shared_top_level_dir(&listed(&[("tool-0.8/main.go", false)])),
            Some(OsString::from("tool-0.8"))
        );
        assert_eq!(shared_top_level_dir(&listed(&[("a/x", false), ("b/y", false)])), None);
        assert_eq!(shared_top_level_dir(&listed(&[("tool", false)])), None);
        assert_eq!(shared_top_level_dir(&listed(&[("dir/", true), ("README", false)])), None);
        // A file named like the shared directory blocks stripping
        assert_eq!(shared_top_level_dir(&listed(&[("x", false), ("x/y", false)])), None);
    }

    #[test]
    fn test_strip_path() {
        assert_eq!(
            strip_path(Path::new("tool-0.8/src/main.go"), 1).unwrap(),
            Some(PathBuf::from("src/main.go"))
        );
        assert_eq!(strip_path(Path::new("tool-0.8/"), 1).unwrap(), None);
        assert_eq!(
            strip_path(Path::new("./bin/tool"), 0).unwrap(),
            Some(PathBuf::from("bin/tool"))
        );
        assert!(strip_path(Path::new("../evil"), 0).is_err());
        assert!(strip_path(Path::new("/etc/passwd"), 0).is_err());
    }

    #[test]
    fn test_verify_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tar.gz");
        fs::write(&path, b"archive").unwrap();

        let good = hash_bytes(HashAlgorithm::Sha256, b"archive");
        assert!(verify_archive(&path, Some(&good)).is_ok());
        assert!(verify_archive(&path, None).is_ok());

        let bad = hash_bytes(HashAlgorithm::Sha256, b"tampered");
        assert!(matches!(
            verify_archive(&path, Some(&bad)),
            Err(Error::Integrity { .. })
        ));
    }

    #[test]
    fn test_verify_unreadable_archive() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.tar.gz");
        let pinned = hash_bytes(HashAlgorithm::Sha256, b"archive");

        let err = verify_archive(&missing, Some(&pinned)).unwrap_err();
        assert!(matches!(err, Error::Verify { .. }));
        assert_eq!(err.stage(), Some(crate::error::Stage::Verify));
    }

    #[test]
    fn test_extract_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.unknown");
        fs::write(&path, b"definitely not an archive").unwrap();

        let err = extract_archive(&path, &dir.path().join("out"), None).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }

    #[test]
    fn test_extract_rejects_parent_dir_entry() {
        let dir = tempfile::tempdir().unwrap();
        let tar = tar_bytes(|b| add_raw_name(b, b"../evil", b"payload"));
        let archive = write_archive(dir.path(), "evil.tar.gz", &gzip(&tar));
        let dest = dir.path().join("build");

        let err = extract_archive(&archive, &dest, Some(0)).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
        assert!(err.to_string().contains("escapes build root"));
        assert!(!dir.path().join("evil").exists());
    }

    #[test]
    fn test_extract_rejects_write_through_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap();

        let tar = tar_bytes(|b| {
            add_link(b, EntryType::Symlink, "escape", outside.to_str().unwrap());
            add_file(b, "escape/evil", b"payload");
        });
        let archive = write_archive(dir.path(), "link.tar.gz", &gzip(&tar));

        let err = extract_archive(&archive, &dir.path().join("build"), None).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
        assert!(err.to_string().contains("via symlink"));
        assert!(!outside.join("evil").exists());
    }

    #[test]
    fn test_extract_hard_link_under_stripped_dir() {
        let dir = tempfile::tempdir().unwrap();
        let tar = tar_bytes(|b| {
            add_file(b, "pkg-1.0/bin/tool", b"#!/bin/sh\n");
            add_link(b, EntryType::Link, "pkg-1.0/bin/tool-alias", "pkg-1.0/bin/tool");
        });
        let archive = write_archive(dir.path(), "pkg.tar.gz", &gzip(&tar));
        let dest = dir.path().join("build");

        extract_archive(&archive, &dest, None).unwrap();
        assert_eq!(fs::read(dest.join("bin/tool-alias")).unwrap(), b"#!/bin/sh\n");
        assert!(!dest.join("pkg-1.0").exists());
    }

    #[test]
    fn test_extract_conflicting_entries() {
        let dir = tempfile::tempdir().unwrap();
        let tar = tar_bytes(|b| {
            add_file(b, "x", b"file");
            add_file(b, "x/y", b"nested");
        });
        let archive = write_archive(dir.path(), "conflict.tar.gz", &gzip(&tar));

        for strip in [Some(0), None] {
            let dest = dir.path().join(format!("build-{:?}", strip));
            let err = extract_archive(&archive, &dest, strip).unwrap_err();
            assert!(matches!(err, Error::Extraction { .. }), "{:?}", err);
        }
    }

    #[test]
    fn test_extract_truncated_stream() {
        let dir = tempfile::tempdir().unwrap();
        // Poorly compressible data so the cut lands inside the entry
        let mut state = 0x2545_f491u32;
        let data: Vec<u8> = (0..64 * 1024)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect();
        let compressed = gzip(&tar_bytes(|b| add_file(b, "blob", &data)));
        let archive = write_archive(dir.path(), "cut.tar.gz", &compressed[..compressed.len() / 2]);

        let err = extract_archive(&archive, &dir.path().join("build"), None).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }

    #[test]
    fn test_extract_xz_and_zstd() {
        let dir = tempfile::tempdir().unwrap();
        let tar = tar_bytes(|b| {
            add_file(b, "tool-2.0/README", b"readme");
            add_file(b, "tool-2.0/bin/tool", b"#!/bin/sh\necho tool\n");
        });

        let mut xz = xz2::write::XzEncoder::new(Vec::new(), 6);
        xz.write_all(&tar).unwrap();
        let xz = xz.finish().unwrap();
        let zst = zstd::stream::encode_all(tar.as_slice(), 3).unwrap();

        for (name, bytes) in [("tool.tar.xz", xz), ("tool.tar.zst", zst)] {
            let archive = write_archive(dir.path(), name, &bytes);
            let dest = dir.path().join(format!("build-{}", name));

            extract_archive(&archive, &dest, None).unwrap();
            assert_eq!(fs::read(dest.join("README")).unwrap(), b"readme");
            assert_eq!(
                fs::read(dest.join("bin/tool")).unwrap(),
                b"#!/bin/sh\necho tool\n"
            );
        }
    }
}
