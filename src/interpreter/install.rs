// src/interpreter/install.rs

//! Install stage: copy built artifacts into the install root

use crate::error::{Error, Result};
use crate::formula::is_relative_subpath;
use std::collections::BTreeMap;
use std::fs::{self, File, Permissions};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const EXECUTABLE_MODE: u32 = 0o755;
const REGULAR_MODE: u32 = 0o644;

/// Copy each built artifact to its installed location
///
/// All sources are checked before anything is written, so a missing
/// artifact leaves the install root untouched. Each copy goes to a temp
/// file beside its destination and is renamed into place, which makes
/// re-running over an existing install safe.
///
/// Returns the installed paths in map order.
pub fn install_artifacts(
    build_root: &Path,
    artifacts: &BTreeMap<String, String>,
    install_root: &Path,
) -> Result<Vec<PathBuf>> {
    let mut plan = Vec::with_capacity(artifacts.len());

    for (built, installed) in artifacts {
        if !is_relative_subpath(built) {
            return Err(Error::install(Path::new(built), "source path must be relative"));
        }
        if !is_relative_subpath(installed) {
            return Err(Error::install(
                Path::new(installed),
                "destination path must be relative",
            ));
        }

        let source = build_root.join(built);
        match fs::metadata(&source) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(Error::install(&source, "not a regular file")),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::install(&source, "built artifact not found"));
            }
            Err(e) => return Err(Error::install(&source, e)),
        }

        plan.push((source, install_root.join(installed)));
    }

    let mut installed = Vec::with_capacity(plan.len());
    for (source, dest) in plan {
        copy_artifact(&source, &dest).map_err(|e| Error::install(&dest, e))?;
        info!("Installed {}", dest.display());
        installed.push(dest);
    }

    Ok(installed)
}

fn copy_artifact(source: &Path, dest: &Path) -> io::Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| io::Error::other("destination has no parent directory"))?;
    fs::create_dir_all(parent)?;

    let mode = install_mode(source, dest)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    io::copy(&mut File::open(source)?, tmp.as_file_mut())?;
    tmp.as_file().set_permissions(Permissions::from_mode(mode))?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;

    debug!("{} -> {} ({:o})", source.display(), dest.display(), mode);
    Ok(())
}

/// Executable when the built file is, or when it is installed into a
/// `bin`/`sbin` directory
fn install_mode(source: &Path, dest: &Path) -> io::Result<u32> {
    let source_mode = fs::metadata(source)?.permissions().mode();
    let into_bin = dest
        .parent()
        .and_then(|p| p.file_name())
        .is_some_and(|name| name == "bin" || name == "sbin");

    if source_mode & 0o111 != 0 || into_bin {
        Ok(EXECUTABLE_MODE)
    } else {
        Ok(REGULAR_MODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifacts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn test_install_sets_modes() {
        let build = tempfile::tempdir().unwrap();
        let prefix = tempfile::tempdir().unwrap();
        fs::write(build.path().join("tool"), b"#!/bin/sh\necho hi\n").unwrap();
        fs::write(build.path().join("tool.1"), b".TH TOOL 1").unwrap();
        fs::write(build.path().join("helper"), b"binary").unwrap();
        fs::set_permissions(build.path().join("helper"), Permissions::from_mode(0o700)).unwrap();

        let installed = install_artifacts(
            build.path(),
            &artifacts(&[
                ("tool", "bin/tool"),
                ("tool.1", "share/man/man1/tool.1"),
                ("helper", "libexec/helper"),
            ]),
            prefix.path(),
        )
        .unwrap();

        assert_eq!(installed.len(), 3);
        assert_eq!(mode_of(&prefix.path().join("bin/tool")), 0o755);
        assert_eq!(mode_of(&prefix.path().join("share/man/man1/tool.1")), 0o644);
        assert_eq!(mode_of(&prefix.path().join("libexec/helper")), 0o755);
    }

    #[test]
    fn test_missing_artifact_installs_nothing() {
        let build = tempfile::tempdir().unwrap();
        let prefix = tempfile::tempdir().unwrap();
        fs::write(build.path().join("a"), b"a").unwrap();

        // "a" sorts before "b", so it would be copied first without the precheck
        let err = install_artifacts(
            build.path(),
            &artifacts(&[("a", "bin/a"), ("b", "bin/b")]),
            prefix.path(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::Install { .. }));
        assert!(!prefix.path().join("bin").exists());
    }

    #[test]
    fn test_reinstall_overwrites() {
        let build = tempfile::tempdir().unwrap();
        let prefix = tempfile::tempdir().unwrap();
        let map = artifacts(&[("tool", "bin/tool")]);

        fs::write(build.path().join("tool"), b"v1").unwrap();
        install_artifacts(build.path(), &map, prefix.path()).unwrap();
        fs::write(build.path().join("tool"), b"v2").unwrap();
        install_artifacts(build.path(), &map, prefix.path()).unwrap();

        assert_eq!(fs::read(prefix.path().join("bin/tool")).unwrap(), b"v2");
    }

    #[test]
    fn test_rejects_escaping_destination() {
        let build = tempfile::tempdir().unwrap();
        let prefix = tempfile::tempdir().unwrap();
        fs::write(build.path().join("tool"), b"x").unwrap();

        let err = install_artifacts(
            build.path(),
            &artifacts(&[("tool", "../outside")]),
            prefix.path(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Install { .. }));
    }
}
