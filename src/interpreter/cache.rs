// src/interpreter/cache.rs

//! Checksum-keyed cache of verified source archives

use crate::error::Result;
use crate::hash::{hash_file, Hash};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Directory of archives named after their checksum
///
/// Only archives that passed verification are stored, so an entry is only
/// ever looked up by a pinned checksum.
#[derive(Debug, Clone)]
pub struct SourceCache {
    dir: PathBuf,
}

impl SourceCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache location for an archive with this checksum
    pub fn path_for(&self, checksum: &Hash) -> PathBuf {
        self.dir.join(checksum.to_prefixed_string().replace(':', "_"))
    }

    /// Return the cached archive for `checksum`, if present and intact
    ///
    /// An entry whose contents no longer match is evicted.
    pub fn lookup(&self, checksum: &Hash) -> Result<Option<PathBuf>> {
        let cached = self.path_for(checksum);
        if !cached.is_file() {
            return Ok(None);
        }

        let actual = hash_file(checksum.algorithm, &cached)?;
        if actual.value == checksum.value {
            debug!("Using cached source: {}", cached.display());
            return Ok(Some(cached));
        }

        warn!(
            "Cached source {} no longer matches its checksum, evicting",
            cached.display()
        );
        fs::remove_file(&cached)?;
        Ok(None)
    }

    /// Copy a verified archive into the cache
    ///
    /// Written through a temp file and renamed, so concurrent runs never
    /// see a partial entry.
    pub fn store(&self, checksum: &Hash, archive: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let cached = self.path_for(checksum);

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        io::copy(&mut File::open(archive)?, tmp.as_file_mut())?;
        tmp.persist(&cached).map_err(|e| e.error)?;

        debug!("Cached source at {}", cached.display());
        Ok(cached)
    }
}
