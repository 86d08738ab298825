//! Snapshot File Module
//!
//! Owns the on-disk location of a snapshot and the write/read discipline.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;

/// File name used when no snapshot path is configured.
pub const DEFAULT_SNAPSHOT_FILE: &str = "ttl_cache.snapshot";

// == Snapshot File ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    // == Constructor ==
    /// Resolves the snapshot location to an absolute path.
    ///
    /// - `None`: [`DEFAULT_SNAPSHOT_FILE`] next to the running executable,
    ///   or in the working directory when the executable cannot be located
    /// - relative path: joined onto the current working directory
    /// - absolute path: used as is
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => std::env::current_dir()?.join(p),
            None => default_location(std::env::current_exe(), std::env::current_dir()),
        };
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // == Write ==
    /// Replaces the snapshot with `data`.
    ///
    /// Removes the previous file, creates missing parent directories, then
    /// writes. This is not atomic: a crash between removal and write loses
    /// the previous snapshot. A failed write removes the partial file.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        } else if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        if let Err(err) = fs::write(&self.path, data) {
            let _ = fs::remove_file(&self.path);
            return Err(err.into());
        }
        Ok(())
    }

    // == Read ==
    /// Reads the snapshot. A missing file yields `None`.
    pub fn read(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Picks the default snapshot location without failing: the executable's
/// directory, else the working directory, else a bare relative name.
fn default_location(exe: io::Result<PathBuf>, cwd: io::Result<PathBuf>) -> PathBuf {
    let dir = match exe {
        Ok(exe) => exe.parent().map(Path::to_path_buf),
        Err(err) => {
            warn!("Cannot locate executable ({}), using working directory for snapshots", err);
            None
        }
    };
    match dir.or_else(|| cwd.ok()) {
        Some(dir) => dir.join(DEFAULT_SNAPSHOT_FILE),
        None => PathBuf::from(DEFAULT_SNAPSHOT_FILE),
    }
}
