//! Path canonicalisation before comparing against mount table entries.
//!
//! The kernel records canonical mountpoints, so a candidate path has to be
//! made absolute with every symlink resolved before it can match.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mountkit_common::{MountError, MountResult};

/// Make `path` absolute, resolve symlinks and check that the result exists.
pub fn normalize_path(path: impl AsRef<Path>) -> MountResult<PathBuf> {
    let path = path.as_ref();

    let absolute = std::path::absolute(path).map_err(|source| MountError::Resolution {
        path: path.to_path_buf(),
        source,
    })?;
    let real = fs::canonicalize(&absolute).map_err(|source| classify(path, source))?;
    fs::metadata(&real).map_err(|source| classify(&real, source))?;

    Ok(real)
}

/// Best-effort form of `path` for matching against the mount table.
///
/// A shadowed mountpoint is still listed in the table but can no longer be
/// resolved, so this falls back to the lexically absolute path.
pub(crate) fn table_path(path: &Path) -> PathBuf {
    match normalize_path(path) {
        Ok(real) => real,
        Err(err) => {
            tracing::debug!(
                path = %path.display(),
                error = %err,
                "Cannot canonicalise path, matching it lexically"
            );
            std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
        }
    }
}

fn classify(path: &Path, source: io::Error) -> MountError {
    if source.kind() == io::ErrorKind::NotFound {
        MountError::NotFound {
            path: path.to_path_buf(),
            source,
        }
    } else {
        MountError::Resolution {
            path: path.to_path_buf(),
            source,
        }
    }
}
