//! Kernel mount table access.
//!
//! This module handles:
//! - Parsing the `/proc/<pid>/mountinfo` line format
//! - Selecting the live table of the calling thread
//! - Filters that bound the cost of a scan
//!
//! Every read is an independent snapshot. Nothing is cached between calls, and
//! a snapshot may already be stale when it is returned.

#[cfg(any(target_os = "freebsd", target_os = "openbsd", target_os = "macos"))]
mod bsd;
mod filter;
#[cfg(target_os = "linux")]
mod live;
mod parse;

use std::io::BufRead;
use std::path::{Path, PathBuf};

use mountkit_common::{MountResult, ProcPaths};
use serde::{Serialize, Serializer};

pub use filter::{
    FilterDecision, FsTypeFilter, MountFilter, ParentsFilter, PrefixFilter, SingleEntryFilter,
};
pub use parse::{parse_mountinfo, unescape};

/// A single entry of the mount table.
///
/// On BSD-like systems only `mountpoint`, `fs_type` and `source` are filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MountInfo {
    /// Mount ID, unique within one snapshot only.
    pub id: u32,
    /// ID of the parent mount (or of self at the top of the tree).
    pub parent: u32,
    /// Major device number of `st_dev` for files on this filesystem.
    pub major: u32,
    /// Minor device number of `st_dev` for files on this filesystem.
    pub minor: u32,
    /// Root of the mount within the filesystem.
    #[serde(serialize_with = "lossy_path")]
    pub root: PathBuf,
    /// Mount point relative to the process root.
    #[serde(serialize_with = "lossy_path")]
    pub mountpoint: PathBuf,
    /// Per-mount options.
    pub options: String,
    /// Zero or more `tag[:value]` optional fields, space separated.
    pub optional: String,
    /// Filesystem type, `type[.subtype]`.
    pub fs_type: String,
    /// Filesystem specific source, or `none`.
    pub source: String,
    /// Per-superblock options.
    pub super_options: String,
}

// Escaped bytes in the table can decode to paths that are not UTF-8.
fn lossy_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

/// A source of mount table snapshots.
pub trait MountTable {
    /// Read one snapshot, keeping the entries accepted by `filter`.
    fn mounts(&self, filter: Option<&dyn MountFilter>) -> MountResult<Vec<MountInfo>>;
}

/// The mount table as seen by the calling thread.
#[derive(Debug, Clone, Default)]
pub struct LiveMountTable {
    paths: ProcPaths,
}

impl LiveMountTable {
    /// Read from the system procfs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read from a procfs mounted somewhere else.
    #[must_use]
    pub fn with_paths(paths: ProcPaths) -> Self {
        Self { paths }
    }
}

impl MountTable for LiveMountTable {
    #[cfg(target_os = "linux")]
    fn mounts(&self, filter: Option<&dyn MountFilter>) -> MountResult<Vec<MountInfo>> {
        live::read_thread_table(&self.paths, filter)
    }

    #[cfg(any(target_os = "freebsd", target_os = "openbsd", target_os = "macos"))]
    fn mounts(&self, filter: Option<&dyn MountFilter>) -> MountResult<Vec<MountInfo>> {
        bsd::read_fsstat(filter)
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "macos"
    )))]
    fn mounts(&self, _filter: Option<&dyn MountFilter>) -> MountResult<Vec<MountInfo>> {
        Err(mountkit_common::MountError::Unsupported {
            feature: "mount table".to_string(),
        })
    }
}

/// The mount table of another process, i.e. of its mount namespace.
#[derive(Debug, Clone)]
pub struct PidMountTable {
    pid: u32,
    paths: ProcPaths,
}

impl PidMountTable {
    /// Table of process `pid` under the system procfs.
    #[must_use]
    pub fn new(pid: u32) -> Self {
        Self::with_paths(pid, ProcPaths::new())
    }

    /// Table of process `pid` under a custom procfs root.
    #[must_use]
    pub fn with_paths(pid: u32, paths: ProcPaths) -> Self {
        Self { pid, paths }
    }
}

impl MountTable for PidMountTable {
    #[cfg(target_os = "linux")]
    fn mounts(&self, filter: Option<&dyn MountFilter>) -> MountResult<Vec<MountInfo>> {
        live::read_pid_table(&self.paths, self.pid, filter)
    }

    #[cfg(not(target_os = "linux"))]
    fn mounts(&self, _filter: Option<&dyn MountFilter>) -> MountResult<Vec<MountInfo>> {
        Err(mountkit_common::MountError::Unsupported {
            feature: "per-process mount table".to_string(),
        })
    }
}

/// List the mounts visible to the calling thread.
pub fn list_mounts(filter: Option<&dyn MountFilter>) -> MountResult<Vec<MountInfo>> {
    LiveMountTable::new().mounts(filter)
}

/// List mounts from arbitrary `mountinfo` formatted data.
///
/// Useful for tests, or for a table other than the caller's own.
pub fn list_mounts_from_reader<R: BufRead>(
    reader: R,
    filter: Option<&dyn MountFilter>,
) -> MountResult<Vec<MountInfo>> {
    parse_mountinfo(reader, filter)
}

/// List the mounts of another process's mount namespace.
pub fn list_mounts_for_pid(pid: u32, filter: Option<&dyn MountFilter>) -> MountResult<Vec<MountInfo>> {
    PidMountTable::new(pid).mounts(filter)
}
