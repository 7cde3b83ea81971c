//! Filters applied to each mount table entry during a scan.

use std::path::PathBuf;

use super::MountInfo;

/// What a filter wants done with one entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterDecision {
    /// Leave the entry out of the results.
    pub skip: bool,
    /// End the scan after this entry. Ignored when the entry is skipped.
    pub stop: bool,
}

impl FilterDecision {
    /// Include the entry and keep scanning.
    pub const KEEP: Self = Self {
        skip: false,
        stop: false,
    };
    /// Exclude the entry and keep scanning.
    pub const SKIP: Self = Self {
        skip: true,
        stop: false,
    };
    /// Include the entry and end the scan.
    pub const KEEP_AND_STOP: Self = Self {
        skip: false,
        stop: true,
    };
}

/// A predicate over a single mount table entry.
///
/// Any `Fn(&MountInfo) -> FilterDecision` closure is a filter.
pub trait MountFilter {
    /// Decide whether to keep `info`, and whether to keep scanning.
    fn decide(&self, info: &MountInfo) -> FilterDecision;
}

impl<F> MountFilter for F
where
    F: Fn(&MountInfo) -> FilterDecision,
{
    fn decide(&self, info: &MountInfo) -> FilterDecision {
        self(info)
    }
}

/// Keeps mounts at or under a path.
///
/// Matching is per path component, so `/foo` does not match `/foobar`.
/// The prefix must be clean and absolute to match canonical table entries.
#[derive(Debug, Clone)]
pub struct PrefixFilter {
    prefix: PathBuf,
}

impl PrefixFilter {
    /// Create a filter for `prefix`.
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl MountFilter for PrefixFilter {
    fn decide(&self, info: &MountInfo) -> FilterDecision {
        if info.mountpoint.starts_with(&self.prefix) {
            FilterDecision::KEEP
        } else {
            FilterDecision::SKIP
        }
    }
}

/// Finds the first mount exactly at a path.
#[derive(Debug, Clone)]
pub struct SingleEntryFilter {
    mountpoint: PathBuf,
}

impl SingleEntryFilter {
    /// Create a filter for `mountpoint`.
    pub fn new(mountpoint: impl Into<PathBuf>) -> Self {
        Self {
            mountpoint: mountpoint.into(),
        }
    }
}

impl MountFilter for SingleEntryFilter {
    fn decide(&self, info: &MountInfo) -> FilterDecision {
        if info.mountpoint == self.mountpoint {
            FilterDecision::KEEP_AND_STOP
        } else {
            FilterDecision::SKIP
        }
    }
}

/// Keeps mounts at a path or at any of its ancestors.
///
/// For `/a/b/c` this selects mounts at `/a/b/c`, `/a/b`, `/a` and `/`.
#[derive(Debug, Clone)]
pub struct ParentsFilter {
    path: PathBuf,
}

impl ParentsFilter {
    /// Create a filter for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MountFilter for ParentsFilter {
    fn decide(&self, info: &MountInfo) -> FilterDecision {
        if self.path.starts_with(&info.mountpoint) {
            FilterDecision::KEEP
        } else {
            FilterDecision::SKIP
        }
    }
}

/// Keeps mounts of the given filesystem types.
#[derive(Debug, Clone)]
pub struct FsTypeFilter {
    types: Vec<String>,
}

impl FsTypeFilter {
    /// Create a filter accepting any of `types`.
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
        }
    }
}

impl MountFilter for FsTypeFilter {
    fn decide(&self, info: &MountInfo) -> FilterDecision {
        if self.types.iter().any(|t| *t == info.fs_type) {
            FilterDecision::KEEP
        } else {
            FilterDecision::SKIP
        }
    }
}
