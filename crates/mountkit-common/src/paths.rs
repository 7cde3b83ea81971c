//! Standard procfs paths used to read mount tables.

use std::path::{Path, PathBuf};

/// Default procfs mount location.
pub const PROC_ROOT: &str = "/proc";

/// Name of the per-process mount table file inside procfs.
pub const MOUNTINFO: &str = "mountinfo";

/// Locations of the mount table files under a procfs root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcPaths {
    /// Procfs root directory (default: /proc).
    pub root: PathBuf,
}

impl ProcPaths {
    /// Create paths with the default procfs location.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths with a custom procfs root.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Whether these paths point at the system procfs.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.root == Path::new(PROC_ROOT)
    }

    /// Mount table of the calling thread (Linux 3.17+).
    #[must_use]
    pub fn thread_self_mountinfo(&self) -> PathBuf {
        self.root.join("thread-self").join(MOUNTINFO)
    }

    /// Mount table of a specific thread of the calling process.
    #[must_use]
    pub fn task_mountinfo(&self, tid: i32) -> PathBuf {
        self.root
            .join("self")
            .join("task")
            .join(tid.to_string())
            .join(MOUNTINFO)
    }

    /// Mount table of the calling process.
    #[must_use]
    pub fn self_mountinfo(&self) -> PathBuf {
        self.root.join("self").join(MOUNTINFO)
    }

    /// Mount table of another process.
    #[must_use]
    pub fn pid_mountinfo(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string()).join(MOUNTINFO)
    }
}

impl Default for ProcPaths {
    fn default() -> Self {
        Self::with_root(PROC_ROOT)
    }
}
