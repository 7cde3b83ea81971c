//! Mount point detection.
//!
//! Tiers, cheapest first:
//! 1. Cross-device open probe: `openat2(2)` with `RESOLVE_NO_XDEV` on the last
//!    path component. `EXDEV` means a mount, a clean open means none. Sees bind
//!    mounts. Linux 5.6+.
//! 2. Device number comparison with the parent directory. A difference means a
//!    mount; equality proves nothing on Linux because bind mounts share the
//!    device.
//! 3. Mount table scan for an exact mountpoint match, re-read a bounded number
//!    of times to work around truncated reads under concurrent unmounts
//!    (kernels before 5.8).

use std::cell::Cell;
use std::path::Path;

use mountkit_common::{MountError, MountResult};

use crate::config::MountConfig;
use crate::mountinfo::{FilterDecision, LiveMountTable, MountInfo, MountTable};
use crate::path::normalize_path;

/// Whether an unchanged device number proves the path is not a mount point.
///
/// True where bind mounts do not exist in the Linux sense.
const DEVICE_PROBE_IS_CONCLUSIVE: bool = cfg!(any(
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "macos"
));

/// Result of a detection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// Whether the path appears to be a mount point.
    pub mounted: bool,
    /// Whether the deciding mechanism cannot be wrong about `mounted`.
    pub certain: bool,
}

impl Detection {
    /// Definitely a mount point.
    pub const MOUNTED: Self = Self {
        mounted: true,
        certain: true,
    };
    /// Definitely not a mount point.
    pub const NOT_MOUNTED: Self = Self {
        mounted: false,
        certain: true,
    };
    /// No tier could decide.
    pub const UNKNOWN: Self = Self {
        mounted: false,
        certain: false,
    };
}

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Mounted,
    NotMounted,
    Abstain,
}

/// Decides whether paths are mount points.
#[derive(Debug, Clone)]
pub struct MountDetector<T = LiveMountTable> {
    table: T,
    config: MountConfig,
}

impl MountDetector<LiveMountTable> {
    /// Detector with default settings over the live table.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MountConfig::default())
    }

    /// Detector over the live table under `config.proc`.
    #[must_use]
    pub fn with_config(config: MountConfig) -> Self {
        let table = LiveMountTable::with_paths(config.proc.clone());
        Self { table, config }
    }
}

impl Default for MountDetector<LiveMountTable> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MountTable> MountDetector<T> {
    /// Detector over an arbitrary table source.
    pub fn with_table(table: T, config: MountConfig) -> Self {
        Self { table, config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    /// Check using only the open and device probes; never reads the table.
    ///
    /// Returns [`Detection::UNKNOWN`] when neither probe could decide.
    pub fn is_mounted_fast(&self, path: impl AsRef<Path>) -> MountResult<Detection> {
        let path = normalize_path(path)?;
        if is_root(&path) {
            return Ok(Detection::MOUNTED);
        }
        self.fast_probe(&path)
    }

    /// Check using every tier, falling back to a full table scan.
    pub fn is_mounted(&self, path: impl AsRef<Path>) -> MountResult<bool> {
        let path = normalize_path(path)?;
        if is_root(&path) {
            return Ok(true);
        }

        match self.fast_probe(&path) {
            Ok(detection) if detection.certain => return Ok(detection.mounted),
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "Fast probes failed");
            }
        }

        self.scan_table(&path)
    }

    fn fast_probe(&self, path: &Path) -> MountResult<Detection> {
        if self.config.open_probe {
            match open_probe(path) {
                Probe::Mounted => return Ok(Detection::MOUNTED),
                Probe::NotMounted => return Ok(Detection::NOT_MOUNTED),
                Probe::Abstain => {}
            }
        }

        if self.config.device_probe {
            match device_probe(path)? {
                Probe::Mounted => return Ok(Detection::MOUNTED),
                Probe::NotMounted if DEVICE_PROBE_IS_CONCLUSIVE => {
                    return Ok(Detection::NOT_MOUNTED);
                }
                Probe::NotMounted | Probe::Abstain => {}
            }
        }

        Ok(Detection::UNKNOWN)
    }

    /// Scan the table for `path`, re-reading while a negative result is unstable.
    ///
    /// A negative answer is accepted once two consecutive reads scanned the same
    /// number of entries, or after `max_table_reads` reads.
    fn scan_table(&self, path: &Path) -> MountResult<bool> {
        let max_reads = self.config.max_table_reads.max(1);
        let mut previous_total = None;

        for attempt in 1..=max_reads {
            let total = Cell::new(0usize);
            let filter = |m: &MountInfo| {
                if m.mountpoint == path {
                    FilterDecision::KEEP_AND_STOP
                } else {
                    total.set(total.get() + 1);
                    FilterDecision::SKIP
                }
            };

            if !self.table.mounts(Some(&filter))?.is_empty() {
                tracing::debug!(path = %path.display(), attempt, "Found in mount table");
                return Ok(true);
            }

            let total = total.get();
            if previous_total == Some(total) {
                tracing::debug!(
                    path = %path.display(),
                    attempt,
                    total,
                    "Not in mount table, two reads agree"
                );
                return Ok(false);
            }
            tracing::trace!(path = %path.display(), attempt, total, "Not in mount table, reading again");
            previous_total = Some(total);
        }

        tracing::debug!(
            path = %path.display(),
            reads = max_reads,
            "Not in mount table, read bound reached"
        );
        Ok(false)
    }
}

/// Whether `path` is a mount point, using every detection tier.
///
/// Symlinks are resolved first; a missing path is a [`MountError::NotFound`].
pub fn is_mounted(path: impl AsRef<Path>) -> MountResult<bool> {
    MountDetector::new().is_mounted(path)
}

/// Whether `path` is a mount point, using only the cheap probes.
pub fn is_mounted_fast(path: impl AsRef<Path>) -> MountResult<Detection> {
    MountDetector::new().is_mounted_fast(path)
}

fn is_root(path: &Path) -> bool {
    path.parent().is_none()
}

#[cfg(target_os = "linux")]
fn open_probe(path: &Path) -> Probe {
    use rustix::fs::{CWD, Mode, OFlags, ResolveFlags, openat2};
    use rustix::io::Errno;

    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Probe::Abstain;
    };

    let dir = match openat2(
        CWD,
        parent,
        OFlags::PATH | OFlags::CLOEXEC,
        Mode::empty(),
        ResolveFlags::empty(),
    ) {
        Ok(dir) => dir,
        Err(err) => {
            tracing::trace!(path = %parent.display(), %err, "openat2 on parent failed");
            return Probe::Abstain;
        }
    };

    match openat2(
        &dir,
        name,
        OFlags::PATH | OFlags::CLOEXEC | OFlags::NOFOLLOW,
        Mode::empty(),
        ResolveFlags::NO_XDEV,
    ) {
        Ok(_) => Probe::NotMounted,
        Err(err) if err == Errno::XDEV => Probe::Mounted,
        Err(err) => {
            tracing::trace!(path = %path.display(), %err, "openat2 probe inconclusive");
            Probe::Abstain
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn open_probe(_path: &Path) -> Probe {
    Probe::Abstain
}

fn device_probe(path: &Path) -> MountResult<Probe> {
    use rustix::fs::lstat;

    let dev = lstat(path)
        .map_err(|e| MountError::syscall("lstat", path, 0, e))?
        .st_dev;
    let parent = path.parent().unwrap_or(path);
    let parent_dev = lstat(parent)
        .map_err(|e| MountError::syscall("lstat", parent, 0, e))?
        .st_dev;

    if dev == parent_dev {
        Ok(Probe::NotMounted)
    } else {
        Ok(Probe::Mounted)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::PathBuf;

    use crate::mountinfo::MountFilter;

    use super::*;

    /// Serves scripted snapshots, one per read, repeating the last.
    struct ScriptedTable {
        reads: RefCell<usize>,
        snapshots: Vec<Vec<MountInfo>>,
    }

    impl ScriptedTable {
        fn new(snapshots: Vec<Vec<MountInfo>>) -> Self {
            Self {
                reads: RefCell::new(0),
                snapshots,
            }
        }

        fn reads(&self) -> usize {
            *self.reads.borrow()
        }
    }

    impl MountTable for &ScriptedTable {
        fn mounts(&self, filter: Option<&dyn MountFilter>) -> MountResult<Vec<MountInfo>> {
            let index = {
                let mut reads = self.reads.borrow_mut();
                *reads += 1;
                (*reads - 1).min(self.snapshots.len() - 1)
            };
            let mut out = Vec::new();
            for info in &self.snapshots[index] {
                let decision = filter.map_or(FilterDecision::KEEP, |f| f.decide(info));
                if decision.skip {
                    continue;
                }
                out.push(info.clone());
                if decision.stop {
                    break;
                }
            }
            Ok(out)
        }
    }

    fn snapshot(points: &[&str]) -> Vec<MountInfo> {
        points
            .iter()
            .map(|p| MountInfo {
                mountpoint: PathBuf::from(p),
                ..Default::default()
            })
            .collect()
    }

    fn scratch_dir() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().canonicalize().unwrap().join("target");
        std::fs::create_dir(&dir).unwrap();
        (tmp, dir)
    }

    #[test]
    fn root_is_always_mounted() {
        let table = ScriptedTable::new(vec![Vec::new()]);
        let detector = MountDetector::with_table(&table, MountConfig::default().table_only());
        assert!(detector.is_mounted("/").unwrap());
        assert_eq!(detector.is_mounted_fast("/").unwrap(), Detection::MOUNTED);
        assert_eq!(table.reads(), 0);
    }

    #[test]
    fn table_hit_is_mounted() {
        let (_tmp, dir) = scratch_dir();
        let table = ScriptedTable::new(vec![snapshot(&["/", dir.to_str().unwrap()])]);
        let detector = MountDetector::with_table(&table, MountConfig::default().table_only());
        assert!(detector.is_mounted(&dir).unwrap());
        assert_eq!(table.reads(), 1);
    }

    #[test]
    fn stable_negative_needs_two_reads() {
        let (_tmp, dir) = scratch_dir();
        let table = ScriptedTable::new(vec![snapshot(&["/", "/proc", "/sys"])]);
        let detector = MountDetector::with_table(&table, MountConfig::default().table_only());
        assert!(!detector.is_mounted(&dir).unwrap());
        assert_eq!(table.reads(), 2);
    }

    #[test]
    fn truncated_read_is_retried() {
        let (_tmp, dir) = scratch_dir();
        let full = snapshot(&["/", "/proc", dir.to_str().unwrap()]);
        let table = ScriptedTable::new(vec![snapshot(&["/"]), full]);
        let detector = MountDetector::with_table(&table, MountConfig::default().table_only());
        assert!(detector.is_mounted(&dir).unwrap());
        assert_eq!(table.reads(), 2);
    }

    #[test]
    fn churn_is_bounded() {
        let (_tmp, dir) = scratch_dir();
        let table = ScriptedTable::new(vec![
            snapshot(&["/"]),
            snapshot(&["/", "/a"]),
            snapshot(&["/", "/a", "/b"]),
            snapshot(&["/", "/a", "/b", "/c"]),
        ]);
        let detector = MountDetector::with_table(&table, MountConfig::default().table_only());
        assert!(!detector.is_mounted(&dir).unwrap());
        assert_eq!(table.reads(), 3);
    }

    #[test]
    fn single_read_when_configured() {
        let (_tmp, dir) = scratch_dir();
        let table = ScriptedTable::new(vec![snapshot(&["/"])]);
        let config = MountConfig::default().table_only().with_max_table_reads(1);
        let detector = MountDetector::with_table(&table, config);
        assert!(!detector.is_mounted(&dir).unwrap());
        assert_eq!(table.reads(), 1);
    }

    #[test]
    fn fast_check_never_reads_table() {
        let (_tmp, dir) = scratch_dir();
        let table = ScriptedTable::new(vec![snapshot(&[dir.to_str().unwrap()])]);
        let detector = MountDetector::with_table(&table, MountConfig::default().table_only());
        assert_eq!(detector.is_mounted_fast(&dir).unwrap(), Detection::UNKNOWN);
        assert_eq!(table.reads(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn plain_directory_is_not_mounted() {
        let (_tmp, dir) = scratch_dir();
        let table = ScriptedTable::new(vec![Vec::new()]);
        let detector = MountDetector::with_table(&table, MountConfig::default());
        assert!(!detector.is_mounted(&dir).unwrap());

        let fast = detector.is_mounted_fast(&dir).unwrap();
        assert!(!fast.mounted);
    }

    #[test]
    fn missing_path_is_an_error() {
        let (_tmp, dir) = scratch_dir();
        let err = is_mounted(dir.join("missing")).unwrap_err();
        assert!(matches!(err, MountError::NotFound { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn proc_is_mounted() {
        assert!(is_mounted("/proc").unwrap());
        let fast = is_mounted_fast("/proc").unwrap();
        assert!(fast.mounted && fast.certain);
    }
}
