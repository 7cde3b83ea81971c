//! Live mount tables read from procfs.
//!
//! `/proc/thread-self` resolves to whichever thread opens it, so the table must
//! be opened, read and closed on one OS thread. The read below is synchronous
//! and never yields, which holds that thread for its whole duration. Async
//! callers should run it through `spawn_blocking` rather than inline on a
//! work-stealing worker.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use mountkit_common::{MountError, MountResult, ProcPaths};
use once_cell::sync::Lazy;

use super::{MountFilter, MountInfo, parse_mountinfo};

/// Whether the system procfs has `/proc/thread-self` (Linux 3.17+).
static HAVE_THREAD_SELF: Lazy<bool> =
    Lazy::new(|| thread_self_available(&ProcPaths::new()));

fn thread_self_available(paths: &ProcPaths) -> bool {
    paths.thread_self_mountinfo().exists()
}

/// Read the calling thread's mount table.
pub(crate) fn read_thread_table(
    paths: &ProcPaths,
    filter: Option<&dyn MountFilter>,
) -> MountResult<Vec<MountInfo>> {
    let (path, file) = open_thread_table(paths)?;
    tracing::trace!(path = %path.display(), "Reading mount table");
    parse_mountinfo(BufReader::new(file), filter)
}

/// Read the mount table of process `pid`.
pub(crate) fn read_pid_table(
    paths: &ProcPaths,
    pid: u32,
    filter: Option<&dyn MountFilter>,
) -> MountResult<Vec<MountInfo>> {
    let path = paths.pid_mountinfo(pid);
    let file = open(&path)?;
    tracing::trace!(pid, path = %path.display(), "Reading mount table");
    parse_mountinfo(BufReader::new(file), filter)
}

fn open_thread_table(paths: &ProcPaths) -> MountResult<(PathBuf, File)> {
    let have_thread_self = if paths.is_default() {
        *HAVE_THREAD_SELF
    } else {
        thread_self_available(paths)
    };

    if have_thread_self {
        let path = paths.thread_self_mountinfo();
        let file = open(&path)?;
        return Ok((path, file));
    }

    // Pre-3.17 kernels: build the per-thread path by hand.
    let tid = rustix::thread::gettid().as_raw_nonzero().get();
    let path = paths.task_mountinfo(tid);
    match File::open(&path) {
        Ok(file) => Ok((path, file)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // Our pid namespace differs from the one procfs was mounted in, so
            // there is no way to name this thread. Fall back to the process view.
            tracing::debug!(
                path = %path.display(),
                "Per-thread mount table not found, using process mount table"
            );
            let path = paths.self_mountinfo();
            let file = open(&path)?;
            Ok((path, file))
        }
        Err(err) => Err(MountError::syscall("open", path, 0, err)),
    }
}

fn open(path: &Path) -> MountResult<File> {
    File::open(path).map_err(|e| MountError::syscall("open", path, 0, e))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const LINE: &str = "21 1 0:19 / /fake rw - tmpfs tmpfs rw\n";

    #[test]
    fn prefers_thread_self() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = ProcPaths::with_root(tmp.path());
        fs::create_dir_all(tmp.path().join("thread-self")).unwrap();
        fs::write(paths.thread_self_mountinfo(), LINE).unwrap();
        fs::create_dir_all(tmp.path().join("self")).unwrap();
        fs::write(paths.self_mountinfo(), "").unwrap();

        let mounts = read_thread_table(&paths, None).unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].mountpoint, Path::new("/fake"));
    }

    #[test]
    fn falls_back_to_process_table() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = ProcPaths::with_root(tmp.path());
        fs::create_dir_all(tmp.path().join("self")).unwrap();
        fs::write(paths.self_mountinfo(), LINE).unwrap();

        let mounts = read_thread_table(&paths, None).unwrap();
        assert_eq!(mounts.len(), 1);
    }

    #[test]
    fn uses_task_table_when_present() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = ProcPaths::with_root(tmp.path());
        let tid = rustix::thread::gettid().as_raw_nonzero().get();
        let task = paths.task_mountinfo(tid);
        fs::create_dir_all(task.parent().unwrap()).unwrap();
        fs::write(&task, LINE).unwrap();

        let mounts = read_thread_table(&paths, None).unwrap();
        assert_eq!(mounts[0].id, 21);
    }

    #[test]
    fn missing_procfs_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = ProcPaths::with_root(tmp.path().join("nope"));
        let err = read_thread_table(&paths, None).unwrap_err();
        assert!(matches!(err, MountError::Syscall { op: "open", .. }));
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }

    #[test]
    fn pid_table() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = ProcPaths::with_root(tmp.path());
        fs::create_dir_all(tmp.path().join("77")).unwrap();
        fs::write(paths.pid_mountinfo(77), LINE).unwrap();

        let mounts = read_pid_table(&paths, 77, None).unwrap();
        assert_eq!(mounts[0].mountpoint, Path::new("/fake"));
    }
}
