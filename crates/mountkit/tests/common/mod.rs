//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use mountkit::MountResult;

/// Mount syscalls need `CAP_SYS_ADMIN`; tests that need it skip themselves.
pub fn have_root() -> bool {
    let root = rustix::process::geteuid().is_root();
    if !root {
        eprintln!("skipping: root required");
    }
    root
}

/// Path of a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Mounts made by a test, unmounted newest first when dropped.
#[derive(Default)]
pub struct MountStack {
    points: Vec<PathBuf>,
}

impl MountStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(
        &mut self,
        source: &str,
        target: impl AsRef<Path>,
        fs_type: &str,
        options: &str,
    ) -> MountResult<()> {
        let target = target.as_ref();
        mountkit::mount(source, target, fs_type, options)?;
        self.points.push(target.to_path_buf());
        Ok(())
    }

    pub fn tmpfs(&mut self, target: impl AsRef<Path>) -> MountResult<()> {
        self.mount("tmpfs", target, "tmpfs", "")
    }

    pub fn bind(&mut self, source: impl AsRef<Path>, target: impl AsRef<Path>) -> MountResult<()> {
        let source = source.as_ref().to_string_lossy().into_owned();
        self.mount(&source, target, "none", "bind")
    }
}

impl Drop for MountStack {
    fn drop(&mut self) {
        for point in self.points.iter().rev() {
            let _ = mountkit::unmount(point);
        }
    }
}
