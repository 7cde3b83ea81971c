//! Integration tests for mount point detection.
#![cfg(target_os = "linux")]

use std::error::Error;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::PathBuf;

use mountkit::{MountConfig, MountDetector, is_mounted, is_mounted_fast};
use tempfile::TempDir;

mod common;

use common::{MountStack, have_root};

#[test]
fn well_known_mounts() -> Result<(), Box<dyn Error>> {
    assert!(is_mounted("/")?);
    assert!(is_mounted("/proc")?);
    assert!(!is_mounted("/proc/self")?);
    Ok(())
}

#[test]
fn plain_paths_are_not_mounted() -> Result<(), Box<dyn Error>> {
    let temp_dir = TempDir::new()?;
    let dir = temp_dir.path().join("dir");
    let file = temp_dir.path().join("file");
    fs::create_dir(&dir)?;
    fs::write(&file, "")?;

    for path in [&dir, &file] {
        assert!(!is_mounted(path)?, "{} should not be mounted", path.display());
        let fast = is_mounted_fast(path)?;
        assert!(!fast.mounted);
    }
    Ok(())
}

#[test]
fn symlink_to_root_is_mounted() -> Result<(), Box<dyn Error>> {
    let temp_dir = TempDir::new()?;
    let link = temp_dir.path().join("root-link");
    symlink("/", &link)?;
    assert!(is_mounted(&link)?);
    Ok(())
}

#[test]
fn missing_path_is_not_found() -> Result<(), Box<dyn Error>> {
    let temp_dir = TempDir::new()?;
    let err = is_mounted(temp_dir.path().join("missing")).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    Ok(())
}

#[test_log::test]
fn detects_tmpfs_and_bind_mounts() -> Result<(), Box<dyn Error>> {
    if !have_root() {
        return Ok(());
    }

    let temp_dir = TempDir::new()?;
    let base = temp_dir.path().canonicalize()?;
    let mut stack = MountStack::new();

    let tmpfs = base.join("tmpfs-mount");
    fs::create_dir(&tmpfs)?;
    stack.tmpfs(&tmpfs)?;

    let bind_self = base.join("bind-mount-dir");
    fs::create_dir(&bind_self)?;
    stack.bind(&bind_self, &bind_self)?;

    let source = base.join("some-dir");
    let bind_other = base.join("bind-mounted-dir2");
    fs::create_dir(&source)?;
    fs::create_dir(&bind_other)?;
    stack.bind(&source, &bind_other)?;

    let bind_file = base.join("bind-mount-file");
    fs::write(&bind_file, "")?;
    stack.bind(&bind_file, &bind_file)?;

    let link = base.join("link-to-tmpfs");
    symlink(&tmpfs, &link)?;

    let not_mounted = base.join("not-mounted");
    fs::create_dir(&not_mounted)?;

    let table_only = MountDetector::with_config(MountConfig::default().table_only());
    let mounted: [&PathBuf; 5] = [&tmpfs, &bind_self, &bind_other, &bind_file, &link];

    for path in mounted {
        assert!(is_mounted(path)?, "{} should be mounted", path.display());
        assert!(table_only.is_mounted(path)?, "{} missing from table", path.display());

        let fast = is_mounted_fast(path)?;
        assert!(
            fast.mounted || !fast.certain,
            "fast check wrongly certain for {}",
            path.display()
        );
    }

    assert!(!is_mounted(&not_mounted)?);
    assert!(!table_only.is_mounted(&not_mounted)?);
    assert!(!is_mounted_fast(&not_mounted)?.mounted);
    Ok(())
}
