#![allow(unsafe_code)]
//! Single mount and unmount operations.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use mountkit_common::{MountError, MountResult};

/// Mount `device` on `target`.
///
/// `options` is an fstab-style list such as `"bind,ro"` or `"size=10k,noexec"`.
/// Propagation types and the read-only flag of a bind mount cannot be applied
/// by the initial mount(2) call, so they are applied by follow-up calls.
#[cfg(target_os = "linux")]
pub fn mount(
    device: &str,
    target: impl AsRef<Path>,
    fs_type: &str,
    options: &str,
) -> MountResult<()> {
    use super::options::{BIND_READONLY, PROPAGATION_FLAGS, PROPAGATION_TYPES, parse_options};

    let target = target.as_ref();
    let (flags, data) = parse_options(options);
    let initial = flags & !PROPAGATION_TYPES;

    tracing::debug!(
        device,
        target = %target.display(),
        fs_type,
        flags = format_args!("{flags:#x}"),
        data = %data,
        "Mounting filesystem"
    );

    if initial & libc::MS_REMOUNT == 0 || !data.is_empty() {
        raw_mount("mount", device, target, fs_type, initial, &data)?;
    }

    if flags & PROPAGATION_TYPES != 0 {
        raw_mount("remount", "", target, "", flags & PROPAGATION_FLAGS, "")?;
    }

    if initial & BIND_READONLY == BIND_READONLY {
        raw_mount("remount-ro", "", target, "", initial | libc::MS_REMOUNT, "")?;
    }

    Ok(())
}

/// Mounting is only implemented for Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount(
    _device: &str,
    _target: impl AsRef<Path>,
    _fs_type: &str,
    _options: &str,
) -> MountResult<()> {
    Err(MountError::Unsupported {
        feature: "mount".to_string(),
    })
}

#[cfg(target_os = "linux")]
fn raw_mount(
    op: &'static str,
    device: &str,
    target: &Path,
    fs_type: &str,
    flags: libc::c_ulong,
    data: &str,
) -> MountResult<()> {
    let err = |e: io::Error| MountError::syscall(op, target, u64::from(flags), e);

    let device = c_string(device.as_bytes()).map_err(err)?;
    let c_target = c_string(target.as_os_str().as_bytes()).map_err(err)?;
    let fs_type = c_string(fs_type.as_bytes()).map_err(err)?;
    let data = c_string(data.as_bytes()).map_err(err)?;

    // SAFETY: every pointer is a valid NUL-terminated string that outlives the call.
    let rc = unsafe {
        libc::mount(
            device.as_ptr(),
            c_target.as_ptr(),
            fs_type.as_ptr(),
            flags,
            data.as_ptr().cast(),
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(err(io::Error::last_os_error()))
    }
}

fn c_string(bytes: &[u8]) -> io::Result<CString> {
    CString::new(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// Lazily unmount `target`.
///
/// Where detach is not available a plain unmount is issued. A target that is
/// not a mount point is not an error.
pub fn unmount(target: impl AsRef<Path>) -> MountResult<()> {
    ignore_not_mounted(detach(target.as_ref()))
}

/// Map the "not mounted" error of an unmount to success.
///
/// The kernel reports `EINVAL` both for a non-mount target and for bad flags;
/// the flags used here are always valid.
pub(crate) fn ignore_not_mounted(result: MountResult<()>) -> MountResult<()> {
    match result {
        Err(err) if err.raw_os_error() == Some(libc::EINVAL) => {
            tracing::trace!(error = %err, "Target was not mounted");
            Ok(())
        }
        other => other,
    }
}

/// One unmount call, with every error reported.
#[cfg(target_os = "linux")]
pub(crate) fn detach(target: &Path) -> MountResult<()> {
    use rustix::mount::{UnmountFlags, unmount};

    let flags = UnmountFlags::DETACH;
    tracing::debug!(target = %target.display(), "Unmounting filesystem");
    unmount(target, flags)
        .map_err(|e| MountError::syscall("umount", target, u64::from(flags.bits()), e))
}

#[cfg(any(target_os = "freebsd", target_os = "openbsd", target_os = "macos"))]
pub(crate) fn detach(target: &Path) -> MountResult<()> {
    tracing::debug!(target = %target.display(), "Unmounting filesystem");
    let err = |e: io::Error| MountError::syscall("umount", target, 0, e);
    let c_target = c_string(target.as_os_str().as_bytes()).map_err(err)?;

    // SAFETY: `c_target` is a valid NUL-terminated path.
    if unsafe { libc::unmount(c_target.as_ptr(), 0) } == 0 {
        Ok(())
    } else {
        Err(err(io::Error::last_os_error()))
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "macos"
)))]
pub(crate) fn detach(_target: &Path) -> MountResult<()> {
    Err(MountError::Unsupported {
        feature: "unmount".to_string(),
    })
}
