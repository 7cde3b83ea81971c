#![allow(unsafe_code)]
//! Mount table for FreeBSD, OpenBSD and macOS, via getfsstat(2).

use std::io;
use std::mem;
use std::path::PathBuf;

use mountkit_common::{MountError, MountResult};

use super::{FilterDecision, MountFilter, MountInfo};

/// Map one `statfs` record to a [`MountInfo`].
///
/// Only the mountpoint, filesystem type and source are known on these systems.
fn record_from_statfs(entry: &libc::statfs) -> MountInfo {
    MountInfo {
        mountpoint: PathBuf::from(c_chars_to_string(&entry.f_mntonname)),
        fs_type: c_chars_to_string(&entry.f_fstypename),
        source: c_chars_to_string(&entry.f_mntfromname),
        ..Default::default()
    }
}

/// `c_char` is signed on some targets and unsigned on others.
#[allow(clippy::cast_sign_loss)]
fn c_chars_to_string(chars: &[libc::c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub(crate) fn read_fsstat(filter: Option<&dyn MountFilter>) -> MountResult<Vec<MountInfo>> {
    // SAFETY: a null buffer only asks for the number of mounted filesystems.
    let count = unsafe { libc::getfsstat(std::ptr::null_mut(), 0, libc::MNT_WAIT) };
    let count = usize::try_from(count).map_err(|_| getfsstat_error())?;

    let mut entries: Vec<libc::statfs> = Vec::with_capacity(count);
    let bufsize = count * mem::size_of::<libc::statfs>();

    // SAFETY: the buffer has room for `count` records and the kernel writes at
    // most `bufsize` bytes into it.
    let filled = unsafe { libc::getfsstat(entries.as_mut_ptr(), bufsize as _, libc::MNT_WAIT) };
    let filled = usize::try_from(filled).map_err(|_| getfsstat_error())?;

    // SAFETY: the kernel initialised the first `filled` records, and `filled`
    // cannot exceed the capacity it was told about.
    unsafe { entries.set_len(filled.min(count)) };

    let mut out = Vec::new();
    for entry in &entries {
        let info = record_from_statfs(entry);
        let decision = filter.map_or(FilterDecision::KEEP, |f| f.decide(&info));
        if decision.skip {
            continue;
        }
        out.push(info);
        if decision.stop {
            break;
        }
    }

    tracing::trace!(total = entries.len(), kept = out.len(), "Read mount table");
    Ok(out)
}

fn getfsstat_error() -> MountError {
    MountError::syscall("getfsstat", "/", 0, io::Error::last_os_error())
}
