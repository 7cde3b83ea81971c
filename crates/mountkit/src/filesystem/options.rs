//! fstab-style mount option strings.

use std::collections::HashSet;

use libc::c_ulong;
use mountkit_common::{MountError, MountResult};

/// Raw `MS_*` bits as passed to mount(2).
pub type MountFlagBits = c_ulong;

/// Propagation type bits. Only one may be applied per call.
pub(crate) const PROPAGATION_TYPES: MountFlagBits =
    libc::MS_SHARED | libc::MS_PRIVATE | libc::MS_SLAVE | libc::MS_UNBINDABLE;

/// Bits accepted by a propagation change.
pub(crate) const PROPAGATION_FLAGS: MountFlagBits =
    PROPAGATION_TYPES | libc::MS_REC | libc::MS_SILENT;

/// A bind mount needs a separate remount to become read-only.
pub(crate) const BIND_READONLY: MountFlagBits = libc::MS_BIND | libc::MS_RDONLY;

/// Data keys tmpfs understands.
const TMPFS_DATA_KEYS: &[&str] = &["size", "mode", "uid", "gid", "nr_inodes", "nr_blocks", "mpol"];

/// How an option name maps onto flag bits.
#[derive(Debug, Clone, Copy)]
struct FlagOption {
    /// Clear the bits instead of setting them.
    clear: bool,
    bits: MountFlagBits,
}

const fn set(bits: MountFlagBits) -> FlagOption {
    FlagOption { clear: false, bits }
}

const fn clear(bits: MountFlagBits) -> FlagOption {
    FlagOption { clear: true, bits }
}

fn flag_option(name: &str) -> Option<FlagOption> {
    let option = match name {
        "ro" => set(libc::MS_RDONLY),
        "rw" => clear(libc::MS_RDONLY),
        "suid" => clear(libc::MS_NOSUID),
        "nosuid" => set(libc::MS_NOSUID),
        "dev" => clear(libc::MS_NODEV),
        "nodev" => set(libc::MS_NODEV),
        "exec" => clear(libc::MS_NOEXEC),
        "noexec" => set(libc::MS_NOEXEC),
        "sync" => set(libc::MS_SYNCHRONOUS),
        "async" => clear(libc::MS_SYNCHRONOUS),
        "dirsync" => set(libc::MS_DIRSYNC),
        "remount" => set(libc::MS_REMOUNT),
        "mand" => set(libc::MS_MANDLOCK),
        "nomand" => clear(libc::MS_MANDLOCK),
        "atime" => clear(libc::MS_NOATIME),
        "noatime" => set(libc::MS_NOATIME),
        "diratime" => clear(libc::MS_NODIRATIME),
        "nodiratime" => set(libc::MS_NODIRATIME),
        "bind" => set(libc::MS_BIND),
        "rbind" => set(libc::MS_BIND | libc::MS_REC),
        "unbindable" => set(libc::MS_UNBINDABLE),
        "runbindable" => set(libc::MS_UNBINDABLE | libc::MS_REC),
        "private" => set(libc::MS_PRIVATE),
        "rprivate" => set(libc::MS_PRIVATE | libc::MS_REC),
        "shared" => set(libc::MS_SHARED),
        "rshared" => set(libc::MS_SHARED | libc::MS_REC),
        "slave" => set(libc::MS_SLAVE),
        "rslave" => set(libc::MS_SLAVE | libc::MS_REC),
        "relatime" => set(libc::MS_RELATIME),
        "norelatime" => clear(libc::MS_RELATIME),
        "strictatime" => set(libc::MS_STRICTATIME),
        "nostrictatime" => clear(libc::MS_STRICTATIME),
        _ => return None,
    };
    Some(option)
}

/// Split `options` into mount flags and the filesystem data string.
///
/// Known flag names set or clear bits in order, so later options win. Anything
/// else is passed through as data. `defaults` and empty items are dropped.
#[must_use]
pub fn parse_options(options: &str) -> (MountFlagBits, String) {
    let mut flags: MountFlagBits = 0;
    let mut data = Vec::new();

    for option in options.split(',') {
        if option.is_empty() || option == "defaults" {
            continue;
        }
        match flag_option(option) {
            Some(FlagOption { clear: true, bits }) => flags &= !bits,
            Some(FlagOption { clear: false, bits }) => flags |= bits,
            None => data.push(option),
        }
    }

    (flags, data.join(","))
}

/// Collapse a tmpfs option list so each setting appears once.
///
/// Options are read last to first and only the last occurrence of each flag
/// (all propagation types count as one) and of each data key is kept, in its
/// original position relative to the others.
pub fn merge_tmpfs_options<S: AsRef<str>>(options: &[S]) -> MountResult<Vec<String>> {
    let mut seen_flags: HashSet<MountFlagBits> = HashSet::new();
    let mut seen_keys: HashSet<&str> = HashSet::new();
    let mut merged = Vec::new();

    for option in options.iter().rev() {
        let option: &str = option.as_ref();
        if option == "defaults" {
            continue;
        }

        if let Some(flag) = flag_option(option) {
            let key = if flag.bits & PROPAGATION_TYPES == 0 {
                flag.bits
            } else {
                PROPAGATION_TYPES
            };
            if seen_flags.insert(key) {
                merged.push(option.to_string());
            }
            continue;
        }

        let key = match option.split_once('=') {
            Some((key, _)) if TMPFS_DATA_KEYS.contains(&key) => key,
            _ => {
                return Err(MountError::InvalidOption {
                    option: option.to_string(),
                });
            }
        };
        if seen_keys.insert(key) {
            merged.push(option.to_string());
        }
    }

    merged.reverse();
    Ok(merged)
}
