//! Tearing down a mount and everything mounted beneath it.

use std::cmp::Reverse;
use std::io;
use std::path::Path;

use mountkit_common::{MountError, MountResult};

use super::mounts::{detach, ignore_not_mounted};
use crate::mountinfo::{LiveMountTable, MountInfo, MountTable, PrefixFilter};
use crate::path::table_path;

/// Unmount `target` and every mount under it, deepest first.
///
/// `target` does not have to be a mount point itself.
pub fn recursive_unmount(target: impl AsRef<Path>) -> MountResult<()> {
    recursive_unmount_with(target.as_ref(), &LiveMountTable::new(), detach)
}

/// [`recursive_unmount`] over an arbitrary table, with `detach` as the
/// single-unmount primitive.
///
/// `detach` must report every failure, including `EINVAL` for a target that is
/// not mounted.
pub fn recursive_unmount_with<T, F>(target: &Path, table: &T, mut detach: F) -> MountResult<()>
where
    T: MountTable + ?Sized,
    F: FnMut(&Path) -> MountResult<()>,
{
    // With detach semantics this also takes out every submount. A target that
    // is not a mount point fails here, but may still have mounts below it.
    match detach(target) {
        Ok(()) => return Ok(()),
        Err(err) => {
            tracing::debug!(
                target = %target.display(),
                error = %err,
                "Direct unmount failed, unmounting submounts one by one"
            );
        }
    }

    let root = table_path(target);
    let snapshot = table.mounts(Some(&PrefixFilter::new(&root)))?;
    let plan = plan_unmount(snapshot, &root);
    tracing::debug!(target = %root.display(), mounts = plan.len(), "Unmount plan ready");

    let mut first_failure: Option<MountError> = None;
    let last = plan.len().saturating_sub(1);

    for (index, info) in plan.iter().enumerate() {
        let Err(err) = ignore_not_mounted(detach(&info.mountpoint)) else {
            continue;
        };

        if index == last {
            return Err(MountError::Unmount {
                source: Box::new(err),
                cause: first_failure.map(Box::new),
            });
        }

        // Later unmounts may clear this up; the final one fails if not.
        let err = classify_submount_failure(info, err);
        tracing::warn!(
            mountpoint = %info.mountpoint.display(),
            error = %err,
            "Failed to unmount submount"
        );
        if first_failure.is_none() {
            first_failure = Some(err);
        }
    }

    Ok(())
}

/// Mounts at or under `root` in the order they must be removed.
///
/// Deeper mountpoints always have longer paths, so sorting by length puts
/// children before their parents. Mounts of equal length keep table order.
#[must_use]
pub fn plan_unmount(snapshot: Vec<MountInfo>, root: &Path) -> Vec<MountInfo> {
    let mut plan: Vec<MountInfo> = snapshot
        .into_iter()
        .filter(|m| m.mountpoint.starts_with(root))
        .collect();
    plan.sort_by_key(|m| Reverse(m.mountpoint.as_os_str().len()));
    plan
}

/// A submount that vanished from path lookup while still in the table was
/// shadowed by a mount stacked over one of its ancestors.
fn classify_submount_failure(info: &MountInfo, err: MountError) -> MountError {
    match err.raw_os_error() {
        Some(errno) if errno == libc::ENOENT => MountError::ShadowedSubmount {
            mountpoint: info.mountpoint.clone(),
            source: io::Error::from_raw_os_error(errno),
        },
        _ => err,
    }
}
