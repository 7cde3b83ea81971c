//! Mount and unmount operations.
//!
//! This module handles:
//! - fstab-style option parsing and tmpfs option merging
//! - Mounting with follow-up propagation and read-only remounts
//! - Lazy unmounting of one mount or of a whole mount tree

mod mounts;
#[cfg(target_os = "linux")]
mod options;
mod recursive;

pub use mounts::{mount, unmount};
#[cfg(target_os = "linux")]
pub use options::{MountFlagBits, merge_tmpfs_options, parse_options};
pub(crate) use mounts::detach;
pub use recursive::{plan_unmount, recursive_unmount, recursive_unmount_with};
