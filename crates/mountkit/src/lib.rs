//! # Mountkit
//!
//! Mount point detection and mount tree teardown for Unix systems.
//!
//! ## Features
//!
//! - **Mount tables**: Parser for the kernel `mountinfo` format, live per-thread
//!   and per-process tables, and filters that bound the cost of a scan
//! - **Detection**: Tiered `is_mounted` checks that see bind mounts and survive
//!   truncated table reads
//! - **Teardown**: Lazy unmount of a mount and everything below it, deepest first
//!
//! ## Usage
//!
//! ```no_run
//! use mountkit::{is_mounted, recursive_unmount};
//!
//! # fn example() -> mountkit_common::MountResult<()> {
//! if is_mounted("/mnt/data")? {
//!     recursive_unmount("/mnt/data")?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod filesystem;
pub mod mounted;
pub mod mountinfo;
pub mod path;

pub use config::MountConfig;
#[cfg(target_os = "linux")]
pub use filesystem::{merge_tmpfs_options, parse_options};
pub use filesystem::{mount, recursive_unmount, unmount};
pub use mounted::{Detection, MountDetector, is_mounted, is_mounted_fast};
pub use mountinfo::{
    FilterDecision, MountFilter, MountInfo, MountTable, PrefixFilter, SingleEntryFilter,
    list_mounts, list_mounts_from_reader,
};
pub use mountkit_common::{MountError, MountResult};
pub use path::normalize_path;
