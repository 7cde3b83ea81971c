//! # mountkit-common
//!
//! Shared types for the mountkit crates:
//! - The [`MountError`] taxonomy and [`MountResult`] alias
//! - Procfs locations of the kernel mount table

#![warn(missing_docs)]

pub mod error;
pub mod paths;

pub use error::{MountError, MountResult, ParseErrorKind};
pub use paths::ProcPaths;
