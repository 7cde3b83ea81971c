//! Common error types for mountkit.

use std::fmt;
use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`MountError`].
pub type MountResult<T> = Result<T, MountError>;

/// Why a mount table line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Fewer than the ten mandatory fields.
    NotEnoughFields(usize),
    /// No `-` separator between the optional fields and the filesystem type.
    MissingSeparator,
    /// The `major:minor` field has no colon.
    InvalidDevice(String),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEnoughFields(n) => write!(f, "not enough fields ({n})"),
            Self::MissingSeparator => f.write_str("missing - separator"),
            Self::InvalidDevice(field) => write!(f, "unexpected major:minor pair {field}"),
        }
    }
}

/// Errors produced while inspecting or tearing down mounts.
#[derive(Error, Diagnostic, Debug)]
pub enum MountError {
    /// Path does not exist.
    #[error("path not found: {}", .path.display())]
    #[diagnostic(code(mountkit::path::not_found))]
    NotFound {
        /// The path that was looked up.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Path exists but could not be made absolute or canonical.
    #[error("failed to canonicalise path {}: {source}", .path.display())]
    #[diagnostic(code(mountkit::path::resolution))]
    Resolution {
        /// The path that was resolved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Malformed mount table line.
    #[error("parsing '{line}' failed: {kind}")]
    #[diagnostic(
        code(mountkit::mountinfo::parse),
        help("Each line needs at least 10 space separated fields and a '-' separator")
    )]
    Parse {
        /// The offending line.
        line: String,
        /// Number of fields the line split into.
        fields: usize,
        /// What was wrong with it.
        kind: ParseErrorKind,
    },

    /// A system call failed.
    #[error("{op} {} (flags {flags:#x}): {source}", .path.display())]
    #[diagnostic(code(mountkit::syscall))]
    Syscall {
        /// Operation name, e.g. `umount`.
        op: &'static str,
        /// Target of the operation.
        path: PathBuf,
        /// Raw flags passed to the call.
        flags: u64,
        /// The OS error.
        #[source]
        source: io::Error,
    },

    /// A submount listed in the table can no longer be reached by path lookup.
    #[error("submount {} is shadowed and cannot be unmounted: {source}", .mountpoint.display())]
    #[diagnostic(
        code(mountkit::unmount::shadowed),
        help("Another mount was stacked above this one; unmount the shadowing mount first")
    )]
    ShadowedSubmount {
        /// Mountpoint as recorded in the mount table.
        mountpoint: PathBuf,
        /// The OS error (usually `ENOENT`).
        #[source]
        source: io::Error,
    },

    /// The root-most mount of a recursive unmount could not be removed.
    #[error(
        "{source}{}",
        .cause.as_ref().map(|c| format!(" (possible cause: {c})")).unwrap_or_default()
    )]
    #[diagnostic(code(mountkit::unmount::recursive))]
    Unmount {
        /// Failure of the final (root-most) unmount.
        #[source]
        source: Box<MountError>,
        /// First submount failure seen during the same pass.
        cause: Option<Box<MountError>>,
    },

    /// Unrecognised or malformed mount option.
    #[error("invalid tmpfs option {option:?}")]
    #[diagnostic(
        code(mountkit::options::invalid),
        help("tmpfs accepts size, mode, uid, gid, nr_inodes, nr_blocks and mpol as key=value options")
    )]
    InvalidOption {
        /// The option as given.
        option: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(mountkit::io))]
    Io(#[from] io::Error),

    /// Feature not supported on this platform.
    #[error("Feature not supported: {feature}")]
    #[diagnostic(code(mountkit::unsupported))]
    Unsupported {
        /// The unsupported feature.
        feature: String,
    },
}

impl MountError {
    /// Build a [`MountError::Syscall`].
    pub fn syscall(
        op: &'static str,
        path: impl Into<PathBuf>,
        flags: u64,
        source: impl Into<io::Error>,
    ) -> Self {
        Self::Syscall {
            op,
            path: path.into(),
            flags,
            source: source.into(),
        }
    }

    /// The errno behind this error, looking through wrapping layers.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::NotFound { source, .. }
            | Self::Resolution { source, .. }
            | Self::Syscall { source, .. }
            | Self::ShadowedSubmount { source, .. }
            | Self::Io(source) => source.raw_os_error(),
            Self::Unmount { source, .. } => source.raw_os_error(),
            Self::Parse { .. } | Self::InvalidOption { .. } | Self::Unsupported { .. } => None,
        }
    }

    /// Whether this is a "does not exist" failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Unmount { source, .. } => source.is_not_found(),
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
