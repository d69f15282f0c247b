//! Error taxonomy for runtime-directory operations.
//!
//! Every variant names the path the operation was acting on and, where the
//! failure came from the operating system, carries the underlying
//! [`io::Error`] as its source. The raw OS error code is recoverable through
//! [`RundirError::os_error`]; variants that classify a state rather than wrap
//! a single syscall (`NotADirectory`, `NotEmpty`, `InvalidPath`) synthesize
//! the conventional errno.

use std::io;
use std::path::PathBuf;

use rustix::io::Errno;
use thiserror::Error;

/// Result alias for runtime-directory operations.
pub type Result<T> = std::result::Result<T, RundirError>;

/// Errors that can occur while provisioning or erasing runtime directories.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RundirError {
    /// Opening a directory or a directory entry failed.
    #[error("failed to open {}: {source}", path.display())]
    OpenFailed {
        /// Path that could not be opened.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Creating a directory failed.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateFailed {
        /// Path that could not be created.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The name is occupied by something other than a directory (a regular
    /// file, a symlink, a special file).
    #[error("{} exists and is not a directory", path.display())]
    NotADirectory {
        /// Path of the non-directory occupant.
        path: PathBuf,
    },

    /// A reused directory's contents could not be fully erased.
    #[error("failed to empty directory {}: {source}", path.display())]
    NotEmpty {
        /// Path of the directory that still has contents.
        path: PathBuf,
        /// The erase failure that left contents behind.
        #[source]
        source: Box<RundirError>,
    },

    /// The requested path cannot name a runtime directory.
    #[error("invalid runtime directory path {}: {reason}", path.display())]
    InvalidPath {
        /// The rejected path.
        path: PathBuf,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The labeling backend could not compute a label for the path.
    #[error("failed to compute label for {}: {source}", path.display())]
    LabelLookupFailed {
        /// Path the label was requested for.
        path: PathBuf,
        /// The backend failure.
        #[source]
        source: io::Error,
    },

    /// The labeling backend could not install, apply, or reset a label.
    #[error("failed to apply label to {}: {source}", path.display())]
    LabelApplyFailed {
        /// Path the label was meant for.
        path: PathBuf,
        /// The backend failure.
        #[source]
        source: io::Error,
    },

    /// Changing the owner of the runtime directory failed.
    #[error("failed to change ownership of {}: {source}", path.display())]
    OwnershipChangeFailed {
        /// Path whose ownership could not be changed.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Changing the permission bits of a directory failed.
    #[error("failed to change mode of {}: {source}", path.display())]
    PermissionChangeFailed {
        /// Path whose mode could not be changed.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Removing a directory entry failed.
    #[error("failed to unlink {}: {source}", path.display())]
    UnlinkFailed {
        /// Path of the entry that could not be removed.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Reading directory entries, or examining an entry that did open,
    /// failed mid-scan.
    #[error("failed to read directory {}: {source}", path.display())]
    ReadDirFailed {
        /// Directory (or entry) the scan failed on.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },
}

impl RundirError {
    /// The raw OS error code behind this error, where one exists.
    ///
    /// State-classifying variants report the conventional errno a C caller
    /// would have seen: `ENOTDIR` for [`NotADirectory`], `ENOTEMPTY` for
    /// [`NotEmpty`], `EINVAL` for [`InvalidPath`].
    ///
    /// [`NotADirectory`]: RundirError::NotADirectory
    /// [`NotEmpty`]: RundirError::NotEmpty
    /// [`InvalidPath`]: RundirError::InvalidPath
    #[must_use]
    pub fn os_error(&self) -> Option<i32> {
        match self {
            Self::NotADirectory { .. } => Some(Errno::NOTDIR.raw_os_error()),
            Self::NotEmpty { .. } => Some(Errno::NOTEMPTY.raw_os_error()),
            Self::InvalidPath { .. } => Some(Errno::INVAL.raw_os_error()),
            Self::OpenFailed { source, .. }
            | Self::CreateFailed { source, .. }
            | Self::LabelLookupFailed { source, .. }
            | Self::LabelApplyFailed { source, .. }
            | Self::OwnershipChangeFailed { source, .. }
            | Self::PermissionChangeFailed { source, .. }
            | Self::UnlinkFailed { source, .. }
            | Self::ReadDirFailed { source, .. } => source.raw_os_error(),
        }
    }

    /// The path this error is about.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::OpenFailed { path, .. }
            | Self::CreateFailed { path, .. }
            | Self::NotADirectory { path }
            | Self::NotEmpty { path, .. }
            | Self::InvalidPath { path, .. }
            | Self::LabelLookupFailed { path, .. }
            | Self::LabelApplyFailed { path, .. }
            | Self::OwnershipChangeFailed { path, .. }
            | Self::PermissionChangeFailed { path, .. }
            | Self::UnlinkFailed { path, .. }
            | Self::ReadDirFailed { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::{Path, PathBuf};

    use rustix::io::Errno;

    use super::RundirError;

    #[test]
    fn os_error_surfaces_wrapped_errno() {
        let err = RundirError::OpenFailed {
            path: PathBuf::from("/run/example"),
            source: io::Error::from(Errno::LOOP),
        };
        assert_eq!(err.os_error(), Some(Errno::LOOP.raw_os_error()));
    }

    #[test]
    fn os_error_synthesizes_classification_codes() {
        let not_dir = RundirError::NotADirectory {
            path: PathBuf::from("/run/example"),
        };
        assert_eq!(not_dir.os_error(), Some(Errno::NOTDIR.raw_os_error()));

        let not_empty = RundirError::NotEmpty {
            path: PathBuf::from("/run/example"),
            source: Box::new(not_dir),
        };
        assert_eq!(not_empty.os_error(), Some(Errno::NOTEMPTY.raw_os_error()));

        let invalid = RundirError::InvalidPath {
            path: PathBuf::from("relative"),
            reason: "must be absolute",
        };
        assert_eq!(invalid.os_error(), Some(Errno::INVAL.raw_os_error()));
    }

    #[test]
    fn display_names_the_failing_path() {
        let err = RundirError::UnlinkFailed {
            path: PathBuf::from("/run/example/stale.sock"),
            source: io::Error::from(Errno::ACCESS),
        };
        assert!(err.to_string().contains("/run/example/stale.sock"));
        assert_eq!(err.path(), Path::new("/run/example/stale.sock"));
    }
}
