//! Best-effort teardown of a runtime directory tree.

use std::fmt;
use std::path::Path;

use rustix::fs::{self, AtFlags, Mode};
use rustix::io::Errno;
use tracing::debug;

use crate::erase::clear_contents;
use crate::handle::{fd_is_dir, DirHandle, DIR_OPEN_FLAGS};

/// Outcome of a [`reclaim`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReclaimOutcome {
    /// Contents erased and the directory removed.
    Removed {
        /// Non-directory entries removed.
        files_removed: u64,
        /// Subdirectories removed.
        dirs_removed: u64,
    },
    /// Nothing to reclaim: the path does not exist.
    AlreadyAbsent,
    /// The path names something other than a directory; it was left
    /// untouched.
    NotADirectory,
    /// The tree could not be fully removed; the failure was logged and the
    /// remains were left in place for inspection or a later retry.
    Failed,
}

impl fmt::Display for ReclaimOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Removed {
                files_removed,
                dirs_removed,
            } => write!(
                f,
                "removed ({files_removed} files, {dirs_removed} directories)"
            ),
            Self::AlreadyAbsent => write!(f, "already absent"),
            Self::NotADirectory => write!(f, "not a directory"),
            Self::Failed => write!(f, "not fully removed"),
        }
    }
}

/// Delete the runtime directory at `path` and everything inside it.
///
/// Never returns an error: teardown must not block or crash the caller.
/// The path is opened without following a final symlink and only acted on
/// if the opened object is a directory, so an arbitrary path handed to this
/// entry point cannot unlink anything but a runtime directory tree.
pub fn reclaim(path: &Path) -> ReclaimOutcome {
    debug!(path = %path.display(), "clearing runtime directory");

    let fd = match fs::open(path, DIR_OPEN_FLAGS, Mode::empty()) {
        Ok(fd) => fd,
        Err(err) if err == Errno::NOENT => return ReclaimOutcome::AlreadyAbsent,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "could not open runtime directory");
            return ReclaimOutcome::Failed;
        }
    };
    match fd_is_dir(&fd) {
        Ok(true) => {}
        Ok(false) => {
            debug!(path = %path.display(), "not a directory, leaving in place");
            return ReclaimOutcome::NotADirectory;
        }
        Err(err) => {
            debug!(path = %path.display(), error = %err, "could not stat runtime directory");
            return ReclaimOutcome::Failed;
        }
    }

    let handle = DirHandle::from_parts(fd, path.to_path_buf());
    let stats = match clear_contents(handle) {
        Ok(stats) => stats,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "failed to clear contents");
            return ReclaimOutcome::Failed;
        }
    };

    if let Err(err) = fs::unlinkat(fs::CWD, path, AtFlags::REMOVEDIR) {
        debug!(path = %path.display(), error = %err, "failed to remove emptied directory");
        return ReclaimOutcome::Failed;
    }

    debug!(
        path = %path.display(),
        files = stats.files_removed,
        dirs = stats.dirs_removed,
        "runtime directory removed"
    );
    ReclaimOutcome::Removed {
        files_removed: stats.files_removed,
        dirs_removed: stats.dirs_removed,
    }
}
