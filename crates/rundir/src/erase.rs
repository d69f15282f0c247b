//! Recursive, descriptor-relative erasure of directory contents.
//!
//! Every entry is opened relative to its parent descriptor with
//! `O_NOFOLLOW`, so symlinks are unlinked, never followed, and a name
//! swapped mid-scan cannot redirect the erase outside the originally opened
//! tree. Entries that refuse to open (invalid sockets and similar) are
//! unlinked anyway; an entry that opened but cannot be stat'ed aborts the
//! whole erase. Changing either side of that asymmetry changes failure
//! semantics for edge-case filesystem objects.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

use rustix::fs::{Dir, OFlags};
use tracing::{debug, error};

use crate::error::{Result, RundirError};
use crate::handle::{fd_is_dir, DirHandle};

/// Counts of entries removed by a successful [`clear_contents`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EraseStats {
    /// Non-directory entries removed (files, symlinks, special files).
    pub files_removed: u64,
    /// Subdirectories removed after their own contents were cleared.
    pub dirs_removed: u64,
}

/// Delete everything inside `dir`, leaving the directory itself empty.
///
/// Consumes the handle regardless of outcome. Subdirectories are cleared
/// recursively before being removed; a recursive failure aborts the whole
/// call without continuing the sibling scan.
///
/// # Errors
///
/// [`RundirError::ReadDirFailed`] if the entry stream fails or an opened
/// entry cannot be stat'ed; [`RundirError::UnlinkFailed`] if any removal
/// fails. On error the directory is left partially cleared.
pub fn clear_contents(dir: DirHandle) -> Result<EraseStats> {
    let mut stats = EraseStats::default();
    clear_into(&dir, &mut stats)?;
    Ok(stats)
}

fn clear_into(dir: &DirHandle, stats: &mut EraseStats) -> Result<()> {
    let entries = Dir::read_from(dir).map_err(|err| {
        error!(path = %dir.path().display(), error = %err, "failed to read directory");
        RundirError::ReadDirFailed {
            path: dir.path().to_path_buf(),
            source: err.into(),
        }
    })?;

    for entry in entries {
        let entry = entry.map_err(|err| {
            error!(path = %dir.path().display(), error = %err, "failed to read directory entry");
            RundirError::ReadDirFailed {
                path: dir.path().to_path_buf(),
                source: err.into(),
            }
        })?;
        let name = entry.file_name();
        if name.to_bytes() == b"." || name.to_bytes() == b".." {
            continue;
        }
        let entry_path = dir.path().join(OsStr::from_bytes(name.to_bytes()));
        debug!(entry = %entry_path.display(), "clearing entry");

        let mut remove_as_dir = false;
        // Entries like invalid sockets refuse to open; unlink them blind.
        if let Ok(fd) = dir.open_child(name, OFlags::NONBLOCK) {
            let is_dir = match fd_is_dir(&fd) {
                Ok(is_dir) => is_dir,
                Err(err) => {
                    error!(entry = %entry_path.display(), error = %err, "failed to stat entry");
                    return Err(RundirError::ReadDirFailed {
                        path: entry_path,
                        source: err.into(),
                    });
                }
            };
            if is_dir {
                let child = DirHandle::from_parts(fd, entry_path.clone());
                clear_into(&child, stats)?;
                drop(child);
                remove_as_dir = true;
            }
        }

        if let Err(err) = dir.remove_child(name, remove_as_dir) {
            error!(entry = %entry_path.display(), error = %err, "failed to unlink entry");
            return Err(RundirError::UnlinkFailed {
                path: entry_path,
                source: err.into(),
            });
        }
        if remove_as_dir {
            stats.dirs_removed = stats.dirs_removed.saturating_add(1);
        } else {
            stats.files_removed = stats.files_removed.saturating_add(1);
        }
    }

    Ok(())
}
