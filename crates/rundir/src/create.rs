//! Create-or-reuse of a single directory entry under an open parent.

use std::ffi::OsStr;
use std::path::Path;

use rustix::fs::OFlags;
use rustix::io::Errno;

use crate::creation::{AmbientLabelContext, UmaskGuard};
use crate::erase::clear_contents;
use crate::error::{Result, RundirError};
use crate::handle::{fd_is_dir, DirHandle};
use crate::label::{Labeling, SecurityLabel};

/// Ensure a directory named `name` with permission bits `mode` exists
/// directly under `parent`, returning an open verified handle to it.
///
/// A pre-existing directory is reused: its mode is reset to exactly `mode`,
/// it is relabeled when labeling is active, and everything inside it is
/// erased. A pre-existing non-directory occupant (regular file, symlink,
/// special file) fails the call and nothing is deleted.
///
/// The process umask is forced to 0 for the duration so `mode` is applied
/// exactly, and the ambient creation context, when labeling is active, is
/// installed before any creation call and cleared again on every exit path.
/// Both are process-wide; see the crate-level serialization requirement.
///
/// # Errors
///
/// [`RundirError::NotADirectory`] for a non-directory occupant,
/// [`RundirError::NotEmpty`] when a reused directory cannot be fully
/// erased, and [`RundirError::OpenFailed`] / [`RundirError::CreateFailed`] /
/// [`RundirError::PermissionChangeFailed`] / label errors for the
/// corresponding failed step. A `CreateFailed` carrying `EEXIST` means a
/// concurrent creator won the race for the name.
pub fn create_or_reuse_dir<L: Labeling>(
    labeling: &L,
    parent: &DirHandle,
    name: &OsStr,
    mode: u32,
) -> Result<DirHandle> {
    let path = parent.path().join(name);
    let _mask = UmaskGuard::set(0);

    let label = labeling
        .lookup(&path, mode)
        .map_err(|err| RundirError::LabelLookupFailed {
            path: path.clone(),
            source: err,
        })?;
    let ambient = match &label {
        Some(label) => Some(AmbientLabelContext::install(labeling, label).map_err(|err| {
            RundirError::LabelApplyFailed {
                path: path.clone(),
                source: err,
            }
        })?),
        None => None,
    };

    let result = create_or_reuse_inner(labeling, parent, name, mode, &path, label.as_ref());

    match (result, ambient) {
        (result, None) => result,
        // A failed reset on the success path fails the whole call: objects
        // created later by this process would inherit the stale context.
        (Ok(handle), Some(ambient)) => match ambient.clear() {
            Ok(()) => Ok(handle),
            Err(err) => Err(RundirError::LabelApplyFailed { path, source: err }),
        },
        // On the error path the guard clears the context as it drops.
        (Err(err), Some(ambient)) => {
            drop(ambient);
            Err(err)
        }
    }
}

fn create_or_reuse_inner<L: Labeling>(
    labeling: &L,
    parent: &DirHandle,
    name: &OsStr,
    mode: u32,
    path: &Path,
    label: Option<&SecurityLabel>,
) -> Result<DirHandle> {
    // Reuse whatever already opens as a directory; anything else falls
    // through to creation.
    let existing = match parent.open_child(name, OFlags::empty()) {
        Ok(fd) => match fd_is_dir(&fd) {
            Ok(true) => Some(fd),
            Ok(false) | Err(_) => None,
        },
        Err(_) => None,
    };

    let Some(fd) = existing else {
        return create_fresh(parent, name, mode, path);
    };

    let handle = DirHandle::from_parts(fd, path.to_path_buf());
    handle
        .set_mode(mode)
        .map_err(|err| RundirError::PermissionChangeFailed {
            path: path.to_path_buf(),
            source: err.into(),
        })?;
    // Content erasure consumes the handle it is given; keep one to return.
    let scratch = handle.try_clone()?;

    if let Some(label) = label {
        labeling
            .apply(path, label)
            .map_err(|err| RundirError::LabelApplyFailed {
                path: path.to_path_buf(),
                source: err,
            })?;
    }

    if let Err(err) = clear_contents(scratch) {
        return Err(RundirError::NotEmpty {
            path: path.to_path_buf(),
            source: Box::new(err),
        });
    }

    Ok(handle)
}

fn create_fresh(parent: &DirHandle, name: &OsStr, mode: u32, path: &Path) -> Result<DirHandle> {
    if let Err(err) = parent.make_child_dir(name, mode) {
        if err == Errno::EXIST {
            // Either a non-directory occupies the name, or a concurrent
            // creator won a race for it.
            if matches!(parent.child_is_dir(name), Ok(true)) {
                return Err(RundirError::CreateFailed {
                    path: path.to_path_buf(),
                    source: err.into(),
                });
            }
            return Err(RundirError::NotADirectory {
                path: path.to_path_buf(),
            });
        }
        return Err(RundirError::CreateFailed {
            path: path.to_path_buf(),
            source: err.into(),
        });
    }

    // A separate create-then-open cannot be atomic; the verified re-open
    // refuses anything swapped in behind the mkdirat.
    parent.open_subdir(name)
}
