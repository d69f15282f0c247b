//! Provisioning of the full runtime-directory path.
//!
//! The walk starts from an open handle on the filesystem root and advances
//! one component at a time through descriptor-relative opens, so no
//! component is ever resolved as part of a longer string and no symlink is
//! ever followed. Intermediate directories are created with mode 0755 when
//! missing and only type-checked when present; the leaf is created or
//! sanitized to mode 0700, labeled, and handed to its owner.

use std::ffi::OsStr;
use std::path::{Component, Path};

use rustix::fs::OFlags;
use tracing::{debug, error};

use crate::creation::{AmbientLabelContext, UmaskGuard};
use crate::error::{Result, RundirError};
use crate::handle::{fd_is_dir, DirHandle};
use crate::label::{Labeling, SecurityLabel};

/// Mode for newly created intermediate directories.
const PARENT_DIR_MODE: u32 = 0o755;

/// Mode for the runtime directory itself.
const RUNTIME_DIR_MODE: u32 = 0o700;

/// Umask for the parent-walk phase; keeps fresh intermediates at exactly
/// 0755 even under a permissive inherited umask.
const PARENT_WALK_UMASK: u32 = 0o022;

/// Ensure every directory in `path` exists and that the final component is
/// a runtime directory: mode 0700, labeled when labeling is active, owned
/// by `uid:gid`.
///
/// Existing intermediate directories are only type-checked, never
/// re-permissioned; an existing leaf directory has its mode reset to 0700
/// and is relabeled, but its contents are preserved. Nothing is rolled back
/// on failure; a partially created parent chain is reused idempotently by
/// the next attempt.
///
/// Mutates the process umask and, when labeling is active, the ambient
/// creation context for the duration; see the crate-level serialization
/// requirement.
///
/// # Errors
///
/// The first irrecoverable failure, after logging it with the failing path:
/// [`RundirError::InvalidPath`] for a path this subsystem refuses to
/// provision, [`RundirError::NotADirectory`] when a walked component is not
/// a directory, and open/create/permission/label/ownership errors from the
/// corresponding failed step.
pub fn provision<L: Labeling>(labeling: &L, path: &Path, uid: u32, gid: u32) -> Result<()> {
    debug!(path = %path.display(), "making runtime directory");

    let (parents, leaf) = split_components(path)?;

    let mut current = DirHandle::open(Path::new("/")).inspect_err(
        |err| error!(error = %err, "failed to open filesystem root"),
    )?;

    {
        let _mask = UmaskGuard::set(PARENT_WALK_UMASK);
        for comp in parents {
            current = open_or_create_parent(&current, comp)?;
        }
    }

    let leaf_path = current.path().join(leaf);
    let label = labeling
        .lookup(&leaf_path, RUNTIME_DIR_MODE)
        .map_err(|err| {
            error!(path = %leaf_path.display(), error = %err, "failed to compute runtime directory label");
            RundirError::LabelLookupFailed {
                path: leaf_path.clone(),
                source: err,
            }
        })?;
    let ambient = match &label {
        Some(label) => Some(AmbientLabelContext::install(labeling, label).map_err(|err| {
            error!(path = %leaf_path.display(), error = %err, "failed to install creation context");
            RundirError::LabelApplyFailed {
                path: leaf_path.clone(),
                source: err,
            }
        })?),
        None => None,
    };

    let leaf_result = ensure_leaf(labeling, &current, leaf, &leaf_path, label.as_ref());

    // Reset the creation context before the ownership change so objects
    // created later by this process are labeled normally again; a failed
    // reset on the success path fails the provisioning.
    match (leaf_result, ambient) {
        (result, None) => result,
        (Ok(()), Some(ambient)) => ambient.clear().map_err(|err| {
            error!(path = %leaf_path.display(), error = %err, "failed to reset creation context");
            RundirError::LabelApplyFailed {
                path: leaf_path.clone(),
                source: err,
            }
        }),
        (Err(err), Some(ambient)) => {
            drop(ambient);
            Err(err)
        }
    }?;

    current.chown_child(leaf, uid, gid).map_err(|err| {
        error!(path = %leaf_path.display(), error = %err, "fchownat failed for runtime directory");
        RundirError::OwnershipChangeFailed {
            path: leaf_path.clone(),
            source: err.into(),
        }
    })?;

    Ok(())
}

/// Split an absolute path into intermediate components and the leaf.
pub(crate) fn split_components(path: &Path) -> Result<(Vec<&OsStr>, &OsStr)> {
    let invalid = |reason: &'static str| RundirError::InvalidPath {
        path: path.to_path_buf(),
        reason,
    };
    if !path.is_absolute() {
        return Err(invalid("must be absolute"));
    }
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(name) => components.push(name),
            Component::ParentDir => return Err(invalid("'..' components are not allowed")),
            Component::Prefix(_) => return Err(invalid("prefixed paths are not supported")),
        }
    }
    let leaf = components.pop().ok_or_else(|| invalid("no final component"))?;
    Ok((components, leaf))
}

/// Open the next walk component under `parent`, creating it with mode 0755
/// if missing, and verify it is a directory.
fn open_or_create_parent(parent: &DirHandle, name: &OsStr) -> Result<DirHandle> {
    let path = parent.path().join(name);
    debug!(path = %path.display(), "ensuring parent directory");

    let opened = match parent.open_child(name, OFlags::empty()) {
        Ok(fd) => Ok(fd),
        Err(_) => parent
            .make_child_dir(name, PARENT_DIR_MODE)
            .and_then(|()| parent.open_child(name, OFlags::empty())),
    };
    let fd = match opened {
        Ok(fd) => fd,
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to make parent directory");
            return Err(RundirError::CreateFailed {
                path,
                source: err.into(),
            });
        }
    };
    match fd_is_dir(&fd) {
        Ok(true) => Ok(DirHandle::from_parts(fd, path)),
        Ok(false) => {
            error!(path = %path.display(), "non-directory encountered on parent walk");
            Err(RundirError::NotADirectory { path })
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to stat parent directory");
            Err(RundirError::OpenFailed {
                path,
                source: err.into(),
            })
        }
    }
}

/// Create the leaf with mode 0700, or sanitize an existing leaf directory's
/// mode and label without touching its contents.
fn ensure_leaf<L: Labeling>(
    labeling: &L,
    parent: &DirHandle,
    name: &OsStr,
    path: &Path,
    label: Option<&SecurityLabel>,
) -> Result<()> {
    if !matches!(parent.child_is_dir(name), Ok(true)) {
        return parent
            .make_child_dir(name, RUNTIME_DIR_MODE)
            .map_err(|err| {
                error!(path = %path.display(), error = %err, "failed to make runtime directory");
                RundirError::CreateFailed {
                    path: path.to_path_buf(),
                    source: err.into(),
                }
            });
    }

    // Existing runtime directory: sanitize its mode, leave its contents.
    let fd = parent
        .open_child(name, OFlags::empty())
        .map_err(|err| {
            error!(path = %path.display(), error = %err, "failed to open runtime directory");
            RundirError::OpenFailed {
                path: path.to_path_buf(),
                source: err.into(),
            }
        })?;
    match fd_is_dir(&fd) {
        Ok(true) => {}
        Ok(false) => {
            error!(path = %path.display(), "runtime directory replaced by a non-directory");
            return Err(RundirError::NotADirectory {
                path: path.to_path_buf(),
            });
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to stat runtime directory");
            return Err(RundirError::OpenFailed {
                path: path.to_path_buf(),
                source: err.into(),
            });
        }
    }
    let leaf = DirHandle::from_parts(fd, path.to_path_buf());
    leaf.set_mode(RUNTIME_DIR_MODE).map_err(|err| {
        error!(path = %path.display(), error = %err, "fchmod failed for runtime directory");
        RundirError::PermissionChangeFailed {
            path: path.to_path_buf(),
            source: err.into(),
        }
    })?;

    if let Some(label) = label {
        labeling.apply(path, label).map_err(|err| {
            error!(path = %path.display(), error = %err, "failed to relabel runtime directory");
            RundirError::LabelApplyFailed {
                path: path.to_path_buf(),
                source: err,
            }
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs as stdfs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use rustix::fs::Mode;
    use rustix::process::umask;

    use super::{provision, split_components};
    use crate::error::RundirError;
    use crate::label::NoopLabeling;
    use crate::test_support::{process_state_lock, LabelEvent, RecordingLabeling};

    fn mode_of(path: &Path) -> u32 {
        stdfs::symlink_metadata(path)
            .expect("symlink_metadata")
            .permissions()
            .mode()
            & 0o7777
    }

    fn own_ids() -> (u32, u32) {
        (
            nix::unistd::getuid().as_raw(),
            nix::unistd::getgid().as_raw(),
        )
    }

    #[test]
    fn split_rejects_unusable_paths() {
        assert!(matches!(
            split_components(Path::new("run/example")),
            Err(RundirError::InvalidPath { .. })
        ));
        assert!(matches!(
            split_components(Path::new("/")),
            Err(RundirError::InvalidPath { .. })
        ));
        assert!(matches!(
            split_components(Path::new("/run/../example")),
            Err(RundirError::InvalidPath { .. })
        ));

        let (parents, leaf) = split_components(Path::new("/run/example/42")).expect("split");
        assert_eq!(parents.len(), 2);
        assert_eq!(leaf, "42");
    }

    #[test]
    fn provisions_parents_and_leaf_with_expected_modes() {
        let _env = process_state_lock();
        let base = tempfile::tempdir().expect("tempdir");
        let target = base.path().join("run").join("example").join("42");
        let (uid, gid) = own_ids();

        // A permissive inherited umask must not weaken the parents, and a
        // restrictive one must not weaken 0755.
        let previous = umask(Mode::from_bits_truncate(0o002));
        provision(&NoopLabeling, &target, uid, gid).expect("provision");
        let restored = umask(previous);
        assert_eq!(restored.bits(), 0o002, "umask restored after provisioning");

        assert_eq!(mode_of(&base.path().join("run")), 0o755);
        assert_eq!(mode_of(&base.path().join("run").join("example")), 0o755);
        assert_eq!(mode_of(&target), 0o700);
    }

    #[test]
    fn provisioning_is_idempotent_and_preserves_contents() {
        let _env = process_state_lock();
        let base = tempfile::tempdir().expect("tempdir");
        let target = base.path().join("svc").join("7");
        let (uid, gid) = own_ids();

        provision(&NoopLabeling, &target, uid, gid).expect("first provision");
        stdfs::write(target.join("live.pid"), b"1234").expect("write");
        // Weaken the mode so the second run has something to sanitize.
        stdfs::set_permissions(&target, stdfs::Permissions::from_mode(0o775))
            .expect("set perms");

        provision(&NoopLabeling, &target, uid, gid).expect("second provision");

        assert_eq!(mode_of(&target), 0o700, "mode sanitized back to 0700");
        assert_eq!(
            stdfs::read(target.join("live.pid")).expect("read"),
            b"1234",
            "provisioning must never erase a live runtime directory"
        );
    }

    #[test]
    fn existing_parents_are_not_repermissioned() {
        let _env = process_state_lock();
        let base = tempfile::tempdir().expect("tempdir");
        let parent = base.path().join("svc");
        stdfs::create_dir(&parent).expect("mkdir");
        stdfs::set_permissions(&parent, stdfs::Permissions::from_mode(0o750))
            .expect("set perms");
        let (uid, gid) = own_ids();

        provision(&NoopLabeling, &parent.join("7"), uid, gid).expect("provision");

        assert_eq!(mode_of(&parent), 0o750, "existing intermediates keep their mode");
    }

    #[test]
    fn symlinked_intermediate_component_fails() {
        let _env = process_state_lock();
        let base = tempfile::tempdir().expect("tempdir");
        let real = base.path().join("real");
        stdfs::create_dir(&real).expect("mkdir");
        std::os::unix::fs::symlink(&real, base.path().join("alias")).expect("symlink");
        let (uid, gid) = own_ids();

        let result = provision(
            &NoopLabeling,
            &base.path().join("alias").join("42"),
            uid,
            gid,
        );

        assert!(result.is_err(), "symlinked component must not be walked");
        assert!(
            !real.join("42").exists(),
            "nothing may be created through the symlink"
        );
    }

    #[test]
    fn symlinked_leaf_fails_without_touching_target() {
        let _env = process_state_lock();
        let base = tempfile::tempdir().expect("tempdir");
        let target = base.path().join("target");
        stdfs::create_dir(&target).expect("mkdir");
        stdfs::set_permissions(&target, stdfs::Permissions::from_mode(0o755))
            .expect("set perms");
        std::os::unix::fs::symlink(&target, base.path().join("42")).expect("symlink");
        let (uid, gid) = own_ids();

        let result = provision(&NoopLabeling, &base.path().join("42"), uid, gid);

        match result {
            Err(RundirError::CreateFailed { .. }) => {}
            other => panic!("expected CreateFailed, got {other:?}"),
        }
        assert_eq!(
            mode_of(&target),
            0o755,
            "symlink target must not be re-permissioned"
        );
    }

    #[test]
    fn leaf_occupied_by_file_fails_without_data_loss() {
        let _env = process_state_lock();
        let base = tempfile::tempdir().expect("tempdir");
        let occupant = base.path().join("42");
        stdfs::write(&occupant, b"data").expect("write");
        let (uid, gid) = own_ids();

        let result = provision(&NoopLabeling, &occupant, uid, gid);

        assert!(matches!(result, Err(RundirError::CreateFailed { .. })));
        assert_eq!(stdfs::read(&occupant).expect("read"), b"data");
    }

    #[test]
    fn umask_restored_after_failure() {
        let _env = process_state_lock();
        let base = tempfile::tempdir().expect("tempdir");
        stdfs::write(base.path().join("clash"), b"x").expect("write");
        let (uid, gid) = own_ids();

        let previous = umask(Mode::from_bits_truncate(0o027));
        // "clash" is a file, so the walk cannot proceed through it.
        let result = provision(
            &NoopLabeling,
            &base.path().join("clash").join("42"),
            uid,
            gid,
        );
        let restored = umask(previous);

        assert!(result.is_err());
        assert_eq!(restored.bits(), 0o027, "umask restored on the error path");
    }

    #[test]
    fn labels_leaf_and_clears_context() {
        let _env = process_state_lock();
        let base = tempfile::tempdir().expect("tempdir");
        let target = base.path().join("labeled").join("42");
        let (uid, gid) = own_ids();
        let backend = RecordingLabeling::default();

        provision(&backend, &target, uid, gid).expect("provision");

        let events = backend.events();
        assert_eq!(
            events.first(),
            Some(&LabelEvent::Lookup(target.clone(), 0o700)),
            "label computed for the full path at the runtime mode"
        );
        assert!(matches!(events.get(1), Some(LabelEvent::Install(_))));
        assert_eq!(events.last(), Some(&LabelEvent::Clear));
        assert!(!backend.context_active());
    }

    #[test]
    fn relabels_existing_leaf() {
        let _env = process_state_lock();
        let base = tempfile::tempdir().expect("tempdir");
        let target = base.path().join("svc").join("42");
        stdfs::create_dir_all(&target).expect("mkdir");
        let (uid, gid) = own_ids();
        let backend = RecordingLabeling::default();

        provision(&backend, &target, uid, gid).expect("provision");

        assert!(
            backend
                .events()
                .iter()
                .any(|ev| matches!(ev, LabelEvent::Apply(path, _) if path == &target)),
            "existing leaf must be relabeled explicitly"
        );
        assert!(!backend.context_active());
    }

    #[test]
    fn label_lookup_failure_aborts_before_any_leaf_work() {
        let _env = process_state_lock();
        let base = tempfile::tempdir().expect("tempdir");
        let target = base.path().join("svc").join("42");
        let (uid, gid) = own_ids();
        let backend = RecordingLabeling {
            fail_lookup: true,
            ..RecordingLabeling::default()
        };

        let result = provision(&backend, &target, uid, gid);

        assert!(matches!(result, Err(RundirError::LabelLookupFailed { .. })));
        assert!(!target.exists(), "leaf must not be created without its label");
        assert!(!backend.context_active());
    }
}
