//! Owned, verified directory descriptors.
//!
//! Every handle is opened with `O_NOFOLLOW`, so a symlink planted at the
//! final component makes the open fail instead of being resolved, and its
//! type is confirmed with `fstat` on the descriptor rather than on the name.
//! All child operations (open, create, stat, chown, unlink) are addressed
//! relative to the handle, never through a re-resolved absolute path, so a
//! component swapped after the open cannot redirect them.
//!
//! The path a handle was opened from is retained for diagnostics and label
//! computation only.

use std::ffi::OsStr;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::{Path, PathBuf};

use rustix::fs::{self, AtFlags, FileType, Gid, Mode, OFlags, Uid};
use rustix::path::Arg;

use crate::error::{Result, RundirError};

/// Flags for every directory open: never follow a final symlink, never leak
/// the descriptor across exec.
pub(crate) const DIR_OPEN_FLAGS: OFlags = OFlags::RDONLY
    .union(OFlags::NOFOLLOW)
    .union(OFlags::CLOEXEC);

/// Whether the object behind `fd` is a directory.
pub(crate) fn fd_is_dir<F: AsFd>(fd: F) -> rustix::io::Result<bool> {
    let st = fs::fstat(fd)?;
    Ok(FileType::from_raw_mode(st.st_mode) == FileType::Directory)
}

/// An open descriptor verified to refer to a directory.
///
/// The descriptor is closed when the handle drops, on every exit path.
#[derive(Debug)]
pub struct DirHandle {
    fd: OwnedFd,
    path: PathBuf,
}

impl DirHandle {
    /// Open `path` without following a final symlink and verify that the
    /// opened object is a directory.
    ///
    /// # Errors
    ///
    /// [`RundirError::OpenFailed`] if the open or the descriptor stat fails
    /// (a symlink at the final component fails the open with `ELOOP`);
    /// [`RundirError::NotADirectory`] if the object is not a directory.
    pub fn open(path: &Path) -> Result<Self> {
        let fd = fs::open(path, DIR_OPEN_FLAGS, Mode::empty()).map_err(|err| {
            RundirError::OpenFailed {
                path: path.to_path_buf(),
                source: err.into(),
            }
        })?;
        match fd_is_dir(&fd) {
            Ok(true) => Ok(Self {
                fd,
                path: path.to_path_buf(),
            }),
            Ok(false) => Err(RundirError::NotADirectory {
                path: path.to_path_buf(),
            }),
            Err(err) => Err(RundirError::OpenFailed {
                path: path.to_path_buf(),
                source: err.into(),
            }),
        }
    }

    /// Wrap an already-opened directory descriptor.
    ///
    /// The caller has verified `fd` refers to a directory.
    pub(crate) fn from_parts(fd: OwnedFd, path: PathBuf) -> Self {
        Self { fd, path }
    }

    /// The path this handle was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Duplicate the handle onto a new descriptor.
    ///
    /// # Errors
    ///
    /// [`RundirError::OpenFailed`] if the descriptor cannot be duplicated.
    pub fn try_clone(&self) -> Result<Self> {
        let fd = self.fd.try_clone().map_err(|err| RundirError::OpenFailed {
            path: self.path.clone(),
            source: err,
        })?;
        Ok(Self {
            fd,
            path: self.path.clone(),
        })
    }

    /// Open the child `name` as a verified directory.
    ///
    /// # Errors
    ///
    /// [`RundirError::OpenFailed`] or [`RundirError::NotADirectory`], as for
    /// [`DirHandle::open`].
    pub fn open_subdir(&self, name: &OsStr) -> Result<Self> {
        let path = self.path.join(name);
        let fd = self
            .open_child(name, OFlags::empty())
            .map_err(|err| RundirError::OpenFailed {
                path: path.clone(),
                source: err.into(),
            })?;
        match fd_is_dir(&fd) {
            Ok(true) => Ok(Self::from_parts(fd, path)),
            Ok(false) => Err(RundirError::NotADirectory { path }),
            Err(err) => Err(RundirError::OpenFailed {
                path,
                source: err.into(),
            }),
        }
    }

    /// Raw descriptor-relative open of `name`, without type verification.
    pub(crate) fn open_child<P: Arg>(
        &self,
        name: P,
        extra: OFlags,
    ) -> rustix::io::Result<OwnedFd> {
        fs::openat(&self.fd, name, DIR_OPEN_FLAGS | extra, Mode::empty())
    }

    /// Create the directory `name` under this handle.
    pub(crate) fn make_child_dir<P: Arg>(&self, name: P, mode: u32) -> rustix::io::Result<()> {
        fs::mkdirat(&self.fd, name, Mode::from_bits_truncate(mode))
    }

    /// Stat `name` under this handle without following a symlink.
    pub(crate) fn child_is_dir<P: Arg>(&self, name: P) -> rustix::io::Result<bool> {
        let st = fs::statat(&self.fd, name, AtFlags::SYMLINK_NOFOLLOW)?;
        Ok(FileType::from_raw_mode(st.st_mode) == FileType::Directory)
    }

    /// Remove the entry `name` under this handle.
    pub(crate) fn remove_child<P: Arg>(&self, name: P, is_dir: bool) -> rustix::io::Result<()> {
        let flags = if is_dir {
            AtFlags::REMOVEDIR
        } else {
            AtFlags::empty()
        };
        fs::unlinkat(&self.fd, name, flags)
    }

    /// Change the owner of `name` under this handle, without following a
    /// symlink.
    pub(crate) fn chown_child<P: Arg>(&self, name: P, uid: u32, gid: u32) -> rustix::io::Result<()> {
        fs::chownat(
            &self.fd,
            name,
            Some(Uid::from_raw(uid)),
            Some(Gid::from_raw(gid)),
            AtFlags::SYMLINK_NOFOLLOW,
        )
    }

    /// Set the permission bits on the directory itself.
    pub(crate) fn set_mode(&self, mode: u32) -> rustix::io::Result<()> {
        fs::fchmod(&self.fd, Mode::from_bits_truncate(mode))
    }
}

impl AsFd for DirHandle {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use std::fs as stdfs;
    use std::path::Path;

    use super::DirHandle;
    use crate::error::RundirError;

    #[test]
    fn open_verifies_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handle = DirHandle::open(dir.path()).expect("open tempdir");
        assert_eq!(handle.path(), dir.path());
    }

    #[test]
    fn open_rejects_regular_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("plain");
        stdfs::write(&file, b"data").expect("write");

        match DirHandle::open(&file) {
            Err(RundirError::NotADirectory { path }) => assert_eq!(path, file),
            other => panic!("expected NotADirectory, got {other:?}"),
        }
    }

    #[test]
    fn open_refuses_symlink_to_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let real = dir.path().join("real");
        stdfs::create_dir(&real).expect("mkdir");
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).expect("symlink");

        match DirHandle::open(&link) {
            Err(RundirError::OpenFailed { path, .. }) => assert_eq!(path, link),
            other => panic!("expected OpenFailed, got {other:?}"),
        }
        assert!(real.exists(), "symlink target must be untouched");
    }

    #[test]
    fn open_subdir_walks_one_component() {
        let dir = tempfile::tempdir().expect("tempdir");
        stdfs::create_dir(dir.path().join("sub")).expect("mkdir");

        let parent = DirHandle::open(dir.path()).expect("open parent");
        let sub = parent
            .open_subdir(Path::new("sub").as_os_str())
            .expect("open subdir");
        assert_eq!(sub.path(), dir.path().join("sub"));
    }

    #[test]
    fn try_clone_yields_independent_handle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handle = DirHandle::open(dir.path()).expect("open");
        let dup = handle.try_clone().expect("clone");
        drop(handle);
        // The duplicate stays usable after the original closes.
        assert!(dup.child_is_dir("nonexistent").is_err());
        stdfs::create_dir(dir.path().join("later")).expect("mkdir");
        assert!(dup.child_is_dir("later").expect("statat"));
    }
}
