//! Orchestrator-facing façade over the directory-lifecycle operations.

use std::ffi::OsStr;
use std::path::Path;

use crate::config::RundirSpec;
use crate::create;
use crate::error::Result;
use crate::handle::DirHandle;
use crate::label::{Labeling, NoopLabeling};
use crate::provision;
use crate::reclaim::{self, ReclaimOutcome};

/// Binds one labeling backend to the directory-lifecycle operations.
///
/// The manager itself holds no filesystem state; each call stands alone.
/// Calls mutate process-wide attributes (umask, ambient creation context)
/// for their duration and must be serialized by the caller; see the
/// crate-level documentation.
#[derive(Debug, Default)]
pub struct RundirManager<L = NoopLabeling> {
    labeling: L,
}

impl RundirManager<NoopLabeling> {
    /// Manager for systems without a labeling subsystem.
    #[must_use]
    pub fn new() -> Self {
        Self {
            labeling: NoopLabeling,
        }
    }
}

impl<L: Labeling> RundirManager<L> {
    /// Manager using `labeling` for every operation that labels objects.
    pub fn with_labeling(labeling: L) -> Self {
        Self { labeling }
    }

    /// Provision the runtime directory at `path`, owned by `uid:gid`.
    ///
    /// See [`provision::provision`].
    ///
    /// # Errors
    ///
    /// The first irrecoverable provisioning failure.
    pub fn provision(&self, path: &Path, uid: u32, gid: u32) -> Result<()> {
        provision::provision(&self.labeling, path, uid, gid)
    }

    /// Provision the runtime directory described by a configuration entry.
    ///
    /// # Errors
    ///
    /// [`RundirSpec::validate`] failures, then as [`Self::provision`].
    pub fn provision_spec(&self, spec: &RundirSpec) -> Result<()> {
        spec.validate()?;
        self.provision(&spec.path, spec.uid, spec.gid)
    }

    /// Create or reuse a single directory entry under an open parent.
    ///
    /// See [`create::create_or_reuse_dir`].
    ///
    /// # Errors
    ///
    /// As [`create::create_or_reuse_dir`].
    pub fn create_or_reuse_dir(
        &self,
        parent: &DirHandle,
        name: &OsStr,
        mode: u32,
    ) -> Result<DirHandle> {
        create::create_or_reuse_dir(&self.labeling, parent, name, mode)
    }

    /// Tear down the runtime directory at `path`, best-effort.
    ///
    /// See [`reclaim::reclaim`].
    pub fn reclaim(&self, path: &Path) -> ReclaimOutcome {
        reclaim::reclaim(path)
    }
}
