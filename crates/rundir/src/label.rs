//! Security-labeling capability.
//!
//! On systems with mandatory access control, runtime directories must carry
//! a label computed from their intended path and mode. Policy transition
//! rules cannot be relied on to fill in the user field of that label (it
//! depends on the policy's user database), so the subsystem computes the
//! label itself, pre-seeds the process-wide creation context before creating
//! new objects, and explicitly relabels objects it reuses.
//!
//! The backend is a capability: code always calls through [`Labeling`], and
//! [`NoopLabeling`] stands in on systems without a labeling subsystem. A
//! `lookup` that returns `Ok(None)` turns every subsequent labeling step for
//! that operation into a no-op.

use std::fmt;
use std::io;
use std::path::Path;

/// An opaque mandatory-access-control label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityLabel(String);

impl SecurityLabel {
    /// Wrap a raw label string produced by a labeling backend.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw label text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecurityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Interface to the platform's file-labeling subsystem.
///
/// All methods report failures as [`io::Error`] so the underlying OS error
/// code stays visible to callers.
pub trait Labeling {
    /// Compute the label for an object that will exist at `path` with
    /// permission bits `mode`.
    ///
    /// Returns `Ok(None)` when the object needs no label; labeling is then
    /// skipped for the whole operation.
    ///
    /// # Errors
    ///
    /// Any backend failure while computing the label.
    fn lookup(&self, path: &Path, mode: u32) -> io::Result<Option<SecurityLabel>>;

    /// Install `label` as the process-wide creation context, so filesystem
    /// objects created afterwards inherit it.
    ///
    /// # Errors
    ///
    /// Any backend failure while installing the context.
    fn set_create_context(&self, label: &SecurityLabel) -> io::Result<()>;

    /// Reset the process-wide creation context, so later objects are labeled
    /// normally again.
    ///
    /// # Errors
    ///
    /// Any backend failure while resetting the context.
    fn clear_create_context(&self) -> io::Result<()>;

    /// Relabel the existing object at `path`, without following a final
    /// symlink.
    ///
    /// # Errors
    ///
    /// Any backend failure while relabeling.
    fn apply(&self, path: &Path, label: &SecurityLabel) -> io::Result<()>;
}

/// Labeling backend for systems without mandatory access control.
///
/// `lookup` reports that no label is needed; the remaining methods are never
/// reached through the subsystem but succeed trivially if called.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLabeling;

impl Labeling for NoopLabeling {
    fn lookup(&self, _path: &Path, _mode: u32) -> io::Result<Option<SecurityLabel>> {
        Ok(None)
    }

    fn set_create_context(&self, _label: &SecurityLabel) -> io::Result<()> {
        Ok(())
    }

    fn clear_create_context(&self) -> io::Result<()> {
        Ok(())
    }

    fn apply(&self, _path: &Path, _label: &SecurityLabel) -> io::Result<()> {
        Ok(())
    }
}
