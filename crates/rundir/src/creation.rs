//! Scoped control of process-wide creation attributes.
//!
//! Directory creation depends on two process-global attributes: the
//! file-mode creation mask and, when labeling is active, the ambient
//! creation context. Both are saved/overridden on entry and restored on
//! every exit path through guard values, so no error path can leave them
//! dirty.
//!
//! Because the attributes are process-wide, operations holding these guards
//! must not run concurrently; see the crate-level serialization requirement.

use std::io;

use rustix::fs::Mode;
use rustix::process::umask;
use tracing::error;

use crate::label::{Labeling, SecurityLabel};

/// Overrides the process file-mode creation mask until dropped.
#[derive(Debug)]
pub struct UmaskGuard {
    previous: Mode,
}

impl UmaskGuard {
    /// Set the process umask to `mask`, remembering the previous value.
    #[must_use]
    pub fn set(mask: u32) -> Self {
        Self {
            previous: umask(Mode::from_bits_truncate(mask)),
        }
    }
}

impl Drop for UmaskGuard {
    fn drop(&mut self) {
        umask(self.previous);
    }
}

/// Holds the ambient creation context installed for one creation region.
///
/// The context is cleared exactly once: through [`clear`] on the success
/// path, where a failed reset is reported to the caller (objects created
/// later by this process would otherwise inherit a stale label), or on drop
/// for every other exit path, where a failed reset can only be logged.
///
/// [`clear`]: AmbientLabelContext::clear
#[derive(Debug)]
pub struct AmbientLabelContext<'a, L: Labeling + ?Sized> {
    labeling: &'a L,
    armed: bool,
}

impl<'a, L: Labeling + ?Sized> AmbientLabelContext<'a, L> {
    /// Install `label` as the ambient creation context.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports; nothing is installed on failure.
    pub fn install(labeling: &'a L, label: &SecurityLabel) -> io::Result<Self> {
        labeling.set_create_context(label)?;
        Ok(Self {
            labeling,
            armed: true,
        })
    }

    /// Clear the ambient creation context, consuming the guard.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports; the guard is disarmed either way.
    pub fn clear(mut self) -> io::Result<()> {
        self.armed = false;
        self.labeling.clear_create_context()
    }
}

impl<L: Labeling + ?Sized> Drop for AmbientLabelContext<'_, L> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(err) = self.labeling.clear_create_context() {
                error!(error = %err, "failed to reset ambient creation context");
            }
        }
    }
}
