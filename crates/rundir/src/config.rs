//! Runtime-directory requests from the session manager's configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::provision::split_components;

/// A runtime-directory request as declared in the session manager's
/// configuration.
///
/// ```toml
/// [sessions.runtime_dir]
/// path = "/run/sessions/1000"
/// uid = 1000
/// gid = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RundirSpec {
    /// Absolute path of the runtime directory.
    pub path: PathBuf,
    /// Owning user id for the runtime directory.
    pub uid: u32,
    /// Owning group id for the runtime directory.
    pub gid: u32,
}

impl RundirSpec {
    /// Build a request for `path`, owned by `uid:gid`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, uid: u32, gid: u32) -> Self {
        Self {
            path: path.into(),
            uid,
            gid,
        }
    }

    /// Check the request before any filesystem work.
    ///
    /// # Errors
    ///
    /// [`RundirError::InvalidPath`] for a path provisioning would refuse:
    /// relative, bare root, or containing `..` components.
    ///
    /// [`RundirError::InvalidPath`]: crate::RundirError::InvalidPath
    pub fn validate(&self) -> Result<()> {
        split_components(&self.path).map(|_| ())
    }
}
