//! Symlink-race-safe provisioning and reclamation of per-session runtime
//! directories.
//!
//! A session manager gives every session a private, correctly-permissioned
//! scratch directory and guarantees it is fully destroyed on teardown, even
//! when the filesystem holds adversarial or stale content: symlinks planted
//! by another user, non-directory entries squatting on the name, partially
//! populated trees from a crashed prior run. This crate is that directory
//! lifecycle, and nothing else; which path, uid/gid, and mode to request
//! is the caller's policy.
//!
//! # Architecture
//!
//! ```text
//!              ┌──────────────────────────────────────────┐
//!              │              RundirManager               │
//!              └──────┬──────────────────────┬────────────┘
//!                     │                      │
//!                     ▼                      ▼
//!          ┌───────────────────┐   ┌──────────────────┐
//!          │     provision     │   │     reclaim      │
//!          │ (walk + leaf setup│   │ (open, verify,   │
//!          │  mode/label/owner)│   │  erase, rmdir)   │
//!          └───────┬───────────┘   └────────┬─────────┘
//!                  │                        │
//!                  ▼                        ▼
//!          ┌───────────────────┐   ┌──────────────────┐
//!          │      create       │──▶│      erase       │
//!          │ (create-or-reuse  │   │ (recursive,      │
//!          │  one entry)       │   │  fd-relative)    │
//!          └───────────────────┘   └──────────────────┘
//! ```
//!
//! All four stand on [`DirHandle`] (verified directory descriptors), the
//! [`creation`] guards (umask, ambient label context), and the [`Labeling`]
//! capability.
//!
//! # Security model
//!
//! - Every open of a named component uses `O_NOFOLLOW`; a planted symlink
//!   fails the open instead of being resolved.
//! - After the open, all operations are addressed relative to the opened
//!   descriptor, so a name swapped between check and use cannot redirect
//!   them: they act on the originally opened object.
//! - A handle's directory-ness is established with `fstat` on the
//!   descriptor, never by the name.
//! - Reclamation refuses to unlink anything whose opened object is not a
//!   directory.
//!
//! # Invariants
//!
//! - [INV-RD-001] No operation ever follows a symlink, at any component.
//! - [INV-RD-002] A returned [`DirHandle`] refers to a verified directory.
//! - [INV-RD-003] The ambient creation context, once installed, is cleared
//!   again before the installing function returns, on every exit path.
//! - [INV-RD-004] Every umask override is paired with a restore before
//!   return.
//!
//! # Serialization requirement
//!
//! Operations are synchronous, blocking, and **not safe for concurrent
//! invocation from multiple threads of one process**: they mutate the
//! process-wide umask and, when labeling is active, the process-wide
//! creation context for their duration. Callers must serialize all calls
//! into this crate: confine them to one worker thread, or hold a lock
//! spanning each call. Across processes, benign creation races are
//! tolerated (`EEXIST` is handled by re-opening and re-verifying).

pub mod config;
pub mod create;
pub mod creation;
pub mod erase;
pub mod error;
pub mod handle;
pub mod label;
pub mod manager;
pub mod provision;
pub mod reclaim;

pub use config::RundirSpec;
pub use create::create_or_reuse_dir;
pub use creation::{AmbientLabelContext, UmaskGuard};
pub use erase::{clear_contents, EraseStats};
pub use error::{Result, RundirError};
pub use handle::DirHandle;
pub use label::{Labeling, NoopLabeling, SecurityLabel};
pub use manager::RundirManager;
pub use provision::provision;
pub use reclaim::{reclaim, ReclaimOutcome};
