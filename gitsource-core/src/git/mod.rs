//! Git operations for gitsource
//!
//! This module provides the git client capability, its system implementation,
//! and the mirror synchronization state machine built on top of it.

mod client;
mod mirror;
mod system;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{CloneOptions, GitClient, GitError};
pub use mirror::{MirrorState, RepoMirror, SyncOutcome, SyncReport};
pub use system::{SystemGit, DEFAULT_GIT_TIMEOUT};
