//! gitsource core - mirror git repositories into a content graph
//!
//! A pass synchronizes a local mirror of a remote (clone, refresh, or refuse
//! on mismatch), publishes one `GitRemote` node for it, then publishes one
//! file node per matching file, each linked back to the remote node.

pub mod config;
pub mod discovery;
pub mod emit;
pub mod error;
pub mod git;
pub mod graph;
pub mod remote;
pub mod source;

pub use config::{Config, GitConfig, Patterns, SourceConfig};
pub use emit::{EmitReport, FileNodeFailure, NodeEmitter};
pub use error::{Error, Result};
pub use git::{GitClient, GitError, RepoMirror, SyncOutcome, SyncReport, SystemGit};
pub use graph::{ContentGraph, MemoryGraph, Node, NodeId};
pub use remote::{RemoteDescriptor, RemoteUrl, SyncedRemote};
pub use source::{GitSource, PassReport};
