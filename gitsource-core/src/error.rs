//! Error types for gitsource

use std::path::PathBuf;

use thiserror::Error;

use crate::git::GitError;

/// Result type alias for gitsource operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for gitsource operations
#[derive(Error, Debug)]
pub enum Error {
    /// The remote string could not be decomposed into host/owner/name
    #[error("Invalid remote URL '{url}': {reason}")]
    InvalidRemoteUrl { url: String, reason: String },

    /// The mirror path holds a clone of some other remote
    #[error(
        "Can't clone {remote} to {}: directory is not a mirror of this remote{}",
        path.display(),
        found.as_deref().map(|f| format!(" (origin is {})", f)).unwrap_or_default()
    )]
    RemoteMismatch {
        remote: String,
        path: PathBuf,
        found: Option<String>,
    },

    /// Cloning into an absent mirror failed
    #[error("Failed to clone {remote}: {source}")]
    CloneFailed {
        remote: String,
        #[source]
        source: GitError,
    },

    /// A git operation failed outside the refresh path
    #[error(transparent)]
    Git(#[from] GitError),

    /// Building or committing a single file node failed
    #[error("Failed to create node for {}: {message}", path.display())]
    FileNode { path: PathBuf, message: String },

    /// Walking the mirror failed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// The host graph rejected a node
    #[error("Graph error: {0}")]
    Graph(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
