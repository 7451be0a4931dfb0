//! The git client capability the mirror is driven through

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a git client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    /// The git executable could not be started
    #[error("Failed to run {command}: {message}")]
    Spawn { command: String, message: String },

    /// The command did not finish in time and was killed
    #[error("{command} timed out after {}", humantime::format_duration(*after))]
    Timeout { command: String, after: Duration },

    /// The remote rejected our credentials
    #[error("Authentication failed for {remote}. Check your credentials or repository access.")]
    Auth { remote: String },

    /// The remote host could not be reached
    #[error("Network error reaching {remote}. Check your internet connection.")]
    Network { remote: String },

    /// The remote repository does not exist
    #[error("Repository not found: {remote}. Check the URL is correct.")]
    NotFound { remote: String },

    /// The command exited unsuccessfully
    #[error("{command} failed: {stderr}")]
    Failed { command: String, stderr: String },

    /// Reading local repository state failed
    #[error("Git error: {0}")]
    Repository(String),
}

/// Options for cloning a mirror
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// Restrict the clone to this branch
    pub branch: Option<String>,
}

/// Operations the mirror needs from git
///
/// Every method targets the repository at `repo` except [`GitClient::clone_repo`],
/// which creates it.
#[async_trait]
pub trait GitClient: Send + Sync {
    /// URL of the `origin` remote
    async fn remote_url(&self, repo: &Path) -> Result<String, GitError>;

    /// Clone `url` into `dest`
    async fn clone_repo(&self, url: &str, dest: &Path, options: &CloneOptions)
        -> Result<(), GitError>;

    /// Fetch from origin, passing `args` through to the fetch
    async fn fetch(&self, repo: &Path, args: &[String]) -> Result<(), GitError>;

    /// Check out local `branch` forced to `target`, discarding local changes
    ///
    /// The branch is created or moved as needed, so switching the configured
    /// branch of an existing mirror never rewrites another local branch.
    async fn reset_hard(&self, repo: &Path, branch: &str, target: &str) -> Result<(), GitError>;

    /// Short name of the target of symbolic ref `name` (e.g., "origin/main")
    async fn symbolic_ref(&self, repo: &Path, name: &str) -> Result<String, GitError>;

    /// Abbreviated name of HEAD (e.g., "main", or "HEAD" when detached)
    async fn abbrev_head(&self, repo: &Path) -> Result<String, GitError>;
}
