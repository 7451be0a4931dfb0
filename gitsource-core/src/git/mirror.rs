//! On-disk mirror of a remote and the clone/refresh/fail decision

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::client::{CloneOptions, GitClient, GitError};
use crate::remote::redact_url;
use crate::{Error, Result};

/// Symbolic ref naming the remote's default branch
const ORIGIN_HEAD: &str = "refs/remotes/origin/HEAD";

/// Classification of the mirror path against the configured remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorState {
    /// Path is missing or an empty directory
    Absent,
    /// Path is a clone whose origin equals the configured remote
    PresentMatching,
    /// Path holds something else; `found` is its origin if one could be read
    PresentMismatched { found: Option<String> },
}

/// What a successful synchronization did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The mirror was absent and has been cloned
    Cloned,
    /// The mirror was fetched and reset to `target`
    Refreshed { target: String },
    /// Refreshing failed; the mirror is used as it was left on disk
    Degraded {
        /// Reset target, if it was resolved before the failure
        target: Option<String>,
        error: GitError,
    },
}

impl SyncOutcome {
    /// Whether the pass is running on possibly stale content
    pub fn is_degraded(&self) -> bool {
        matches!(self, SyncOutcome::Degraded { .. })
    }
}

/// Result of [`RepoMirror::ensure_synced`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    /// Abbreviated name of the checked-out ref (e.g., "main")
    pub resolved_ref: String,
}

/// A local clone of one remote at a fixed path
pub struct RepoMirror {
    path: PathBuf,
    git: Arc<dyn GitClient>,
}

impl std::fmt::Debug for RepoMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoMirror")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RepoMirror {
    /// Create a mirror handle; nothing touches the disk until synchronization
    pub fn new(path: impl Into<PathBuf>, git: Arc<dyn GitClient>) -> Self {
        Self {
            path: path.into(),
            git,
        }
    }

    /// Get the mirror path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Classify the mirror path against `remote`
    ///
    /// An existing but empty directory counts as absent: the host may clear a
    /// cache directory's contents without removing the directory itself.
    pub async fn state(&self, remote: &str) -> Result<MirrorState> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(MirrorState::Absent),
            Err(e) => return Err(Error::Io(e)),
        };

        if !metadata.is_dir() {
            return Ok(MirrorState::PresentMismatched { found: None });
        }

        let mut entries = tokio::fs::read_dir(&self.path).await?;
        if entries.next_entry().await?.is_none() {
            return Ok(MirrorState::Absent);
        }

        match self.git.remote_url(&self.path).await {
            Ok(found) if found.trim() == remote.trim() => Ok(MirrorState::PresentMatching),
            Ok(found) => Ok(MirrorState::PresentMismatched {
                found: Some(found.trim().to_string()),
            }),
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Could not read mirror origin");
                Ok(MirrorState::PresentMismatched { found: None })
            }
        }
    }

    /// Bring the mirror up to date with `remote`
    ///
    /// Clones when absent, fetches and force-checks-out the branch when present
    /// and matching, and refuses to touch a directory belonging to another
    /// remote. A failed refresh is not an error: it is reported as
    /// [`SyncOutcome::Degraded`] and the mirror is used as-is.
    pub async fn ensure_synced(
        &self,
        remote: &str,
        branch: Option<&str>,
        fetch_options: &[String],
    ) -> Result<SyncReport> {
        let state = self.state(remote).await?;
        tracing::debug!(path = %self.path.display(), state = ?state, "Mirror state");

        let outcome = match state {
            MirrorState::Absent => {
                self.clone_from(remote, branch).await?;
                SyncOutcome::Cloned
            }
            MirrorState::PresentMatching => self.refresh(branch, fetch_options).await,
            MirrorState::PresentMismatched { found } => {
                return Err(Error::RemoteMismatch {
                    remote: redact_url(remote),
                    path: self.path.clone(),
                    found: found.as_deref().map(redact_url),
                });
            }
        };

        let resolved_ref = self.git.abbrev_head(&self.path).await?.trim().to_string();
        if resolved_ref.is_empty() {
            return Err(Error::Git(GitError::Repository(format!(
                "HEAD of {} did not resolve to a ref",
                self.path.display()
            ))));
        }

        Ok(SyncReport {
            outcome,
            resolved_ref,
        })
    }

    async fn clone_from(&self, remote: &str, branch: Option<&str>) -> Result<()> {
        let existed = tokio::fs::try_exists(&self.path).await.unwrap_or(false);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = CloneOptions {
            branch: branch.map(str::to_string),
        };

        tracing::info!(remote = %redact_url(remote), path = %self.path.display(), branch = ?branch, "Cloning mirror");

        if let Err(source) = self.git.clone_repo(remote, &self.path, &options).await {
            self.discard_partial_clone(existed).await;
            return Err(Error::CloneFailed {
                remote: redact_url(remote),
                source,
            });
        }

        Ok(())
    }

    /// Remove whatever a failed clone left behind so the next pass sees `Absent`
    async fn discard_partial_clone(&self, existed: bool) {
        let result = if existed {
            clear_dir(&self.path).await
        } else {
            match tokio::fs::remove_dir_all(&self.path).await {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        };

        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to clean up partial clone");
        }
    }

    async fn refresh(&self, branch: Option<&str>, fetch_options: &[String]) -> SyncOutcome {
        let target = match self.target_ref(branch).await {
            Ok(target) => target,
            Err(error) => {
                tracing::warn!(path = %self.path.display(), error = %error, "Could not resolve refresh target. Continuing with local state.");
                return SyncOutcome::Degraded {
                    target: None,
                    error,
                };
            }
        };

        tracing::info!(path = %self.path.display(), target = %target, "Refreshing mirror");

        let local_branch = match branch {
            Some(branch) => branch,
            None => target.strip_prefix("origin/").unwrap_or(&target),
        };

        let result = match self.git.fetch(&self.path, fetch_options).await {
            Ok(()) => self.git.reset_hard(&self.path, local_branch, &target).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => SyncOutcome::Refreshed { target },
            Err(error) => {
                tracing::warn!(path = %self.path.display(), target = %target, error = %error, "Refresh failed. Continuing with local state.");
                SyncOutcome::Degraded {
                    target: Some(target),
                    error,
                }
            }
        }
    }

    /// `origin/<branch>` for an explicit branch, else the remote's default branch
    async fn target_ref(&self, branch: Option<&str>) -> std::result::Result<String, GitError> {
        match branch {
            Some(branch) => Ok(format!("origin/{}", branch)),
            None => Ok(self
                .git
                .symbolic_ref(&self.path, ORIGIN_HEAD)
                .await?
                .trim()
                .to_string()),
        }
    }
}

async fn clear_dir(path: &Path) -> std::io::Result<()> {
    let mut entries = tokio::fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(entry.path()).await?;
        } else {
            tokio::fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}
