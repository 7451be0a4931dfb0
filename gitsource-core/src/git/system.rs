//! Git client backed by the `git` executable and libgit2
//!
//! Network operations (clone, fetch) and the working-tree reset shell out to
//! `git`; local reads go through libgit2 on the blocking pool.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use git2::Repository;
use tokio::process::Command;

use super::client::{CloneOptions, GitClient, GitError};
use crate::config::GitConfig;
use crate::remote::redact_url;

/// Default upper bound for a single git subprocess
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Git client using the system `git` binary
#[derive(Debug, Clone)]
pub struct SystemGit {
    /// Path to the git executable (defaults to "git" in PATH)
    git_path: String,
    /// Timeout applied to every subprocess
    timeout: Duration,
}

impl Default for SystemGit {
    fn default() -> Self {
        Self {
            git_path: "git".to_string(),
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }
}

impl SystemGit {
    /// Create a client with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client from the `[git]` configuration section
    pub fn from_config(config: &GitConfig) -> Self {
        Self::new()
            .with_git_path(config.path.clone())
            .with_timeout(config.timeout)
    }

    /// Set a custom path to the git executable
    pub fn with_git_path(mut self, path: impl Into<String>) -> Self {
        self.git_path = path.into();
        self
    }

    /// Set the per-command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `git <args>` and return stdout
    ///
    /// `remote` is used to classify common clone/fetch failures.
    async fn run(
        &self,
        args: Vec<OsString>,
        cwd: Option<&Path>,
        remote: Option<&str>,
    ) -> Result<String, GitError> {
        let command = format!(
            "git {}",
            args.first().map(|a| a.to_string_lossy()).unwrap_or_default()
        );

        let mut cmd = Command::new(&self.git_path);
        cmd.args(&args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        tracing::debug!(command = %command, cwd = ?cwd, "Running git");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| GitError::Timeout {
                command: command.clone(),
                after: self.timeout,
            })?
            .map_err(|e| GitError::Spawn {
                command: command.clone(),
                message: if e.kind() == std::io::ErrorKind::NotFound {
                    format!("git executable not found at '{}'", self.git_path)
                } else {
                    e.to_string()
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_failure(command, stderr, remote));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn classify_failure(command: String, stderr: String, remote: Option<&str>) -> GitError {
    if let Some(remote) = remote {
        let remote = remote.to_string();

        if stderr.contains("Authentication failed") || stderr.contains("Permission denied") {
            return GitError::Auth { remote };
        }

        if stderr.contains("Could not resolve host") || stderr.contains("unable to access") {
            return GitError::Network { remote };
        }

        if stderr.contains("not found") || stderr.contains("does not exist") {
            return GitError::NotFound { remote };
        }
    }

    GitError::Failed { command, stderr }
}

/// Run a libgit2 read against the repository at `path` without searching parents
async fn with_repo<T, F>(path: &Path, f: F) -> Result<T, GitError>
where
    T: Send + 'static,
    F: FnOnce(&Repository) -> Result<T, GitError> + Send + 'static,
{
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&path).map_err(|e| {
            GitError::Repository(format!("{} is not a git repository: {}", path.display(), e.message()))
        })?;
        f(&repo)
    })
    .await
    .map_err(|e| GitError::Repository(format!("git task failed: {}", e)))?
}

fn shorten_ref(name: &str) -> &str {
    ["refs/heads/", "refs/remotes/", "refs/tags/", "refs/"]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
}

#[async_trait]
impl GitClient for SystemGit {
    async fn remote_url(&self, repo: &Path) -> Result<String, GitError> {
        with_repo(repo, |repo| {
            let remote = repo
                .find_remote("origin")
                .map_err(|e| GitError::Repository(format!("Remote 'origin' not found: {}", e.message())))?;
            remote
                .url()
                .map(str::to_string)
                .ok_or_else(|| GitError::Repository("Remote 'origin' has no valid URL".to_string()))
        })
        .await
    }

    async fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        options: &CloneOptions,
    ) -> Result<(), GitError> {
        let mut args: Vec<OsString> = vec!["clone".into()];
        if let Some(branch) = &options.branch {
            args.push("--branch".into());
            args.push(branch.into());
            args.push("--single-branch".into());
        }
        args.push("--".into());
        args.push(url.into());
        args.push(dest.into());

        self.run(args, None, Some(&redact_url(url))).await.map(|_| ())
    }

    async fn fetch(&self, repo: &Path, fetch_args: &[String]) -> Result<(), GitError> {
        let mut args: Vec<OsString> = vec!["fetch".into()];
        args.extend(fetch_args.iter().map(OsString::from));

        self.run(args, Some(repo), Some("origin")).await.map(|_| ())
    }

    async fn reset_hard(&self, repo: &Path, branch: &str, target: &str) -> Result<(), GitError> {
        let args: Vec<OsString> = vec![
            "checkout".into(),
            "--force".into(),
            "-B".into(),
            branch.into(),
            target.into(),
        ];
        self.run(args, Some(repo), None).await.map(|_| ())
    }

    async fn symbolic_ref(&self, repo: &Path, name: &str) -> Result<String, GitError> {
        let name = name.to_string();
        with_repo(repo, move |repo| {
            let reference = repo
                .find_reference(&name)
                .map_err(|e| GitError::Repository(format!("Reference '{}' not found: {}", name, e.message())))?;
            let target = reference.symbolic_target().ok_or_else(|| {
                GitError::Repository(format!("Reference '{}' is not a symbolic ref", name))
            })?;
            Ok(shorten_ref(target).to_string())
        })
        .await
    }

    async fn abbrev_head(&self, repo: &Path) -> Result<String, GitError> {
        with_repo(repo, |repo| {
            let head = repo
                .head()
                .map_err(|e| GitError::Repository(format!("Failed to get HEAD: {}", e.message())))?;
            if head.is_branch() {
                Ok(head.shorthand().unwrap_or("HEAD").to_string())
            } else {
                // Detached HEAD
                Ok("HEAD".to_string())
            }
        })
        .await
    }
}
