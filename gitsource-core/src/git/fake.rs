//! Scripted in-memory git client for tests

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::{CloneOptions, GitClient, GitError};

#[derive(Default)]
struct FakeState {
    calls: Vec<String>,
    origins: HashMap<PathBuf, String>,
    heads: HashMap<PathBuf, String>,
    fail_clone: bool,
    fail_fetch: bool,
}

/// Records every call and materializes "clones" as plain directories
pub(crate) struct FakeGit {
    default_branch: String,
    files: Vec<(String, String)>,
    state: Mutex<FakeState>,
}

impl FakeGit {
    pub(crate) fn new(default_branch: &str) -> Self {
        Self {
            default_branch: default_branch.to_string(),
            files: vec![("README.md".to_string(), "# widgets\n".to_string())],
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Files written into every clone, relative to the mirror root
    pub(crate) fn with_files(mut self, files: &[(&str, &str)]) -> Self {
        self.files = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect();
        self
    }

    pub(crate) fn fail_clone(&self) {
        self.state.lock().unwrap().fail_clone = true;
    }

    pub(crate) fn fail_fetch(&self) {
        self.state.lock().unwrap().fail_fetch = true;
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Pretend `path` was cloned earlier from `origin` with `head` checked out
    pub(crate) fn seed_mirror(&self, path: &Path, origin: &str, head: &str) {
        self.write_files(path);
        let mut state = self.state.lock().unwrap();
        state.calls.push("seed".to_string());
        state.origins.insert(path.to_path_buf(), origin.to_string());
        state.heads.insert(path.to_path_buf(), head.to_string());
    }

    fn write_files(&self, root: &Path) {
        std::fs::create_dir_all(root.join(".git")).unwrap();
        for (rel, contents) in &self.files {
            let path = root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        }
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl GitClient for FakeGit {
    async fn remote_url(&self, repo: &Path) -> Result<String, GitError> {
        self.record("remote_url".to_string());
        self.state
            .lock()
            .unwrap()
            .origins
            .get(repo)
            .cloned()
            .ok_or_else(|| GitError::Repository("not a git repository".to_string()))
    }

    async fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        options: &CloneOptions,
    ) -> Result<(), GitError> {
        let branch = options.branch.as_deref().unwrap_or("default");
        self.record(format!("clone {} {}", url, branch));

        if self.state.lock().unwrap().fail_clone {
            std::fs::create_dir_all(dest.join(".git")).unwrap();
            std::fs::write(dest.join(".git").join("config"), "partial").unwrap();
            return Err(GitError::NotFound {
                remote: crate::remote::redact_url(url),
            });
        }

        self.write_files(dest);
        let head = options
            .branch
            .clone()
            .unwrap_or_else(|| self.default_branch.clone());
        let mut state = self.state.lock().unwrap();
        state.origins.insert(dest.to_path_buf(), url.to_string());
        state.heads.insert(dest.to_path_buf(), head);
        Ok(())
    }

    async fn fetch(&self, _repo: &Path, args: &[String]) -> Result<(), GitError> {
        self.record(format!("fetch {}", args.join(" ")).trim_end().to_string());
        if self.state.lock().unwrap().fail_fetch {
            return Err(GitError::Network {
                remote: "origin".to_string(),
            });
        }
        Ok(())
    }

    async fn reset_hard(&self, repo: &Path, branch: &str, target: &str) -> Result<(), GitError> {
        self.record(format!("reset_hard {} {}", branch, target));
        self.state
            .lock()
            .unwrap()
            .heads
            .insert(repo.to_path_buf(), branch.to_string());
        Ok(())
    }

    async fn symbolic_ref(&self, _repo: &Path, name: &str) -> Result<String, GitError> {
        self.record(format!("symbolic_ref {}", name));
        Ok(format!("origin/{}\n", self.default_branch))
    }

    async fn abbrev_head(&self, repo: &Path) -> Result<String, GitError> {
        self.record("abbrev_head".to_string());
        self.state
            .lock()
            .unwrap()
            .heads
            .get(repo)
            .map(|h| format!("{}\n", h))
            .ok_or_else(|| GitError::Repository("unborn HEAD".to_string()))
    }
}
