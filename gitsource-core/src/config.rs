//! Configuration management for gitsource
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (GITSOURCE_*)
//! 3. Config file (~/.config/gitsource/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::git::DEFAULT_GIT_TIMEOUT;
use crate::{Error, Result};

/// Default number of file nodes built concurrently
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Git-related configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GitConfig {
    /// Path to the git executable
    pub path: String,

    /// Upper bound for any single git command
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            path: "git".to_string(),
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }
}

/// Glob patterns selecting files; a single string or a list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Patterns {
    One(String),
    Many(Vec<String>),
}

impl Default for Patterns {
    fn default() -> Self {
        Patterns::One("**".to_string())
    }
}

impl Patterns {
    /// Patterns as a list; an empty list means everything
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Patterns::One(p) => vec![p.clone()],
            Patterns::Many(ps) if ps.is_empty() => vec!["**".to_string()],
            Patterns::Many(ps) => ps.clone(),
        }
    }
}

impl From<Vec<String>> for Patterns {
    fn from(patterns: Vec<String>) -> Self {
        Patterns::Many(patterns)
    }
}

/// One repository to mirror and publish
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Remote URL to clone from
    pub remote: String,

    /// Source instance name (defaults to the repository name)
    #[serde(default)]
    pub name: Option<String>,

    /// Branch to track (defaults to the remote's default branch)
    #[serde(default)]
    pub branch: Option<String>,

    /// Explicit mirror location (defaults to a path under the cache directory)
    #[serde(default)]
    pub local: Option<PathBuf>,

    /// Sub-directory of the mirror to enumerate
    #[serde(default)]
    pub root_dir: Option<PathBuf>,

    /// Glob patterns relative to the enumerated root
    #[serde(default)]
    pub patterns: Patterns,

    /// Extra arguments passed through to `git fetch`
    #[serde(default)]
    pub fetch_options: Vec<String>,

    /// Match files and directories whose names start with '.'
    #[serde(default)]
    pub include_dotfiles: bool,
}

impl SourceConfig {
    /// A source with every option at its default
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            name: None,
            branch: None,
            local: None,
            root_dir: None,
            patterns: Patterns::default(),
            fetch_options: Vec::new(),
            include_dotfiles: false,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Base cache directory for mirrors and the node database
    pub cache_dir: Option<PathBuf>,

    /// Maximum number of file nodes built at once
    pub concurrency: usize,

    /// Git configuration
    pub git: GitConfig,

    /// Repositories to publish
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: None,
            concurrency: DEFAULT_CONCURRENCY,
            git: GitConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let config: Self = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/gitsource/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gitsource").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - GITSOURCE_CACHE_DIR: Base cache directory
    /// - GITSOURCE_GIT_PATH: Path to git executable
    /// - GITSOURCE_GIT_TIMEOUT: Per-command timeout (e.g., "90s", "5m")
    /// - GITSOURCE_CONCURRENCY: File node concurrency
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(dir) = std::env::var("GITSOURCE_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(dir));
        }

        if let Ok(git_path) = std::env::var("GITSOURCE_GIT_PATH") {
            self.git.path = git_path;
        }

        if let Ok(timeout) = std::env::var("GITSOURCE_GIT_TIMEOUT") {
            self.git.timeout = humantime::parse_duration(&timeout).map_err(|e| {
                Error::Config(format!("Invalid GITSOURCE_GIT_TIMEOUT '{}': {}", timeout, e))
            })?;
        }

        if let Ok(concurrency) = std::env::var("GITSOURCE_CONCURRENCY") {
            self.concurrency = concurrency.parse().map_err(|e| {
                Error::Config(format!("Invalid GITSOURCE_CONCURRENCY '{}': {}", concurrency, e))
            })?;
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, cache_dir: Option<PathBuf>, git_path: Option<String>) -> Self {
        if let Some(dir) = cache_dir {
            self.cache_dir = Some(dir);
        }

        if let Some(path) = git_path {
            self.git.path = path;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        config_path: Option<&Path>,
        cache_dir: Option<PathBuf>,
        git_path: Option<String>,
    ) -> Result<Self> {
        let config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };

        let config = config
            .with_env_overrides()?
            .with_cli_overrides(cache_dir, git_path);
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no pass could run with
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }

        if self.git.timeout.is_zero() {
            return Err(Error::Config("git.timeout must be non-zero".to_string()));
        }

        if let Some(source) = self.sources.iter().find(|s| s.remote.trim().is_empty()) {
            return Err(Error::Config(format!(
                "Source {} has an empty remote",
                source.name.as_deref().unwrap_or("(unnamed)")
            )));
        }

        Ok(())
    }

    /// Base cache directory
    ///
    /// Returns `~/.cache/gitsource` unless configured
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::cache_dir()
                .map(|p| p.join("gitsource"))
                .ok_or_else(|| Error::Config("Could not determine cache directory".to_string())),
        }
    }

    /// Directory under which mirrors are placed
    pub fn mirror_root(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join("mirrors"))
    }

    /// Location of the node database
    pub fn database_path(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join("graph.db"))
    }
}
