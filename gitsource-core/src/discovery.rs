//! File discovery inside a synchronized mirror

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::{DirEntry, WalkDir};

use crate::{Error, Result};

/// Resolve the directory to enumerate: `mirror` joined with `root_dir`
///
/// An absolute `root_dir` replaces the mirror path entirely.
pub fn resolve_root(mirror: &Path, root_dir: Option<&Path>) -> PathBuf {
    match root_dir {
        Some(dir) => mirror.join(dir),
        None => mirror.to_path_buf(),
    }
}

/// Finds files under a root matching a set of glob patterns
///
/// Patterns are matched against paths relative to the root, with `*` confined
/// to one path segment and `**` spanning any number of them. A pattern starting
/// with `!` excludes what it matches. The `.git` directory is never entered.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    root: PathBuf,
    patterns: Vec<String>,
    include_dotfiles: bool,
}

impl FileDiscovery {
    /// Discover every file under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            patterns: vec!["**".to_string()],
            include_dotfiles: false,
        }
    }

    /// Set the glob patterns
    pub fn patterns(mut self, patterns: Vec<String>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Set whether dot-prefixed files and directories can match
    pub fn include_dotfiles(mut self, include: bool) -> Self {
        self.include_dotfiles = include;
        self
    }

    fn build_globsets(&self) -> Result<(GlobSet, GlobSet)> {
        let mut include = GlobSetBuilder::new();
        let mut exclude = GlobSetBuilder::new();
        let mut has_include = false;

        for pattern in &self.patterns {
            let (builder, pattern) = match pattern.strip_prefix('!') {
                Some(negated) => (&mut exclude, negated),
                None => {
                    has_include = true;
                    (&mut include, pattern.as_str())
                }
            };
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| Error::Config(format!("Invalid pattern '{}': {}", pattern, e)))?;
            builder.add(glob);
        }

        if !has_include {
            include.add(
                GlobBuilder::new("**")
                    .build()
                    .map_err(|e| Error::Config(e.to_string()))?,
            );
        }

        let include = include
            .build()
            .map_err(|e| Error::Config(format!("Invalid patterns: {}", e)))?;
        let exclude = exclude
            .build()
            .map_err(|e| Error::Config(format!("Invalid patterns: {}", e)))?;
        Ok((include, exclude))
    }

    fn is_skipped(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        match entry.file_name().to_str() {
            Some(".git") => true,
            Some(name) => !self.include_dotfiles && name.starts_with('.'),
            None => false,
        }
    }

    /// Walk the root and return matching files as sorted absolute paths
    ///
    /// A root that does not exist yields no files.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let (include, exclude) = self.build_globsets()?;

        if !self.root.is_dir() {
            tracing::warn!(root = %self.root.display(), "Discovery root does not exist, no files to publish");
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.is_skipped(e));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| Error::Discovery(e.to_string()))?;

            if include.is_match(relative) && !exclude.is_match(relative) {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();
        tracing::debug!(root = %self.root.display(), matched = files.len(), "Discovered files");
        Ok(files)
    }

    /// [`FileDiscovery::discover`] on the blocking pool
    pub async fn discover_async(self) -> Result<Vec<PathBuf>> {
        tokio::task::spawn_blocking(move || self.discover())
            .await
            .map_err(|e| Error::Discovery(format!("Discovery task failed: {}", e)))?
    }
}
