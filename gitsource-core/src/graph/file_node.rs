//! Building file nodes from files on disk

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ContentGraph, FileData, Internal, Node, NodeData, FILE_KIND};
use crate::{Error, Result};

/// Options passed to a [`FileNodeFactory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNodeOptions {
    /// Source instance name recorded on the node
    pub name: String,
    /// Directory relative paths are computed against
    pub base_path: PathBuf,
}

/// Turns a file into an uncommitted node
#[async_trait]
pub trait FileNodeFactory: Send + Sync {
    async fn create_file_node(
        &self,
        path: &Path,
        graph: &dyn ContentGraph,
        options: &FileNodeOptions,
    ) -> Result<Node>;
}

/// Reads file metadata and content from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileNodeFactory;

#[async_trait]
impl FileNodeFactory for FsFileNodeFactory {
    async fn create_file_node(
        &self,
        path: &Path,
        graph: &dyn ContentGraph,
        options: &FileNodeOptions,
    ) -> Result<Node> {
        let file_error = |e: std::io::Error| Error::FileNode {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let metadata = tokio::fs::metadata(path).await.map_err(file_error)?;
        if !metadata.is_file() {
            return Err(Error::FileNode {
                path: path.to_path_buf(),
                message: "not a regular file".to_string(),
            });
        }
        let contents = tokio::fs::read(path).await.map_err(file_error)?;

        let absolute_path = path.to_string_lossy().into_owned();
        let relative = path.strip_prefix(&options.base_path).unwrap_or(path);
        let relative_path = slash_path(relative);
        let relative_directory = relative.parent().map(slash_path).unwrap_or_default();

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = if extension.is_empty() {
            String::new()
        } else {
            format!(".{}", extension)
        };

        let data = FileData {
            source_instance_name: options.name.clone(),
            absolute_path: absolute_path.clone(),
            relative_path: relative_path.clone(),
            relative_directory,
            root: path
                .ancestors()
                .last()
                .map(|r| r.to_string_lossy().into_owned())
                .unwrap_or_default(),
            dir: path
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            base: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            name: path
                .file_stem()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ext,
            size: metadata.len(),
            pretty_size: pretty_size(metadata.len()),
            modified_time: metadata.modified().ok().map(DateTime::<Utc>::from),
            access_time: metadata.accessed().ok().map(DateTime::<Utc>::from),
            birth_time: metadata.created().ok().map(DateTime::<Utc>::from),
            extension: extension.clone(),
            git_remote: None,
        };

        Ok(Node {
            id: graph.create_node_id(&absolute_path),
            parent: None,
            children: Vec::new(),
            internal: Internal {
                kind: FILE_KIND.to_string(),
                content_digest: graph.create_content_digest(&contents),
                content: None,
                media_type: Some(media_type(&extension).to_string()),
                description: Some(format!("File \"{}\"", relative_path)),
                owner: None,
            },
            data: NodeData::File(data),
        })
    }
}

/// Join path components with '/' regardless of platform
fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Human-readable size in SI units with three significant digits ("1.5 kB")
pub(crate) fn pretty_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "kB", "MB", "GB", "TB", "PB"];

    if bytes < 1000 {
        return format!("{} B", bytes);
    }

    let mut exponent = (((bytes as f64).log10() / 3.0).floor() as usize).min(UNITS.len() - 1);
    let mut value = bytes as f64 / 1000f64.powi(exponent as i32);
    // 999.5 and up would print as "1000", so carry into the next unit
    if value.round() >= 1000.0 && exponent < UNITS.len() - 1 {
        exponent += 1;
        value /= 1000.0;
    }
    let formatted = if value >= 100.0 {
        format!("{:.0}", value)
    } else if value >= 10.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.2}", value)
    };
    let formatted = if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.')
    } else {
        formatted.as_str()
    };

    format!("{} {}", formatted, UNITS[exponent])
}

fn media_type(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "md" | "markdown" => "text/markdown",
        "mdx" => "text/mdx",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "yaml" | "yml" => "text/yaml",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "toml" => "application/toml",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{content_digest, MemoryGraph, NodeId};
    use tempfile::TempDir;

    #[test]
    fn test_pretty_size() {
        assert_eq!(pretty_size(0), "0 B");
        assert_eq!(pretty_size(999), "999 B");
        assert_eq!(pretty_size(1500), "1.5 kB");
        assert_eq!(pretty_size(12_345), "12.3 kB");
        assert_eq!(pretty_size(123_456), "123 kB");
        assert_eq!(pretty_size(1_000_000), "1 MB");
        assert_eq!(pretty_size(999_499), "999 kB");
        assert_eq!(pretty_size(999_999), "1 MB");
        assert_eq!(pretty_size(999_999_999), "1 GB");
    }

    #[test]
    fn test_media_type() {
        assert_eq!(media_type("md"), "text/markdown");
        assert_eq!(media_type("PNG"), "image/png");
        assert_eq!(media_type(""), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_create_file_node() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("docs/guide/setup.md");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "# Setup\n").unwrap();

        let graph = MemoryGraph::new();
        let options = FileNodeOptions {
            name: "widgets".to_string(),
            base_path: temp.path().to_path_buf(),
        };
        let node = FsFileNodeFactory
            .create_file_node(&file, &graph, &options)
            .await
            .unwrap();

        assert_eq!(node.id, NodeId::from_seed(&file.to_string_lossy()));
        assert_eq!(node.kind(), FILE_KIND);
        assert_eq!(node.internal.content_digest, content_digest(b"# Setup\n"));
        assert_eq!(node.internal.media_type.as_deref(), Some("text/markdown"));
        assert_eq!(
            node.internal.description.as_deref(),
            Some("File \"docs/guide/setup.md\"")
        );

        let NodeData::File(data) = node.data else {
            panic!("expected a file node");
        };
        assert_eq!(data.source_instance_name, "widgets");
        assert_eq!(data.relative_path, "docs/guide/setup.md");
        assert_eq!(data.relative_directory, "docs/guide");
        assert_eq!(data.base, "setup.md");
        assert_eq!(data.name, "setup");
        assert_eq!(data.ext, ".md");
        assert_eq!(data.extension, "md");
        assert_eq!(data.size, 8);
        assert_eq!(data.pretty_size, "8 B");
        assert!(data.modified_time.is_some());
        assert!(data.git_remote.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_file_node_error() {
        let temp = TempDir::new().unwrap();
        let graph = MemoryGraph::new();
        let options = FileNodeOptions {
            name: "widgets".to_string(),
            base_path: temp.path().to_path_buf(),
        };
        let result = FsFileNodeFactory
            .create_file_node(&temp.path().join("gone.md"), &graph, &options)
            .await;
        assert!(matches!(result, Err(Error::FileNode { .. })));
    }
}
