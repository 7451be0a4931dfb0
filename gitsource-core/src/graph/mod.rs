//! Content graph model and the host graph interface
//!
//! Nodes reference each other by [`NodeId`] only. A file node's link to its
//! remote is the `git_remote` field; graph implementations index these links so
//! the files of a remote can be looked up without scanning every node.

mod file_node;
mod memory;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::Result;

pub use file_node::{FileNodeFactory, FileNodeOptions, FsFileNodeFactory};
pub use memory::MemoryGraph;

/// Node kind of the per-source remote descriptor node
pub const GIT_REMOTE_KIND: &str = "GitRemote";

/// Node kind of file nodes
pub const FILE_KIND: &str = "File";

/// Link field on file nodes pointing at their remote node
pub const GIT_REMOTE_FIELD: &str = "git_remote";

/// Stable identifier of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Deterministic ID for `seed`; equal seeds always give equal IDs
    pub fn from_seed(seed: &str) -> Self {
        let namespace = Uuid::new_v5(&Uuid::NAMESPACE_URL, b"gitsource");
        Self(Uuid::new_v5(&namespace, seed.as_bytes()).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex SHA-256 of `bytes`
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Bookkeeping every node carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Internal {
    /// Node kind, e.g. "GitRemote" or "File"
    #[serde(rename = "type")]
    pub kind: String,
    /// Changes whenever the node's content changes
    pub content_digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of the component that created the node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Fields of a `GitRemote` node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRemoteData {
    /// The configured remote with credentials removed
    pub href: String,
    pub protocol: String,
    pub host: String,
    pub port: Option<u16>,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub web_link: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub source_instance_name: String,
}

/// Fields of a `File` node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileData {
    pub source_instance_name: String,
    pub absolute_path: String,
    /// Path relative to the mirror root, '/'-separated
    pub relative_path: String,
    pub relative_directory: String,
    pub root: String,
    pub dir: String,
    /// File name with extension
    pub base: String,
    /// File name without extension
    pub name: String,
    /// Extension with leading dot, or empty
    pub ext: String,
    /// Extension without leading dot, or empty
    pub extension: String,
    pub size: u64,
    pub pretty_size: String,
    pub modified_time: Option<DateTime<Utc>>,
    pub access_time: Option<DateTime<Utc>>,
    pub birth_time: Option<DateTime<Utc>>,
    /// The remote this file was sourced from
    #[serde(default)]
    pub git_remote: Option<NodeId>,
}

/// Kind-specific node fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeData {
    GitRemote(GitRemoteData),
    File(FileData),
}

/// A node of the content graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub children: Vec<NodeId>,
    pub internal: Internal,
    pub data: NodeData,
}

impl Node {
    /// Node kind
    pub fn kind(&self) -> &str {
        &self.internal.kind
    }

    /// Outgoing references as `(field, target)` pairs
    pub fn links(&self) -> Vec<(&'static str, &NodeId)> {
        match &self.data {
            NodeData::File(file) => file
                .git_remote
                .iter()
                .map(|id| (GIT_REMOTE_FIELD, id))
                .collect(),
            NodeData::GitRemote(_) => Vec::new(),
        }
    }
}

/// The host content graph nodes are published into
#[async_trait]
pub trait ContentGraph: Send + Sync {
    /// Insert or replace the node with `node.id`
    ///
    /// Implementations reject nodes whose links point at unknown nodes.
    async fn create_node(&self, node: Node) -> Result<()>;

    /// Stable node ID derived from `seed`
    fn create_node_id(&self, seed: &str) -> NodeId {
        NodeId::from_seed(seed)
    }

    /// Stable digest of `bytes`
    fn create_content_digest(&self, bytes: &[u8]) -> String {
        content_digest(bytes)
    }
}
