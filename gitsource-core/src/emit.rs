//! Publishing the remote node and its file nodes

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::config::DEFAULT_CONCURRENCY;
use crate::graph::{
    ContentGraph, FileNodeFactory, FileNodeOptions, GitRemoteData, Internal, Node, NodeData,
    NodeId, GIT_REMOTE_KIND,
};
use crate::remote::SyncedRemote;
use crate::{Error, Result};

/// Owner recorded on remote nodes
pub const REMOTE_OWNER: &str = "gitsource";

/// Owner recorded on file nodes
pub const FILE_OWNER: &str = "filesystem";

/// A file whose node could not be built or committed
#[derive(Debug)]
pub struct FileNodeFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Aggregate outcome of publishing a pass's file nodes
#[derive(Debug, Default)]
pub struct EmitReport {
    /// Number of file nodes committed
    pub created: usize,
    /// Files that failed, in completion order
    pub failures: Vec<FileNodeFailure>,
}

impl EmitReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Publishes nodes for one synchronized remote
pub struct NodeEmitter {
    graph: Arc<dyn ContentGraph>,
    factory: Arc<dyn FileNodeFactory>,
    concurrency: usize,
}

impl std::fmt::Debug for NodeEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeEmitter")
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl NodeEmitter {
    pub fn new(graph: Arc<dyn ContentGraph>, factory: Arc<dyn FileNodeFactory>) -> Self {
        Self {
            graph,
            factory,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Limit how many file nodes are in flight at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Build the `GitRemote` node for `remote`
    pub fn remote_node(&self, remote: &SyncedRemote) -> Result<Node> {
        let descriptor = &remote.descriptor;
        let url = &descriptor.url;

        let data = GitRemoteData {
            href: url.redacted(),
            protocol: url.protocol.clone(),
            host: url.host.clone(),
            port: url.port,
            owner: url.owner.clone(),
            name: url.name.clone(),
            full_name: url.full_name(),
            web_link: url.web_url(),
            ref_name: remote.resolved_ref.clone(),
            source_instance_name: descriptor.source_name.clone(),
        };
        let content = serde_json::to_string(&data)?;

        Ok(Node {
            id: self.graph.create_node_id(&descriptor.node_seed()),
            parent: None,
            children: Vec::new(),
            internal: Internal {
                kind: GIT_REMOTE_KIND.to_string(),
                content_digest: self.graph.create_content_digest(content.as_bytes()),
                content: Some(content),
                media_type: None,
                description: None,
                owner: Some(REMOTE_OWNER.to_string()),
            },
            data: NodeData::GitRemote(data),
        })
    }

    /// Commit the remote node and return its ID
    pub async fn emit_remote(&self, remote: &SyncedRemote) -> Result<NodeId> {
        let node = self.remote_node(remote)?;
        let id = node.id.clone();
        self.graph.create_node(node).await?;
        tracing::debug!(id = %id, source = %remote.descriptor.source_name, "Created remote node");
        Ok(id)
    }

    /// Build and commit one node per file, each linked to `remote_id`
    ///
    /// Files are processed concurrently up to the configured limit. A failing
    /// file is recorded in the report and does not affect the others.
    pub async fn emit_files(
        &self,
        remote_id: &NodeId,
        files: Vec<PathBuf>,
        options: &FileNodeOptions,
    ) -> EmitReport {
        let results: Vec<(PathBuf, Result<()>)> = stream::iter(files)
            .map(|path| async move {
                let result = self.emit_file(&path, remote_id, options).await;
                (path, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = EmitReport::default();
        for (path, result) in results {
            match result {
                Ok(()) => report.created += 1,
                Err(error) => {
                    tracing::warn!(path = %path.display(), error = %error, "Failed to create file node");
                    report.failures.push(FileNodeFailure { path, error });
                }
            }
        }
        report
    }

    async fn emit_file(&self, path: &Path, remote_id: &NodeId, options: &FileNodeOptions) -> Result<()> {
        let as_file_error = |e: Error| match e {
            Error::FileNode { .. } => e,
            other => Error::FileNode {
                path: path.to_path_buf(),
                message: other.to_string(),
            },
        };

        let mut node = self
            .factory
            .create_file_node(path, self.graph.as_ref(), options)
            .await
            .map_err(as_file_error)?;

        match &mut node.data {
            NodeData::File(file) => file.git_remote = Some(remote_id.clone()),
            NodeData::GitRemote(_) => {
                return Err(Error::FileNode {
                    path: path.to_path_buf(),
                    message: "factory returned a non-file node".to_string(),
                })
            }
        }
        node.internal.owner = Some(FILE_OWNER.to_string());

        self.graph.create_node(node).await.map_err(as_file_error)
    }
}
