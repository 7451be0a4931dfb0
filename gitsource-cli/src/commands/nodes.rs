//! Nodes command - list what previous syncs stored

use std::path::PathBuf;

use clap::Args;
use gitsource_core::graph::{NodeData, FILE_KIND, GIT_REMOTE_KIND};
use gitsource_core::{Config, Node};
use gitsource_db::{Database, DatabaseConfig, NodeStore};

/// Arguments for the nodes command
#[derive(Args, Debug)]
pub struct NodesArgs {
    /// Only list nodes of this kind ("GitRemote" or "File")
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Only list nodes linked to the remote node of this source
    #[arg(short, long)]
    pub remote: Option<String>,

    /// Node database path (defaults to <cache_dir>/graph.db)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Print full node bodies as JSON
    #[arg(long)]
    pub json: bool,
}

impl NodesArgs {
    /// Execute the nodes command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let path = match &self.db {
            Some(path) => path.clone(),
            None => config.database_path()?,
        };
        let db = Database::open(DatabaseConfig::new(path))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open node database: {}", e))?;
        let store = db.nodes();

        let nodes = self.collect(&store).await?;

        for node in &nodes {
            if self.json {
                println!("{}", serde_json::to_string_pretty(node)?);
            } else {
                println!("{:<10} {}  {}", node.kind(), node.id, label(node));
            }
        }
        println!();
        println!("{} node(s)", nodes.len());

        db.close().await;
        Ok(())
    }

    async fn collect(&self, store: &NodeStore) -> anyhow::Result<Vec<Node>> {
        let mut nodes = match &self.remote {
            Some(name) => {
                let remote = store
                    .list_by_kind(GIT_REMOTE_KIND)
                    .await?
                    .into_iter()
                    .find(|n| matches!(&n.data, NodeData::GitRemote(r) if &r.source_instance_name == name))
                    .ok_or_else(|| anyhow::anyhow!("No remote node for source '{}'", name))?;
                store.linked_to(&remote.id).await?
            }
            None => match &self.kind {
                Some(kind) => store.list_by_kind(kind).await?,
                None => {
                    let mut all = store.list_by_kind(GIT_REMOTE_KIND).await?;
                    all.extend(store.list_by_kind(FILE_KIND).await?);
                    all
                }
            },
        };

        if let (Some(_), Some(kind)) = (&self.remote, &self.kind) {
            nodes.retain(|n| n.kind() == kind);
        }

        Ok(nodes)
    }
}

fn label(node: &Node) -> String {
    match &node.data {
        NodeData::GitRemote(remote) => format!("{}@{}", remote.full_name, remote.ref_name),
        NodeData::File(file) => format!("{} ({})", file.relative_path, file.pretty_size),
    }
}
