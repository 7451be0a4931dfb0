//! In-memory content graph

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ContentGraph, Node, NodeId};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct MemoryState {
    nodes: BTreeMap<NodeId, Node>,
    /// target -> nodes linking to it
    backlinks: HashMap<NodeId, BTreeSet<NodeId>>,
}

/// Content graph held in memory, with an index of incoming links
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: RwLock<MemoryState>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a node by ID
    pub async fn get(&self, id: &NodeId) -> Option<Node> {
        self.state.read().await.nodes.get(id).cloned()
    }

    /// All nodes of `kind`, ordered by ID
    pub async fn nodes_of_kind(&self, kind: &str) -> Vec<Node> {
        self.state
            .read()
            .await
            .nodes
            .values()
            .filter(|n| n.kind() == kind)
            .cloned()
            .collect()
    }

    /// Nodes holding a link to `target`
    pub async fn linked_to(&self, target: &NodeId) -> Vec<Node> {
        let state = self.state.read().await;
        state
            .backlinks
            .get(target)
            .into_iter()
            .flatten()
            .filter_map(|id| state.nodes.get(id).cloned())
            .collect()
    }

    /// Number of nodes
    pub async fn len(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ContentGraph for MemoryGraph {
    async fn create_node(&self, node: Node) -> Result<()> {
        let mut state = self.state.write().await;

        if let Some((field, target)) = node
            .links()
            .into_iter()
            .find(|(_, target)| !state.nodes.contains_key(*target))
        {
            return Err(Error::Graph(format!(
                "Node {} links {} to unknown node {}",
                node.id, field, target
            )));
        }

        if let Some(previous) = state.nodes.get(&node.id).cloned() {
            for (_, target) in previous.links() {
                if let Some(sources) = state.backlinks.get_mut(target) {
                    sources.remove(&previous.id);
                }
            }
        }

        for (_, target) in node.links() {
            state
                .backlinks
                .entry(target.clone())
                .or_default()
                .insert(node.id.clone());
        }

        state.nodes.insert(node.id.clone(), node);
        Ok(())
    }
}
