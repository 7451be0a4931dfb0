//! Node storage

use async_trait::async_trait;
use chrono::Utc;
use gitsource_core::graph::{ContentGraph, Node, NodeId};
use sqlx::sqlite::SqlitePool;

use crate::{Error, Result};

/// Content graph persisted in SQLite
#[derive(Debug, Clone)]
pub struct NodeStore {
    pool: SqlitePool,
}

impl NodeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a node and its links in one transaction
    ///
    /// Every link target must already be stored. The write lock is taken up
    /// front so concurrent upserts queue on the busy timeout instead of
    /// failing to upgrade a read transaction.
    pub async fn upsert(&self, node: &Node) -> Result<()> {
        let body = serde_json::to_string(node)?;
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        for (_, target) in node.links() {
            let (exists,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nodes WHERE id = ?")
                .bind(target.as_str())
                .fetch_one(&mut *tx)
                .await?;
            if exists == 0 {
                return Err(Error::DanglingLink {
                    from: node.id.to_string(),
                    to: target.to_string(),
                });
            }
        }

        sqlx::query(
            "INSERT INTO nodes (id, kind, owner, content_digest, body, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                owner = excluded.owner,
                content_digest = excluded.content_digest,
                body = excluded.body,
                updated_at = excluded.updated_at",
        )
        .bind(node.id.as_str())
        .bind(node.kind())
        .bind(node.internal.owner.as_deref())
        .bind(node.internal.content_digest.as_str())
        .bind(body.as_str())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM node_links WHERE from_id = ?")
            .bind(node.id.as_str())
            .execute(&mut *tx)
            .await?;

        for (field, target) in node.links() {
            sqlx::query("INSERT INTO node_links (from_id, field, to_id) VALUES (?, ?, ?)")
                .bind(node.id.as_str())
                .bind(field)
                .bind(target.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::trace!(id = %node.id, kind = node.kind(), "Stored node");
        Ok(())
    }

    /// Find a node by ID
    pub async fn get(&self, id: &NodeId) -> Result<Option<Node>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT body FROM nodes WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(body,)| serde_json::from_str(&body).map_err(Error::from))
            .transpose()
    }

    /// All nodes of `kind`, ordered by ID
    pub async fn list_by_kind(&self, kind: &str) -> Result<Vec<Node>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT body FROM nodes WHERE kind = ? ORDER BY id")
                .bind(kind)
                .fetch_all(&self.pool)
                .await?;

        Self::decode_all(rows)
    }

    /// Nodes with a link pointing at `id`, ordered by ID
    pub async fn linked_to(&self, id: &NodeId) -> Result<Vec<Node>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT body FROM nodes
             WHERE id IN (SELECT from_id FROM node_links WHERE to_id = ?)
             ORDER BY id",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Self::decode_all(rows)
    }

    /// Number of stored nodes
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nodes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    fn decode_all(rows: Vec<(String,)>) -> Result<Vec<Node>> {
        rows.into_iter()
            .map(|(body,)| serde_json::from_str(&body).map_err(Error::from))
            .collect()
    }
}

#[async_trait]
impl ContentGraph for NodeStore {
    async fn create_node(&self, node: Node) -> gitsource_core::Result<()> {
        self.upsert(&node).await.map_err(Into::into)
    }
}
