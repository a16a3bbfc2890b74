//! Repository for the `node_contents` table.

use curriculum_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgExecutor};

use crate::models::node_content::{NodeContent, UpdateNodeContent};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, node_id, markdown_content, ai_generated_content, ai_summary, \
    ai_model, deleted_at, created_at, updated_at";

/// Provides queries for the one-per-node content row.
pub struct NodeContentRepo;

impl NodeContentRepo {
    /// Insert the empty content row for a freshly created node.
    pub async fn create_empty(
        conn: &mut PgConnection,
        node_id: DbId,
    ) -> Result<NodeContent, sqlx::Error> {
        let query = format!(
            "INSERT INTO node_contents (node_id, markdown_content) VALUES ($1, '')
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NodeContent>(&query)
            .bind(node_id)
            .fetch_one(conn)
            .await
    }

    /// Find the active content of a node.
    pub async fn find_by_node(
        executor: impl PgExecutor<'_>,
        node_id: DbId,
    ) -> Result<Option<NodeContent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM node_contents WHERE node_id = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, NodeContent>(&query)
            .bind(node_id)
            .fetch_optional(executor)
            .await
    }

    /// Update a node's active content. Only non-`None` fields are applied.
    pub async fn update(
        conn: &mut PgConnection,
        node_id: DbId,
        input: &UpdateNodeContent,
    ) -> Result<Option<NodeContent>, sqlx::Error> {
        let query = format!(
            "UPDATE node_contents SET
                markdown_content = COALESCE($2, markdown_content),
                ai_generated_content = COALESCE($3, ai_generated_content),
                ai_summary = COALESCE($4, ai_summary),
                ai_model = COALESCE($5, ai_model)
             WHERE node_id = $1 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NodeContent>(&query)
            .bind(node_id)
            .bind(&input.markdown_content)
            .bind(&input.ai_generated_content)
            .bind(&input.ai_summary)
            .bind(&input.ai_model)
            .fetch_optional(conn)
            .await
    }

    /// Stamp `deleted_at` on the active content of every node in `node_ids`.
    pub async fn soft_delete_for_nodes(
        conn: &mut PgConnection,
        node_ids: &[DbId],
        deleted_at: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE node_contents SET deleted_at = $2 WHERE node_id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(node_ids)
        .bind(deleted_at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Restore a node's content alongside the node.
    pub async fn restore_for_node(conn: &mut PgConnection, node_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE node_contents SET deleted_at = NULL WHERE node_id = $1 AND deleted_at IS NOT NULL",
        )
        .bind(node_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
