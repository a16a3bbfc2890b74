//! Repository for the node trash view.
//!
//! Lists soft-deleted nodes of a curriculum and answers the parent-status
//! question the restore flow needs.

use curriculum_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::node::Node;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, curriculum_id, parent_node_id, title, node_type, description, \
    order_index, deleted_at, created_at, updated_at";

/// Provides trash listing and restore checks for nodes.
pub struct TrashRepo;

impl TrashRepo {
    // ── Listing ───────────────────────────────────────────────────────

    /// Soft-deleted nodes of a curriculum, most recently deleted first.
    ///
    /// Nodes removed by one cascade share a `deleted_at`; within that group
    /// they are ordered by id. `limit` must already be clamped.
    pub async fn list_trashed(
        pool: &PgPool,
        curriculum_id: DbId,
        limit: i64,
    ) -> Result<Vec<Node>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM nodes
             WHERE curriculum_id = $1 AND deleted_at IS NOT NULL
             ORDER BY deleted_at DESC, id
             LIMIT $2"
        );
        sqlx::query_as::<_, Node>(&query)
            .bind(curriculum_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Number of soft-deleted nodes in a curriculum.
    pub async fn trash_count(pool: &PgPool, curriculum_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM nodes WHERE curriculum_id = $1 AND deleted_at IS NOT NULL",
        )
        .bind(curriculum_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    // ── Restore checks ────────────────────────────────────────────────

    /// Check whether the parent of a node is itself trashed.
    ///
    /// Returns `Some(description)` if the parent has a non-NULL `deleted_at`,
    /// or `None` if the parent is live or the node is root-level. The parent
    /// row is locked so it cannot be deleted while the restore proceeds.
    pub async fn check_parent_trashed(
        conn: &mut PgConnection,
        node_id: DbId,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(DbId, Option<Timestamp>)> = sqlx::query_as(
            "SELECT p.id, p.deleted_at
             FROM nodes c
             JOIN nodes p ON p.id = c.parent_node_id
             WHERE c.id = $1
             FOR NO KEY UPDATE OF p",
        )
        .bind(node_id)
        .fetch_optional(conn)
        .await?;

        match row {
            // Root-level node
            None => Ok(None),
            Some((_, None)) => Ok(None),
            Some((parent_id, Some(_))) => Ok(Some(format!(
                "Cannot restore node {node_id}: parent node {parent_id} is trashed. \
                 Restore the parent first."
            ))),
        }
    }
}
