//! Read-only scan for tree invariant violations.
//!
//! Every check here should come back empty on a healthy database. The scan
//! takes no locks and sees committed data only.

use curriculum_core::types::DbId;
use sqlx::PgPool;

use crate::models::integrity::{DuplicateSiblingOrder, TreeIntegrityReport};

/// Provides the integrity checks run by the tree-check tool.
pub struct IntegrityRepo;

impl IntegrityRepo {
    /// Run every check against one curriculum.
    pub async fn scan_curriculum(
        pool: &PgPool,
        curriculum_id: DbId,
    ) -> Result<TreeIntegrityReport, sqlx::Error> {
        Ok(TreeIntegrityReport {
            curriculum_id,
            duplicate_sibling_orders: Self::duplicate_sibling_orders(pool, curriculum_id).await?,
            orphaned_active_nodes: Self::orphaned_active_nodes(pool, curriculum_id).await?,
            content_mismatches: Self::content_mismatches(pool, curriculum_id).await?,
            live_links_on_deleted_nodes: Self::live_links_on_deleted_nodes(pool, curriculum_id)
                .await?,
        })
    }

    /// Active siblings sharing an `order_index`.
    pub async fn duplicate_sibling_orders(
        pool: &PgPool,
        curriculum_id: DbId,
    ) -> Result<Vec<DuplicateSiblingOrder>, sqlx::Error> {
        sqlx::query_as::<_, DuplicateSiblingOrder>(
            "SELECT parent_node_id, order_index, ARRAY_AGG(id ORDER BY id) AS node_ids
             FROM nodes
             WHERE curriculum_id = $1 AND deleted_at IS NULL
             GROUP BY parent_node_id, order_index
             HAVING COUNT(*) > 1
             ORDER BY parent_node_id NULLS FIRST, order_index",
        )
        .bind(curriculum_id)
        .fetch_all(pool)
        .await
    }

    /// Active nodes whose parent is deleted, missing, or in another curriculum.
    pub async fn orphaned_active_nodes(
        pool: &PgPool,
        curriculum_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT c.id
             FROM nodes c
             LEFT JOIN nodes p ON p.id = c.parent_node_id
             WHERE c.curriculum_id = $1
               AND c.deleted_at IS NULL
               AND c.parent_node_id IS NOT NULL
               AND (p.id IS NULL OR p.deleted_at IS NOT NULL OR p.curriculum_id <> c.curriculum_id)
             ORDER BY c.id",
        )
        .bind(curriculum_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Nodes with no content row, or whose content disagrees on deleted state.
    pub async fn content_mismatches(
        pool: &PgPool,
        curriculum_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT n.id
             FROM nodes n
             LEFT JOIN node_contents c ON c.node_id = n.id
             WHERE n.curriculum_id = $1
               AND (c.id IS NULL OR (n.deleted_at IS NULL) <> (c.deleted_at IS NULL))
             ORDER BY n.id",
        )
        .bind(curriculum_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Active links whose owning node is deleted.
    pub async fn live_links_on_deleted_nodes(
        pool: &PgPool,
        curriculum_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT l.id
             FROM node_links l
             JOIN nodes n ON n.id = l.node_id
             WHERE n.curriculum_id = $1
               AND n.deleted_at IS NOT NULL
               AND l.deleted_at IS NULL
             ORDER BY l.id",
        )
        .bind(curriculum_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
