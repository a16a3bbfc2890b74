//! Repository for the `node_links` table.

use curriculum_core::link::LinkPayload;
use curriculum_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::node_link::NodeLink;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, node_id, link_type, url, title, youtube_video_id, zotero_item_key, \
    target_node_id, deleted_at, created_at, updated_at";

/// Provides CRUD operations for node links.
pub struct NodeLinkRepo;

impl NodeLinkRepo {
    /// Insert a link for `node_id`, flattening the payload into its columns.
    pub async fn create(
        conn: &mut PgConnection,
        node_id: DbId,
        payload: &LinkPayload,
    ) -> Result<NodeLink, sqlx::Error> {
        let cols = payload.to_columns();
        let query = format!(
            "INSERT INTO node_links
                (node_id, link_type, url, title, youtube_video_id, zotero_item_key, target_node_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NodeLink>(&query)
            .bind(node_id)
            .bind(payload.link_type().as_str())
            .bind(&cols.url)
            .bind(&cols.title)
            .bind(&cols.youtube_video_id)
            .bind(&cols.zotero_item_key)
            .bind(cols.target_node_id)
            .fetch_one(conn)
            .await
    }

    /// Find an active link by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<NodeLink>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM node_links WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, NodeLink>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Active links of a node, oldest first.
    pub async fn list_for_node(pool: &PgPool, node_id: DbId) -> Result<Vec<NodeLink>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM node_links
             WHERE node_id = $1 AND deleted_at IS NULL
             ORDER BY created_at, id"
        );
        sqlx::query_as::<_, NodeLink>(&query)
            .bind(node_id)
            .fetch_all(pool)
            .await
    }

    /// Every link of a node, including soft-deleted ones, oldest first.
    pub async fn list_for_node_include_deleted(
        pool: &PgPool,
        node_id: DbId,
    ) -> Result<Vec<NodeLink>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM node_links WHERE node_id = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, NodeLink>(&query)
            .bind(node_id)
            .fetch_all(pool)
            .await
    }

    /// Soft-delete a single link. Returns `true` if a row was marked deleted.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE node_links SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stamp `deleted_at` on the active links of every node in `node_ids`.
    pub async fn soft_delete_for_nodes(
        conn: &mut PgConnection,
        node_ids: &[DbId],
        deleted_at: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE node_links SET deleted_at = $2 WHERE node_id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(node_ids)
        .bind(deleted_at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Restore the links a cascade stamped with `deleted_at`.
    ///
    /// Links deleted individually before the cascade keep their own,
    /// earlier timestamp and stay deleted.
    pub async fn restore_cascaded(
        conn: &mut PgConnection,
        node_id: DbId,
        deleted_at: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE node_links SET deleted_at = NULL WHERE node_id = $1 AND deleted_at = $2",
        )
        .bind(node_id)
        .bind(deleted_at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}
