//! Repository for the `nodes` table.
//!
//! Methods taking `&mut PgConnection` are transaction steps; the caller owns
//! the transaction and the lock ordering. Plain reads take `&PgPool` or any
//! executor.

use curriculum_core::node_type::NodeType;
use curriculum_core::tree::SiblingScope;
use curriculum_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::models::node::{CreateNode, Node, UpdateNode};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, curriculum_id, parent_node_id, title, node_type, description, \
    order_index, deleted_at, created_at, updated_at";

/// [`COLUMNS`] qualified with a table alias, for joins and recursive terms.
fn columns_for(alias: &str) -> String {
    COLUMNS
        .split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// SQL predicate selecting the members of a sibling scope, binding `$1`.
fn scope_filter(scope: SiblingScope) -> (&'static str, DbId) {
    match scope {
        SiblingScope::Root { curriculum_id } => {
            ("curriculum_id = $1 AND parent_node_id IS NULL", curriculum_id)
        }
        SiblingScope::Parent(parent) => ("parent_node_id = $1", parent),
    }
}

/// Provides queries and transaction steps for tree nodes.
pub struct NodeRepo;

impl NodeRepo {
    // ── Inserts ───────────────────────────────────────────────────────

    /// Insert a node at `order_index`. The caller must hold the scope lock.
    pub async fn insert(
        conn: &mut PgConnection,
        input: &CreateNode,
        node_type: NodeType,
        order_index: i32,
    ) -> Result<Node, sqlx::Error> {
        let query = format!(
            "INSERT INTO nodes (curriculum_id, parent_node_id, title, node_type, description, order_index)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Node>(&query)
            .bind(input.curriculum_id)
            .bind(input.parent_node_id)
            .bind(input.title.trim())
            .bind(node_type.as_str())
            .bind(&input.description)
            .bind(order_index)
            .fetch_one(conn)
            .await
    }

    // ── Lookups ───────────────────────────────────────────────────────

    /// Find a node by ID. Excludes soft-deleted rows.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Node>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM nodes WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Node>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a node by ID, including soft-deleted rows.
    pub async fn find_by_id_include_deleted(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<Option<Node>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM nodes WHERE id = $1");
        sqlx::query_as::<_, Node>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Active nodes of one type in a curriculum, grouped by parent in sibling order.
    pub async fn list_by_type(
        pool: &PgPool,
        curriculum_id: DbId,
        node_type: NodeType,
    ) -> Result<Vec<Node>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM nodes
             WHERE curriculum_id = $1 AND node_type = $2 AND deleted_at IS NULL
             ORDER BY parent_node_id NULLS FIRST, order_index"
        );
        sqlx::query_as::<_, Node>(&query)
            .bind(curriculum_id)
            .bind(node_type.as_str())
            .fetch_all(pool)
            .await
    }

    /// Active members of a sibling scope in `order_index` order.
    pub async fn list_siblings(
        executor: impl PgExecutor<'_>,
        scope: SiblingScope,
    ) -> Result<Vec<Node>, sqlx::Error> {
        let (filter, key) = scope_filter(scope);
        let query = format!(
            "SELECT {COLUMNS} FROM nodes
             WHERE {filter} AND deleted_at IS NULL
             ORDER BY order_index, id"
        );
        sqlx::query_as::<_, Node>(&query)
            .bind(key)
            .fetch_all(executor)
            .await
    }

    /// The active subtree rooted at `root_id`, as flat rows.
    ///
    /// `UNION` (not `UNION ALL`) discards repeated rows, so the recursion
    /// stops even if malformed data contains a parent cycle.
    pub async fn list_subtree(pool: &PgPool, root_id: DbId) -> Result<Vec<Node>, sqlx::Error> {
        let query = format!(
            "WITH RECURSIVE subtree AS (
                SELECT {COLUMNS}
                FROM nodes
                WHERE id = $1 AND deleted_at IS NULL
                UNION
                SELECT {child_columns}
                FROM nodes n
                INNER JOIN subtree s ON n.parent_node_id = s.id
                WHERE n.deleted_at IS NULL
            )
            SELECT {COLUMNS} FROM subtree",
            child_columns = columns_for("n"),
        );
        sqlx::query_as::<_, Node>(&query)
            .bind(root_id)
            .fetch_all(pool)
            .await
    }

    /// IDs on the parent chain of `id`, starting with `id` itself.
    ///
    /// Follows parents regardless of deleted state. Cycle-safe via `UNION`.
    pub async fn ancestor_ids(conn: &mut PgConnection, id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "WITH RECURSIVE ancestors AS (
                SELECT id, parent_node_id FROM nodes WHERE id = $1
                UNION
                SELECT n.id, n.parent_node_id
                FROM nodes n
                INNER JOIN ancestors a ON n.id = a.parent_node_id
            )
            SELECT id FROM ancestors",
        )
        .bind(id)
        .fetch_all(conn)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Number of active children directly under `id`.
    pub async fn count_active_children(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM nodes WHERE parent_node_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(conn)
        .await?;
        Ok(row.0)
    }

    // ── Locks and ordering ────────────────────────────────────────────

    /// Lock an active node row, returning it. `None` if absent or deleted.
    ///
    /// Used both to lock a node before mutating it and to lock a parent as
    /// the sibling scope of its children.
    pub async fn lock_active(conn: &mut PgConnection, id: DbId) -> Result<Option<Node>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM nodes WHERE id = $1 AND deleted_at IS NULL FOR NO KEY UPDATE"
        );
        sqlx::query_as::<_, Node>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Lock a node row whether or not it is deleted.
    pub async fn lock_include_deleted(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<Node>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM nodes WHERE id = $1 FOR NO KEY UPDATE");
        sqlx::query_as::<_, Node>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Lock and return the active children of every id in `parent_ids`.
    ///
    /// Rows are locked in id order. A create under any of the parents holds
    /// that parent's lock, so once the parents are locked this read sees
    /// every committed child.
    pub async fn lock_active_children(
        conn: &mut PgConnection,
        parent_ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT id FROM nodes
             WHERE parent_node_id = ANY($1) AND deleted_at IS NULL
             ORDER BY id
             FOR NO KEY UPDATE",
        )
        .bind(parent_ids)
        .fetch_all(conn)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Highest active `order_index` in a scope, or `None` when it is empty.
    pub async fn max_sibling_order(
        conn: &mut PgConnection,
        scope: SiblingScope,
    ) -> Result<Option<i32>, sqlx::Error> {
        let (filter, key) = scope_filter(scope);
        let query =
            format!("SELECT MAX(order_index) FROM nodes WHERE {filter} AND deleted_at IS NULL");
        let row: (Option<i32>,) = sqlx::query_as(&query).bind(key).fetch_one(conn).await?;
        Ok(row.0)
    }

    /// Whether an active node other than `except_id` holds `order_index` in a scope.
    pub async fn order_index_taken(
        conn: &mut PgConnection,
        scope: SiblingScope,
        order_index: i32,
        except_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let (filter, key) = scope_filter(scope);
        let query = format!(
            "SELECT EXISTS (
                SELECT 1 FROM nodes
                WHERE {filter} AND order_index = $2 AND id <> $3 AND deleted_at IS NULL
            )"
        );
        let row: (bool,) = sqlx::query_as(&query)
            .bind(key)
            .bind(order_index)
            .bind(except_id)
            .fetch_one(conn)
            .await?;
        Ok(row.0)
    }

    /// Renumber `ordered` densely from zero, in slice order.
    ///
    /// Runs in two passes so that the partial unique index never sees two
    /// active siblings on one index: first every row is parked on a distinct
    /// negative value, then moved to its final slot.
    pub async fn renumber(conn: &mut PgConnection, ordered: &[DbId]) -> Result<(), sqlx::Error> {
        let count = i32::try_from(ordered.len()).unwrap_or(i32::MAX);
        let parked: Vec<i32> = (1..=count).map(|i| -i).collect();
        let finals: Vec<i32> = (0..count).collect();
        for positions in [parked, finals] {
            sqlx::query(
                "UPDATE nodes AS n SET order_index = v.order_index
                 FROM UNNEST($1::BIGINT[], $2::INTEGER[]) AS v(id, order_index)
                 WHERE n.id = v.id",
            )
            .bind(ordered)
            .bind(&positions)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// The current transaction's start time, used as a shared cascade timestamp.
    pub async fn transaction_now(conn: &mut PgConnection) -> Result<Timestamp, sqlx::Error> {
        let row: (Timestamp,) = sqlx::query_as("SELECT NOW()").fetch_one(conn).await?;
        Ok(row.0)
    }

    // ── Updates ───────────────────────────────────────────────────────

    /// Update a node. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no active row with the given `id` exists.
    pub async fn update(
        conn: &mut PgConnection,
        id: DbId,
        input: &UpdateNode,
    ) -> Result<Option<Node>, sqlx::Error> {
        let query = format!(
            "UPDATE nodes SET
                title = COALESCE($2, title),
                node_type = COALESCE($3, node_type),
                description = COALESCE($4, description)
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Node>(&query)
            .bind(id)
            .bind(input.title.as_deref().map(str::trim))
            .bind(input.node_type.map(NodeType::as_str))
            .bind(&input.description)
            .fetch_optional(conn)
            .await
    }

    /// Re-parent an active node into `scope` at `order_index`.
    pub async fn set_parent(
        conn: &mut PgConnection,
        id: DbId,
        scope: SiblingScope,
        order_index: i32,
    ) -> Result<Node, sqlx::Error> {
        let query = format!(
            "UPDATE nodes SET parent_node_id = $2, order_index = $3
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Node>(&query)
            .bind(id)
            .bind(scope.parent_node_id())
            .bind(order_index)
            .fetch_one(conn)
            .await
    }

    // ── Soft delete / restore ─────────────────────────────────────────

    /// Stamp `deleted_at` on every still-active node in `ids`.
    pub async fn soft_delete_many(
        conn: &mut PgConnection,
        ids: &[DbId],
        deleted_at: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE nodes SET deleted_at = $2 WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(ids)
        .bind(deleted_at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Clear `deleted_at` on one node, placing it at `order_index`.
    pub async fn restore(
        conn: &mut PgConnection,
        id: DbId,
        order_index: i32,
    ) -> Result<Node, sqlx::Error> {
        let query = format!(
            "UPDATE nodes SET deleted_at = NULL, order_index = $2
             WHERE id = $1 AND deleted_at IS NOT NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Node>(&query)
            .bind(id)
            .bind(order_index)
            .fetch_one(conn)
            .await
    }
}
