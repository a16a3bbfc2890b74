//! Transactional operations over the curriculum node tree.
//!
//! Every public method runs in its own transaction and coordinates with
//! concurrent callers purely through PostgreSQL row locks:
//!
//! - The *sibling scope* of a node (its parent row, or the curriculum row for
//!   root-level nodes) is locked `FOR NO KEY UPDATE` before any `order_index`
//!   is computed. Creates under one parent serialize; creates under other
//!   parents do not.
//! - Single-scope operations lock the scope before the node, and a cascading
//!   delete locks each level of the subtree before the next. A move locks
//!   its two scopes in [`SiblingScope`] order, which may put a descendant's
//!   row before an ancestor's; a delete racing such a move can deadlock and
//!   one of the two fails with [`TreeError::TransientStore`].
//! - `lock_timeout` from [`TreeSettings`] bounds every wait. Expiry, deadlock
//!   and serialization failures surface as [`TreeError::TransientStore`].
//!
//! Dropping a returned future mid-flight drops its transaction, which rolls
//! back.

use std::time::Duration;

use curriculum_core::error::CoreError;
use curriculum_core::link::LinkPayload;
use curriculum_core::node_type::{
    validate_parent_type, validate_title, validate_type_change, NodeType,
};
use curriculum_core::paging::clamp_trash_limit;
use curriculum_core::tree::{
    build_tree, next_order_index, plan_reorder, SiblingScope, SubtreeWalk, TreeNode,
};
use curriculum_core::types::DbId;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use validator::Validate;

use crate::error::{TreeError, TreeResult};
use crate::models::integrity::TreeIntegrityReport;
use crate::models::node::{CreateNode, DeleteOutcome, Node, UpdateNode};
use crate::models::node_content::{NodeContent, UpdateNodeContent};
use crate::models::node_link::NodeLink;
use crate::repositories::{
    CurriculumRepo, IntegrityRepo, NodeContentRepo, NodeLinkRepo, NodeRepo, TrashRepo,
};

/// How many times `reorder`/`move_node` re-read a node that was re-parented
/// between the unlocked read and the scope lock.
const SCOPE_LOCK_ATTEMPTS: u32 = 3;

/// Tunables applied to every manager transaction.
#[derive(Debug, Clone)]
pub struct TreeSettings {
    /// Upper bound on any single lock wait.
    pub lock_timeout: Duration,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(5000),
        }
    }
}

/// Owns the lifecycle of nodes, their content, and their links.
#[derive(Debug, Clone)]
pub struct NodeTreeManager {
    pool: PgPool,
    settings: TreeSettings,
}

impl NodeTreeManager {
    pub fn new(pool: PgPool) -> Self {
        Self::with_settings(pool, TreeSettings::default())
    }

    pub fn with_settings(pool: PgPool, settings: TreeSettings) -> Self {
        Self { pool, settings }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ── Node lifecycle ────────────────────────────────────────────────

    /// Create a node at the end of its sibling list, with empty content.
    ///
    /// `node_type` defaults to `TOPIC`. Concurrent creates under one parent
    /// receive consecutive `order_index` values with no duplicates.
    pub async fn create(&self, input: &CreateNode) -> TreeResult<Node> {
        validate_input(input)?;
        validate_title(&input.title)?;
        let node_type = input.node_type.unwrap_or_default();
        let scope = SiblingScope::new(input.curriculum_id, input.parent_node_id);

        let mut tx = self.begin().await?;
        if let Some(parent) = lock_scope(&mut *tx, scope).await? {
            if parent.curriculum_id != input.curriculum_id {
                return Err(CoreError::ConstraintViolation(format!(
                    "Parent node {} belongs to curriculum {}, not {}",
                    parent.id, parent.curriculum_id, input.curriculum_id
                ))
                .into());
            }
            validate_parent_type(parent.id, parent.node_type)?;
        }

        let max = NodeRepo::max_sibling_order(&mut *tx, scope).await?;
        let node = NodeRepo::insert(&mut *tx, input, node_type, next_order_index(max)).await?;
        NodeContentRepo::create_empty(&mut *tx, node.id).await?;
        tx.commit().await?;

        tracing::info!(
            node_id = node.id,
            curriculum_id = node.curriculum_id,
            parent_node_id = ?node.parent_node_id,
            order_index = node.order_index,
            node_type = %node.node_type,
            "Node created"
        );
        Ok(node)
    }

    /// Fetch an active node.
    pub async fn get(&self, node_id: DbId) -> TreeResult<Node> {
        NodeRepo::find_by_id(&self.pool, node_id)
            .await?
            .ok_or_else(|| node_not_found(node_id))
    }

    /// Apply a partial update to an active node.
    ///
    /// A node with active children cannot become a leaf type.
    pub async fn update(&self, node_id: DbId, input: &UpdateNode) -> TreeResult<Node> {
        validate_input(input)?;
        if let Some(title) = &input.title {
            validate_title(title)?;
        }

        let mut tx = self.begin().await?;
        let current = NodeRepo::lock_active(&mut *tx, node_id)
            .await?
            .ok_or_else(|| node_not_found(node_id))?;
        if let Some(new_type) = input.node_type.filter(|t| *t != current.node_type) {
            let children = NodeRepo::count_active_children(&mut *tx, node_id).await?;
            validate_type_change(node_id, new_type, children)?;
        }
        let node = NodeRepo::update(&mut *tx, node_id, input)
            .await?
            .ok_or_else(|| node_not_found(node_id))?;
        tx.commit().await?;

        tracing::info!(node_id, node_type = %node.node_type, "Node updated");
        Ok(node)
    }

    /// Soft-delete a node and its whole active subtree.
    ///
    /// Every node, content row and active link in the subtree receives the
    /// same `deleted_at`. The subtree is walked level by level, locking each
    /// level before reading its children, so a create racing with the
    /// delete either lands in the walk or fails with `NotFound`.
    ///
    /// Deleting a node that is already deleted fails with `NotFound`.
    pub async fn delete(&self, node_id: DbId) -> TreeResult<DeleteOutcome> {
        let mut tx = self.begin().await?;
        NodeRepo::lock_active(&mut *tx, node_id)
            .await?
            .ok_or_else(|| node_not_found(node_id))?;

        let mut walk = SubtreeWalk::new(node_id);
        while let Some(frontier) = walk.frontier() {
            let children = NodeRepo::lock_active_children(&mut *tx, &frontier).await?;
            tracing::debug!(
                root_node_id = node_id,
                level_size = frontier.len(),
                children = children.len(),
                "Locked subtree level"
            );
            walk.advance(children);
        }
        let node_ids = walk.into_visited();

        let deleted_at = NodeRepo::transaction_now(&mut *tx).await?;
        NodeRepo::soft_delete_many(&mut *tx, &node_ids, deleted_at).await?;
        let contents_deleted =
            NodeContentRepo::soft_delete_for_nodes(&mut *tx, &node_ids, deleted_at).await?;
        let links_deleted =
            NodeLinkRepo::soft_delete_for_nodes(&mut *tx, &node_ids, deleted_at).await?;
        tx.commit().await?;

        tracing::info!(
            node_id,
            nodes_deleted = node_ids.len(),
            contents_deleted,
            links_deleted,
            %deleted_at,
            "Node subtree deleted"
        );
        Ok(DeleteOutcome {
            root_node_id: node_id,
            deleted_at,
            node_ids,
            contents_deleted,
            links_deleted,
        })
    }

    /// Restore a single soft-deleted node.
    ///
    /// **Restore is shallow.** Only the node itself, its content, and the
    /// links deleted by the same cascade come back; descendants stay deleted
    /// and must be restored one by one, top down. The parent must already be
    /// active. If an active sibling has taken the node's `order_index` in the
    /// meantime, the node is appended after the last sibling instead.
    pub async fn restore(&self, node_id: DbId) -> TreeResult<Node> {
        let mut tx = self.begin().await?;
        let snapshot = NodeRepo::find_by_id_include_deleted(&mut *tx, node_id)
            .await?
            .ok_or_else(|| node_not_found(node_id))?;
        if snapshot.is_active() {
            return Err(CoreError::InvalidState(format!("Node {node_id} is not deleted")).into());
        }

        // Deleted nodes are never re-parented, so the snapshot's scope holds.
        if let Some(reason) = TrashRepo::check_parent_trashed(&mut *tx, node_id).await? {
            return Err(CoreError::ConstraintViolation(reason).into());
        }
        if snapshot.parent_node_id.is_none() {
            lock_scope(&mut *tx, snapshot.scope()).await?;
        }

        let node = NodeRepo::lock_include_deleted(&mut *tx, node_id)
            .await?
            .ok_or_else(|| node_not_found(node_id))?;
        let Some(deleted_at) = node.deleted_at else {
            return Err(CoreError::InvalidState(format!("Node {node_id} is not deleted")).into());
        };

        let scope = node.scope();
        let order_index =
            if NodeRepo::order_index_taken(&mut *tx, scope, node.order_index, node_id).await? {
                next_order_index(NodeRepo::max_sibling_order(&mut *tx, scope).await?)
            } else {
                node.order_index
            };
        let restored = NodeRepo::restore(&mut *tx, node_id, order_index).await?;
        NodeContentRepo::restore_for_node(&mut *tx, node_id).await?;
        let links_restored = NodeLinkRepo::restore_cascaded(&mut *tx, node_id, deleted_at).await?;
        tx.commit().await?;

        let reslotted = order_index != node.order_index;
        tracing::info!(
            node_id,
            order_index,
            reslotted,
            links_restored,
            "Node restored"
        );
        Ok(restored)
    }

    // ── Listing ───────────────────────────────────────────────────────

    /// Active nodes of one type, ordered by parent then `order_index`.
    pub async fn list_by_type(
        &self,
        curriculum_id: DbId,
        node_type: NodeType,
    ) -> TreeResult<Vec<Node>> {
        Ok(NodeRepo::list_by_type(&self.pool, curriculum_id, node_type).await?)
    }

    /// Soft-deleted nodes, most recently deleted first.
    ///
    /// `limit` is clamped to `1..=500` and defaults to 50.
    pub async fn list_trash(&self, curriculum_id: DbId, limit: Option<i64>) -> TreeResult<Vec<Node>> {
        let limit = clamp_trash_limit(limit);
        Ok(TrashRepo::list_trashed(&self.pool, curriculum_id, limit).await?)
    }

    /// Active children of `parent_node_id`, or root-level nodes when `None`.
    pub async fn list_children(
        &self,
        curriculum_id: DbId,
        parent_node_id: Option<DbId>,
    ) -> TreeResult<Vec<Node>> {
        if let Some(parent_id) = parent_node_id {
            let parent = self.get(parent_id).await?;
            if parent.curriculum_id != curriculum_id {
                return Err(CoreError::ConstraintViolation(format!(
                    "Node {parent_id} does not belong to curriculum {curriculum_id}"
                ))
                .into());
            }
        }
        let scope = SiblingScope::new(curriculum_id, parent_node_id);
        Ok(NodeRepo::list_siblings(&self.pool, scope).await?)
    }

    /// The active subtree under `node_id`, nested and ordered.
    pub async fn get_subtree(&self, node_id: DbId) -> TreeResult<TreeNode<Node>> {
        let rows = NodeRepo::list_subtree(&self.pool, node_id).await?;
        build_tree(node_id, rows).ok_or_else(|| node_not_found(node_id))
    }

    // ── Ordering and structure ────────────────────────────────────────

    /// Move a node to `position` among its active siblings.
    ///
    /// Siblings are renumbered densely from zero. Returns the sibling list in
    /// its new order.
    pub async fn reorder(&self, node_id: DbId, position: usize) -> TreeResult<Vec<Node>> {
        for attempt in 1..=SCOPE_LOCK_ATTEMPTS {
            let scope = self.get(node_id).await?.scope();

            let mut tx = self.begin().await?;
            lock_scope(&mut *tx, scope).await?;
            let node = NodeRepo::lock_active(&mut *tx, node_id)
                .await?
                .ok_or_else(|| node_not_found(node_id))?;
            if node.scope() != scope {
                tracing::debug!(node_id, attempt, "Node re-parented while locking, retrying");
                continue;
            }

            let siblings: Vec<DbId> = NodeRepo::list_siblings(&mut *tx, scope)
                .await?
                .iter()
                .map(|n| n.id)
                .collect();
            let order = plan_reorder(&siblings, node_id, position)?;
            NodeRepo::renumber(&mut *tx, &order).await?;
            let reordered = NodeRepo::list_siblings(&mut *tx, scope).await?;
            tx.commit().await?;

            tracing::info!(node_id, position, siblings = reordered.len(), "Node reordered");
            return Ok(reordered);
        }
        Err(concurrent_reparent(node_id))
    }

    /// Re-parent a node within its curriculum, appending it to the new
    /// sibling list. `None` moves it to the root level.
    ///
    /// The new parent must be active, in the same curriculum, allowed to
    /// hold children, and outside the moved node's subtree. Moving a node
    /// to the parent it already has is a no-op.
    pub async fn move_node(&self, node_id: DbId, new_parent_id: Option<DbId>) -> TreeResult<Node> {
        if new_parent_id == Some(node_id) {
            return Err(CoreError::ConstraintViolation(format!(
                "Node {node_id} cannot be its own parent"
            ))
            .into());
        }

        for attempt in 1..=SCOPE_LOCK_ATTEMPTS {
            let snapshot = self.get(node_id).await?;
            let old_scope = snapshot.scope();
            let new_scope = SiblingScope::new(snapshot.curriculum_id, new_parent_id);
            if old_scope == new_scope {
                return Ok(snapshot);
            }

            let mut tx = self.begin().await?;
            let mut scopes = [old_scope, new_scope];
            scopes.sort();
            let mut new_parent = None;
            for scope in scopes {
                let locked = lock_scope(&mut *tx, scope).await?;
                if scope == new_scope {
                    new_parent = locked;
                }
            }

            let node = NodeRepo::lock_active(&mut *tx, node_id)
                .await?
                .ok_or_else(|| node_not_found(node_id))?;
            if node.scope() != old_scope {
                tracing::debug!(node_id, attempt, "Node re-parented while locking, retrying");
                continue;
            }

            if let Some(parent) = &new_parent {
                if parent.curriculum_id != node.curriculum_id {
                    return Err(CoreError::ConstraintViolation(format!(
                        "Node {} belongs to curriculum {}, not {}",
                        parent.id, parent.curriculum_id, node.curriculum_id
                    ))
                    .into());
                }
                validate_parent_type(parent.id, parent.node_type)?;
                let ancestors = NodeRepo::ancestor_ids(&mut *tx, parent.id).await?;
                if ancestors.contains(&node_id) {
                    return Err(CoreError::ConstraintViolation(format!(
                        "Node {node_id} cannot move under its own descendant {}",
                        parent.id
                    ))
                    .into());
                }
            }

            let max = NodeRepo::max_sibling_order(&mut *tx, new_scope).await?;
            let moved =
                NodeRepo::set_parent(&mut *tx, node_id, new_scope, next_order_index(max)).await?;
            tx.commit().await?;

            tracing::info!(
                node_id,
                from_parent = ?old_scope.parent_node_id(),
                to_parent = ?new_parent_id,
                order_index = moved.order_index,
                "Node moved"
            );
            return Ok(moved);
        }
        Err(concurrent_reparent(node_id))
    }

    // ── Content ───────────────────────────────────────────────────────

    /// The content of an active node.
    pub async fn get_content(&self, node_id: DbId) -> TreeResult<NodeContent> {
        NodeContentRepo::find_by_node(&self.pool, node_id)
            .await?
            .ok_or_else(|| node_not_found(node_id))
    }

    /// Apply a partial update to an active node's content.
    pub async fn update_content(
        &self,
        node_id: DbId,
        input: &UpdateNodeContent,
    ) -> TreeResult<NodeContent> {
        validate_input(input)?;

        let mut tx = self.begin().await?;
        NodeRepo::lock_active(&mut *tx, node_id)
            .await?
            .ok_or_else(|| node_not_found(node_id))?;
        let content = NodeContentRepo::update(&mut *tx, node_id, input)
            .await?
            .ok_or_else(|| {
                CoreError::Internal(format!("Active node {node_id} has no active content"))
            })?;
        tx.commit().await?;

        tracing::info!(node_id, content_id = content.id, "Node content updated");
        Ok(content)
    }

    // ── Links ─────────────────────────────────────────────────────────

    /// Attach a link to an active node.
    ///
    /// A node reference must point at another active node of the same
    /// curriculum.
    pub async fn add_link(&self, node_id: DbId, payload: &LinkPayload) -> TreeResult<NodeLink> {
        payload.validate()?;

        let mut tx = self.begin().await?;
        let owner = NodeRepo::lock_active(&mut *tx, node_id)
            .await?
            .ok_or_else(|| node_not_found(node_id))?;
        if let LinkPayload::NodeReference { target_node_id } = *payload {
            if target_node_id == node_id {
                return Err(CoreError::ConstraintViolation(format!(
                    "Node {node_id} cannot reference itself"
                ))
                .into());
            }
            let target = NodeRepo::find_by_id_include_deleted(&mut *tx, target_node_id)
                .await?
                .filter(Node::is_active)
                .ok_or_else(|| node_not_found(target_node_id))?;
            if target.curriculum_id != owner.curriculum_id {
                return Err(CoreError::ConstraintViolation(format!(
                    "Node {target_node_id} is in another curriculum"
                ))
                .into());
            }
        }
        let link = NodeLinkRepo::create(&mut *tx, node_id, payload).await?;
        tx.commit().await?;

        tracing::info!(node_id, link_id = link.id, link_type = %link.link_type, "Node link added");
        Ok(link)
    }

    /// Active links of an active node, oldest first.
    pub async fn list_links(&self, node_id: DbId) -> TreeResult<Vec<NodeLink>> {
        self.get(node_id).await?;
        Ok(NodeLinkRepo::list_for_node(&self.pool, node_id).await?)
    }

    /// Soft-delete a single link.
    pub async fn delete_link(&self, link_id: DbId) -> TreeResult<()> {
        if !NodeLinkRepo::soft_delete(&self.pool, link_id).await? {
            return Err(CoreError::NotFound {
                entity: "NodeLink",
                id: link_id,
            }
            .into());
        }
        tracing::info!(link_id, "Node link deleted");
        Ok(())
    }

    // ── Integrity ─────────────────────────────────────────────────────

    /// Read-only check of a curriculum's tree invariants.
    pub async fn scan(&self, curriculum_id: DbId) -> TreeResult<TreeIntegrityReport> {
        CurriculumRepo::find_by_id(&self.pool, curriculum_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Curriculum",
                id: curriculum_id,
            })?;
        let report = IntegrityRepo::scan_curriculum(&self.pool, curriculum_id).await?;
        tracing::debug!(curriculum_id, issues = report.issue_count(), "Curriculum scanned");
        Ok(report)
    }

    // ── Helpers ───────────────────────────────────────────────────────

    /// Begin a transaction with this manager's lock timeout applied.
    async fn begin(&self) -> TreeResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        let timeout_ms = self.settings.lock_timeout.as_millis().to_string();
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(timeout_ms)
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

/// Lock a sibling scope. Returns the locked parent row for node scopes.
async fn lock_scope(conn: &mut PgConnection, scope: SiblingScope) -> TreeResult<Option<Node>> {
    match scope {
        SiblingScope::Root { curriculum_id } => {
            if !CurriculumRepo::lock_root_scope(conn, curriculum_id).await? {
                return Err(CoreError::NotFound {
                    entity: "Curriculum",
                    id: curriculum_id,
                }
                .into());
            }
            tracing::debug!(curriculum_id, "Locked root scope");
            Ok(None)
        }
        SiblingScope::Parent(parent_id) => {
            let parent = NodeRepo::lock_active(conn, parent_id)
                .await?
                .ok_or_else(|| node_not_found(parent_id))?;
            tracing::debug!(parent_node_id = parent_id, "Locked parent scope");
            Ok(Some(parent))
        }
    }
}

fn validate_input(input: &impl Validate) -> Result<(), CoreError> {
    input
        .validate()
        .map_err(|e| CoreError::Validation(e.to_string()))
}

fn node_not_found(id: DbId) -> TreeError {
    CoreError::node_not_found(id).into()
}

fn concurrent_reparent(node_id: DbId) -> TreeError {
    CoreError::InvalidState(format!(
        "Node {node_id} was re-parented concurrently {SCOPE_LOCK_ATTEMPTS} times"
    ))
    .into()
}
