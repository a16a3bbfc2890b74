//! Tree integrity scan results.

use curriculum_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;

/// Active siblings sharing one `order_index`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DuplicateSiblingOrder {
    pub parent_node_id: Option<DbId>,
    pub order_index: i32,
    pub node_ids: Vec<DbId>,
}

/// Invariant violations found in one curriculum.
#[derive(Debug, Clone, Serialize)]
pub struct TreeIntegrityReport {
    pub curriculum_id: DbId,
    pub duplicate_sibling_orders: Vec<DuplicateSiblingOrder>,
    /// Active nodes whose parent is deleted or in another curriculum.
    pub orphaned_active_nodes: Vec<DbId>,
    /// Nodes with no content row, or whose content's deleted state differs.
    pub content_mismatches: Vec<DbId>,
    /// Active links owned by deleted nodes.
    pub live_links_on_deleted_nodes: Vec<DbId>,
}

impl TreeIntegrityReport {
    pub fn issue_count(&self) -> usize {
        self.duplicate_sibling_orders.len()
            + self.orphaned_active_nodes.len()
            + self.content_mismatches.len()
            + self.live_links_on_deleted_nodes.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }
}
