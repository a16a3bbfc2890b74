//! Node entity model and DTOs.

use curriculum_core::node_type::NodeType;
use curriculum_core::tree::{SiblingScope, TreeItem};
use curriculum_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `nodes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Node {
    pub id: DbId,
    pub curriculum_id: DbId,
    pub parent_node_id: Option<DbId>,
    pub title: String,
    #[sqlx(try_from = "String")]
    pub node_type: NodeType,
    pub description: Option<String>,
    pub order_index: i32,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Node {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// The sibling sequence this node's `order_index` belongs to.
    pub fn scope(&self) -> SiblingScope {
        SiblingScope::new(self.curriculum_id, self.parent_node_id)
    }
}

impl TreeItem for Node {
    fn id(&self) -> DbId {
        self.id
    }

    fn parent_id(&self) -> Option<DbId> {
        self.parent_node_id
    }

    fn order_index(&self) -> i32 {
        self.order_index
    }
}

/// DTO for creating a node. `node_type` defaults to `TOPIC`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateNode {
    pub curriculum_id: DbId,
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    pub parent_node_id: Option<DbId>,
    pub node_type: Option<NodeType>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

/// DTO for updating a node. Only `Some` fields are applied.
///
/// `None` always means "leave unchanged", so an update cannot clear
/// `description` back to NULL; set it to an empty string instead.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateNode {
    #[validate(length(min = 1, max = 500))]
    pub title: Option<String>,
    pub node_type: Option<NodeType>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

/// Result of a cascading soft delete.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub root_node_id: DbId,
    /// The timestamp shared by every row the cascade touched.
    pub deleted_at: Timestamp,
    pub node_ids: Vec<DbId>,
    pub contents_deleted: u64,
    pub links_deleted: u64,
}
