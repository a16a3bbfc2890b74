//! Node content model and DTOs.

use curriculum_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `node_contents` table. Exactly one per node.
///
/// The `ai_*` fields are opaque strings written by other components.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NodeContent {
    pub id: DbId,
    pub node_id: DbId,
    pub markdown_content: String,
    pub ai_generated_content: Option<String>,
    pub ai_summary: Option<String>,
    pub ai_model: Option<String>,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for updating node content. Only `Some` fields are applied.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateNodeContent {
    #[validate(length(max = 1000000))]
    pub markdown_content: Option<String>,
    pub ai_generated_content: Option<String>,
    pub ai_summary: Option<String>,
    #[validate(length(max = 200))]
    pub ai_model: Option<String>,
}
