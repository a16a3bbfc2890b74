//! Node link model.
//!
//! Inserts take a [`LinkPayload`] directly; the row keeps the payload
//! flattened into nullable columns next to its `link_type` tag.

use curriculum_core::error::CoreError;
use curriculum_core::link::{LinkColumns, LinkPayload, LinkType};
use curriculum_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `node_links` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NodeLink {
    pub id: DbId,
    pub node_id: DbId,
    #[sqlx(try_from = "String")]
    pub link_type: LinkType,
    pub url: Option<String>,
    pub title: Option<String>,
    pub youtube_video_id: Option<String>,
    pub zotero_item_key: Option<String>,
    pub target_node_id: Option<DbId>,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl NodeLink {
    /// Rebuild the tagged payload from the stored columns.
    pub fn payload(&self) -> Result<LinkPayload, CoreError> {
        LinkPayload::from_columns(
            self.link_type,
            LinkColumns {
                url: self.url.clone(),
                title: self.title.clone(),
                youtube_video_id: self.youtube_video_id.clone(),
                zotero_item_key: self.zotero_item_key.clone(),
                target_node_id: self.target_node_id,
            },
        )
    }
}
