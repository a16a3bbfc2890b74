//! Curriculum entity model and DTOs.
//!
//! Curricula are owned by another component; this crate only needs a row to
//! reference and to lock for root-level creates.

use curriculum_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `curriculums` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Curriculum {
    pub id: DbId,
    pub title: String,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a curriculum.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCurriculum {
    #[validate(length(min = 1, max = 500))]
    pub title: String,
}
