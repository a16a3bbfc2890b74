//! Repository for the `curriculums` table.

use curriculum_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::curriculum::{CreateCurriculum, Curriculum};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, title, deleted_at, created_at, updated_at";

/// Provides the curriculum lookups the tree manager depends on.
pub struct CurriculumRepo;

impl CurriculumRepo {
    /// Insert a new curriculum, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateCurriculum) -> Result<Curriculum, sqlx::Error> {
        let query = format!(
            "INSERT INTO curriculums (title) VALUES ($1)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Curriculum>(&query)
            .bind(&input.title)
            .fetch_one(pool)
            .await
    }

    /// Find a curriculum by ID. Excludes soft-deleted rows.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Curriculum>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM curriculums WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Curriculum>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// IDs of all live curricula, oldest first.
    pub async fn list_active_ids(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> =
            sqlx::query_as("SELECT id FROM curriculums WHERE deleted_at IS NULL ORDER BY id")
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Lock a live curriculum row as the sibling scope of its root-level nodes.
    ///
    /// `FOR NO KEY UPDATE` serializes root-level creates without blocking
    /// the foreign-key checks of inserts elsewhere in the curriculum.
    /// Returns `false` if the curriculum does not exist or is deleted.
    pub async fn lock_root_scope(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let row: Option<(DbId,)> = sqlx::query_as(
            "SELECT id FROM curriculums WHERE id = $1 AND deleted_at IS NULL FOR NO KEY UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(row.is_some())
    }
}
