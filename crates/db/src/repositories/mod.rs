//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Read-only lookups accept `&PgPool`; steps that must run inside a
//! manager transaction accept `&mut PgConnection` (pass `&mut *tx`).

pub mod curriculum_repo;
pub mod integrity_repo;
pub mod node_content_repo;
pub mod node_link_repo;
pub mod node_repo;
pub mod trash_repo;

pub use curriculum_repo::CurriculumRepo;
pub use integrity_repo::IntegrityRepo;
pub use node_content_repo::NodeContentRepo;
pub use node_link_repo::NodeLinkRepo;
pub use node_repo::NodeRepo;
pub use trash_repo::TrashRepo;
