//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` + `Validate` DTOs for inserts and partial updates

pub mod curriculum;
pub mod integrity;
pub mod node;
pub mod node_content;
pub mod node_link;
