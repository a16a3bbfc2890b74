//! Domain logic for the curriculum node tree.
//!
//! Everything here is pure: no database access, no async. The `curriculum-db`
//! crate drives these rules from inside its transactions.

pub mod error;
pub mod link;
pub mod node_type;
pub mod paging;
pub mod tree;
pub mod types;
