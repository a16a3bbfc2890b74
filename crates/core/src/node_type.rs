//! Node type tag, structural rules keyed on it, and node field validation.
//!
//! The type of a node is always stored explicitly and never inferred from
//! its depth in the tree. Rules that differ per type (which types may hold
//! children) are expressed as lookups on the tag.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// NodeType
// ---------------------------------------------------------------------------

/// The kind of a curriculum node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Chapter,
    Section,
    #[default]
    Topic,
    Content,
    Assessment,
    Question,
    Project,
}

impl NodeType {
    /// Every variant, in declaration order.
    pub const ALL: [NodeType; 7] = [
        NodeType::Chapter,
        NodeType::Section,
        NodeType::Topic,
        NodeType::Content,
        NodeType::Assessment,
        NodeType::Question,
        NodeType::Project,
    ];

    /// The stored discriminant, matching the `nodes.node_type` CHECK constraint.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Chapter => "CHAPTER",
            NodeType::Section => "SECTION",
            NodeType::Topic => "TOPIC",
            NodeType::Content => "CONTENT",
            NodeType::Assessment => "ASSESSMENT",
            NodeType::Question => "QUESTION",
            NodeType::Project => "PROJECT",
        }
    }

    /// Whether nodes of this type may hold child nodes.
    ///
    /// `CONTENT` and `QUESTION` are leaves.
    pub fn can_have_children(self) -> bool {
        !matches!(self, NodeType::Content | NodeType::Question)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown node type '{s}'. Must be one of: {}",
                    NodeType::ALL.map(NodeType::as_str).join(", ")
                ))
            })
    }
}

impl TryFrom<String> for NodeType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Structural rules
// ---------------------------------------------------------------------------

/// Validate that a node of `parent_type` may receive a child.
pub fn validate_parent_type(parent_id: DbId, parent_type: NodeType) -> Result<(), CoreError> {
    if parent_type.can_have_children() {
        Ok(())
    } else {
        Err(CoreError::ConstraintViolation(format!(
            "Node {parent_id} is of type {parent_type} and cannot have children"
        )))
    }
}

/// Validate a type change against the node's current child count.
pub fn validate_type_change(
    node_id: DbId,
    new_type: NodeType,
    active_children: i64,
) -> Result<(), CoreError> {
    if !new_type.can_have_children() && active_children > 0 {
        return Err(CoreError::ConstraintViolation(format!(
            "Node {node_id} has {active_children} active children and cannot become {new_type}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Field validation
// ---------------------------------------------------------------------------

/// Validate a node title: must contain something besides whitespace.
///
/// Length limits are enforced on the create/update DTOs.
pub fn validate_title(title: &str) -> Result<(), CoreError> {
    if title.trim().is_empty() {
        return Err(CoreError::Validation(
            "Node title must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn round_trips_every_discriminant() {
        for t in NodeType::ALL {
            assert_eq!(t.as_str().parse::<NodeType>().unwrap(), t);
        }
    }

    #[test]
    fn rejects_unknown_discriminant() {
        let err = "LESSON".parse::<NodeType>().unwrap_err();
        assert!(err.to_string().contains("LESSON"));
    }

    #[test]
    fn discriminant_is_case_sensitive() {
        assert!("chapter".parse::<NodeType>().is_err());
    }

    #[test]
    fn default_is_topic() {
        assert_eq!(NodeType::default(), NodeType::Topic);
    }

    #[test]
    fn serde_uses_stored_discriminant() {
        let json = serde_json::to_string(&NodeType::Assessment).unwrap();
        assert_eq!(json, "\"ASSESSMENT\"");
        let back: NodeType = serde_json::from_str("\"QUESTION\"").unwrap();
        assert_eq!(back, NodeType::Question);
    }

    #[test]
    fn leaves_cannot_have_children() {
        assert!(!NodeType::Content.can_have_children());
        assert!(!NodeType::Question.can_have_children());
        assert!(NodeType::Chapter.can_have_children());
        assert!(NodeType::Assessment.can_have_children());
    }

    #[test]
    fn parent_type_rule() {
        assert!(validate_parent_type(1, NodeType::Section).is_ok());
        assert_matches!(
            validate_parent_type(1, NodeType::Question),
            Err(CoreError::ConstraintViolation(_))
        );
    }

    #[test]
    fn type_change_to_leaf_with_children_rejected() {
        assert_matches!(
            validate_type_change(7, NodeType::Content, 2),
            Err(CoreError::ConstraintViolation(_))
        );
        assert!(validate_type_change(7, NodeType::Content, 0).is_ok());
        assert!(validate_type_change(7, NodeType::Chapter, 5).is_ok());
    }

    #[test]
    fn title_rules() {
        assert!(validate_title("Intro").is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
        assert!(validate_title("\t\n").is_err());
    }
}
