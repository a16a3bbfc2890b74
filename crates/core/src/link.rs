//! Node link tag and its per-type payload.
//!
//! A link's meaning is selected by its `link_type` discriminant. The payload
//! fields for YouTube, Zotero, and external links are opaque strings to the
//! tree manager; only their shape is checked here.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// YouTube video ids are 11 URL-safe base64 characters.
static YOUTUBE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid regex"));

/// Zotero item keys are 8 upper-case alphanumerics.
static ZOTERO_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{8}$").expect("valid regex"));

/// Maximum allowed length for a link title or URL.
pub const MAX_LINK_FIELD_LENGTH: usize = 2000;

// ---------------------------------------------------------------------------
// LinkType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkType {
    Youtube,
    Zotero,
    External,
    NodeReference,
}

impl LinkType {
    pub const ALL: [LinkType; 4] = [
        LinkType::Youtube,
        LinkType::Zotero,
        LinkType::External,
        LinkType::NodeReference,
    ];

    /// The stored discriminant, matching the `node_links.link_type` CHECK constraint.
    pub fn as_str(self) -> &'static str {
        match self {
            LinkType::Youtube => "YOUTUBE",
            LinkType::Zotero => "ZOTERO",
            LinkType::External => "EXTERNAL",
            LinkType::NodeReference => "NODE_REFERENCE",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LinkType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown link type '{s}'. Must be one of: {}",
                    LinkType::ALL.map(LinkType::as_str).join(", ")
                ))
            })
    }
}

impl TryFrom<String> for LinkType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// LinkPayload
// ---------------------------------------------------------------------------

/// Type-specific link data, tagged by `link_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "link_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkPayload {
    Youtube {
        video_id: String,
        title: Option<String>,
    },
    Zotero {
        item_key: String,
        title: Option<String>,
    },
    External {
        url: String,
        title: Option<String>,
    },
    NodeReference {
        target_node_id: DbId,
    },
}

/// Flat column view of a payload, in `node_links` column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkColumns {
    pub url: Option<String>,
    pub title: Option<String>,
    pub youtube_video_id: Option<String>,
    pub zotero_item_key: Option<String>,
    pub target_node_id: Option<DbId>,
}

impl LinkPayload {
    pub fn link_type(&self) -> LinkType {
        match self {
            LinkPayload::Youtube { .. } => LinkType::Youtube,
            LinkPayload::Zotero { .. } => LinkType::Zotero,
            LinkPayload::External { .. } => LinkType::External,
            LinkPayload::NodeReference { .. } => LinkType::NodeReference,
        }
    }

    /// Check the payload's shape for its tag.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            LinkPayload::Youtube { video_id, title } => {
                if !YOUTUBE_ID_RE.is_match(video_id) {
                    return Err(CoreError::Validation(format!(
                        "Invalid YouTube video id '{video_id}'"
                    )));
                }
                validate_optional_title(title.as_deref())
            }
            LinkPayload::Zotero { item_key, title } => {
                if !ZOTERO_KEY_RE.is_match(item_key) {
                    return Err(CoreError::Validation(format!(
                        "Invalid Zotero item key '{item_key}'"
                    )));
                }
                validate_optional_title(title.as_deref())
            }
            LinkPayload::External { url, title } => {
                validate_url(url)?;
                validate_optional_title(title.as_deref())
            }
            LinkPayload::NodeReference { target_node_id } => {
                if *target_node_id <= 0 {
                    return Err(CoreError::Validation(format!(
                        "Invalid target node id {target_node_id}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Flatten into the nullable storage columns.
    pub fn to_columns(&self) -> LinkColumns {
        match self.clone() {
            LinkPayload::Youtube { video_id, title } => LinkColumns {
                url: Some(format!("https://www.youtube.com/watch?v={video_id}")),
                title,
                youtube_video_id: Some(video_id),
                ..LinkColumns::default()
            },
            LinkPayload::Zotero { item_key, title } => LinkColumns {
                title,
                zotero_item_key: Some(item_key),
                ..LinkColumns::default()
            },
            LinkPayload::External { url, title } => LinkColumns {
                url: Some(url),
                title,
                ..LinkColumns::default()
            },
            LinkPayload::NodeReference { target_node_id } => LinkColumns {
                target_node_id: Some(target_node_id),
                ..LinkColumns::default()
            },
        }
    }

    /// Rebuild a payload from its tag and storage columns.
    ///
    /// Fails with `ConstraintViolation` when the column required by the tag
    /// is missing.
    pub fn from_columns(link_type: LinkType, columns: LinkColumns) -> Result<Self, CoreError> {
        let missing = |col: &str| {
            CoreError::ConstraintViolation(format!("{link_type} link is missing column {col}"))
        };
        let LinkColumns {
            url,
            title,
            youtube_video_id,
            zotero_item_key,
            target_node_id,
        } = columns;
        Ok(match link_type {
            LinkType::Youtube => LinkPayload::Youtube {
                video_id: youtube_video_id.ok_or_else(|| missing("youtube_video_id"))?,
                title,
            },
            LinkType::Zotero => LinkPayload::Zotero {
                item_key: zotero_item_key.ok_or_else(|| missing("zotero_item_key"))?,
                title,
            },
            LinkType::External => LinkPayload::External {
                url: url.ok_or_else(|| missing("url"))?,
                title,
            },
            LinkType::NodeReference => LinkPayload::NodeReference {
                target_node_id: target_node_id.ok_or_else(|| missing("target_node_id"))?,
            },
        })
    }
}

fn validate_url(url: &str) -> Result<(), CoreError> {
    let has_scheme = url.starts_with("http://") || url.starts_with("https://");
    if !has_scheme || url.contains(char::is_whitespace) {
        return Err(CoreError::Validation(format!(
            "Link URL must be an http(s) URL, got '{url}'"
        )));
    }
    if url.len() > MAX_LINK_FIELD_LENGTH {
        return Err(CoreError::Validation(format!(
            "Link URL must not exceed {MAX_LINK_FIELD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_optional_title(title: Option<&str>) -> Result<(), CoreError> {
    match title {
        Some(t) if t.chars().count() > MAX_LINK_FIELD_LENGTH => Err(CoreError::Validation(
            format!("Link title must not exceed {MAX_LINK_FIELD_LENGTH} characters"),
        )),
        _ => Ok(()),
    }
}
