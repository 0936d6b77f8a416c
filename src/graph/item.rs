//! Item representation: the entities that become graph nodes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier for a persisted item
///
/// Serializes as a plain string (e.g. "paul-s-boutique-album-1a2b3c4d")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Create an ItemId from a string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Who vouches for an item's data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    AiGenerated,
    UserVerified,
    CommunityVerified,
}

/// A domain entity (song, film, invention, ...)
///
/// Items are immutable snapshots. A fresher fetch supplies a new snapshot;
/// nothing edits one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identity assigned by storage
    pub id: ItemId,
    /// Display name
    pub name: String,
    /// Inferred kind (e.g. "song", "film", "technique")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Set by storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<VerificationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Create an item snapshot with only identity and name
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            detected_type: None,
            year: None,
            description: None,
            verification_status: None,
            created_at: None,
        }
    }

    pub fn with_type(mut self, detected_type: impl Into<String>) -> Self {
        self.detected_type = Some(detected_type.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_verification(mut self, status: VerificationStatus) -> Self {
        self.verification_status = Some(status);
        self
    }
}

/// Presentation state a renderer attaches to a node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeLayout {
    pub x: f32,
    pub y: f32,
    /// Dragged into place by the user
    #[serde(default)]
    pub pinned: bool,
}

impl NodeLayout {
    pub fn at(x: f32, y: f32) -> Self {
        Self { x, y, pinned: false }
    }
}

/// A node in the accumulated graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub item: Item,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<NodeLayout>,
}

impl GraphNode {
    pub fn new(item: Item) -> Self {
        Self { item, layout: None }
    }

    pub fn id(&self) -> &ItemId {
        &self.item.id
    }
}

impl From<Item> for GraphNode {
    fn from(item: Item) -> Self {
        Self::new(item)
    }
}
