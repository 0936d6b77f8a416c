//! Payload shapes exchanged with storage
//!
//! Fetch responses convert into `GraphBatch`es for the accumulator; save
//! payloads carry the structuring pipeline's output toward storage.

use crate::conflict::{ConflictCandidateSet, PreviewData};
use crate::graph::{clamp_confidence, GraphBatch, GraphLink, Item, ItemId};
use serde::{Deserialize, Serialize};

// --- Influence fetch ---

/// One influence edge as returned by the influence fetch, with full item snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceRelation {
    pub from_item: Item,
    pub to_item: Item,
    pub confidence: f32,
    pub influence_type: String,
    pub category: String,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_of_influence: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<String>,
}

impl InfluenceRelation {
    pub fn to_link(&self) -> GraphLink {
        GraphLink {
            source: self.from_item.id.clone(),
            target: self.to_item.id.clone(),
            confidence: clamp_confidence(self.confidence),
            influence_type: self.influence_type.clone(),
            category: self.category.clone(),
            explanation: self.explanation.clone(),
            source_ref: self.source.clone(),
            scope: self.scope.clone(),
            clusters: self.clusters.clone(),
        }
    }
}

/// Everything known to have influenced one item.
///
/// `influences` and `categories` reflect the requested scope filter;
/// `available_scopes` lists every scope on the item regardless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceFetch {
    pub main_item: Item,
    pub influences: Vec<InfluenceRelation>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, alias = "scopes")]
    pub available_scopes: Vec<String>,
}

impl InfluenceFetch {
    /// Nodes come from the main item and both endpoints of every influence.
    pub fn into_batch(self) -> GraphBatch {
        let links = self.influences.iter().map(InfluenceRelation::to_link).collect();
        let mut nodes = vec![self.main_item.clone()];
        for influence in self.influences {
            nodes.push(influence.from_item);
            nodes.push(influence.to_item);
        }
        GraphBatch {
            center: Some(self.main_item.id),
            nodes,
            links,
        }
    }
}

// --- Expanded-graph fetch ---

/// Which side of a node to expand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// What influenced the node
    Incoming,
    /// What the node influenced
    Outgoing,
    Both,
}

/// Parameters for an expanded-graph fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionRequest {
    pub item_id: ItemId,
    pub include_incoming: bool,
    pub include_outgoing: bool,
    pub max_depth: usize,
}

impl ExpansionRequest {
    pub fn new(item_id: impl Into<ItemId>, direction: Direction, max_depth: usize) -> Self {
        Self {
            item_id: item_id.into(),
            include_incoming: matches!(direction, Direction::Incoming | Direction::Both),
            include_outgoing: matches!(direction, Direction::Outgoing | Direction::Both),
            max_depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedNode {
    pub item: Item,
    #[serde(default)]
    pub is_center: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedRelationship {
    pub from_id: ItemId,
    pub to_id: ItemId,
    pub confidence: f32,
    pub influence_type: String,
    pub category: String,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<String>,
}

impl ExpandedRelationship {
    pub fn to_link(&self) -> GraphLink {
        GraphLink {
            source: self.from_id.clone(),
            target: self.to_id.clone(),
            confidence: clamp_confidence(self.confidence),
            influence_type: self.influence_type.clone(),
            category: self.category.clone(),
            explanation: self.explanation.clone(),
            source_ref: self.source.clone(),
            scope: self.scope.clone(),
            clusters: self.clusters.clone(),
        }
    }
}

/// A neighborhood around a center item, with nodes listed explicitly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedGraph {
    pub nodes: Vec<ExpandedNode>,
    pub relationships: Vec<ExpandedRelationship>,
    pub center_item_id: ItemId,
}

impl ExpandedGraph {
    /// Nodes stay explicit; relationships are never used to invent nodes.
    pub fn into_batch(self) -> GraphBatch {
        GraphBatch {
            center: Some(self.center_item_id),
            links: self
                .relationships
                .iter()
                .map(ExpandedRelationship::to_link)
                .collect(),
            nodes: self.nodes.into_iter().map(|node| node.item).collect(),
        }
    }
}

/// How many neighbors an expansion would reveal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionCounts {
    pub incoming_influences: usize,
    pub outgoing_influences: usize,
}

// --- Save ---

/// An influence proposed by the structuring pipeline, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedInfluence {
    pub name: String,
    /// Kind of the influencing item (song, film, technique, ...)
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub category: String,
    pub influence_type: String,
    pub confidence: f32,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<String>,
}

impl ProposedInfluence {
    pub fn new(name: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item_type: item_type.into(),
            creator: None,
            year: None,
            category: String::new(),
            influence_type: String::new(),
            confidence: 1.0,
            explanation: String::new(),
            source: None,
            scope: None,
            clusters: Vec::new(),
        }
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_influence_type(mut self, influence_type: impl Into<String>) -> Self {
        self.influence_type = influence_type.into();
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Blank names and the literal placeholders "none"/"null" carry no entity
    pub fn has_usable_name(&self) -> bool {
        let name = self.name.trim();
        !name.is_empty() && !matches!(name.to_lowercase().as_str(), "none" | "null")
    }
}

/// A candidate save: one main item plus its proposed influences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavePayload {
    pub main_item: String,
    pub main_item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_item_creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_item_year: Option<i32>,
    pub influences: Vec<ProposedInfluence>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl SavePayload {
    pub fn new(main_item: impl Into<String>, main_item_type: impl Into<String>) -> Self {
        Self {
            main_item: main_item.into(),
            main_item_type: main_item_type.into(),
            main_item_creator: None,
            main_item_year: None,
            influences: Vec::new(),
            categories: Vec::new(),
        }
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.main_item_creator = Some(creator.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.main_item_year = Some(year);
        self
    }

    pub fn with_influence(mut self, influence: ProposedInfluence) -> Self {
        if !influence.category.is_empty() && !self.categories.contains(&influence.category) {
            self.categories.push(influence.category.clone());
        }
        self.influences.push(influence);
        self
    }
}

/// Outcome of a save, force-save, or merge call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveResponse {
    Saved {
        item_id: ItemId,
    },
    /// Storage found plausible duplicates and needs a per-entity decision
    RequiresReview {
        conflicts: ConflictCandidateSet,
        #[serde(default)]
        preview: PreviewData,
    },
}
